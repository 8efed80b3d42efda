use std::fmt;
use std::sync::Mutex;

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One recoverable problem, pinned to a source location. Readers and
/// renderers never fail on malformed input; they append here and continue,
/// so a single run reports everything that is wrong.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Problem {
    pub severity: Severity,
    /// Stable machine-readable category, e.g. `ImportLoop`.
    pub code: &'static str,
    pub url: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<ir::Locator>,
    pub message: String,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "error: ")?,
            Severity::Warning => write!(f, "warning: ")?,
        }
        if !self.url.is_empty() {
            write!(f, "{}", self.url)?;
            if let Some(locator) = self.locator {
                write!(f, ":{locator}")?;
            }
            write!(f, " ")?;
        }
        if !self.path.is_empty() {
            write!(f, "@{} ", self.path)?;
        }
        f.write_str(&self.message)
    }
}

/// The session-wide problem list. Appends are cheap and thread-safe; the
/// hot path never blocks on anything but the append itself.
#[derive(Default)]
pub struct Problems {
    inner: Mutex<Vec<Problem>>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, problem: Problem) {
        tracing::debug!(%problem, "reported");
        self.inner.lock().expect("problems poisoned").push(problem);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("problems poisoned").is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("problems poisoned").len()
    }

    /// How many problems carry the given category code.
    pub fn count(&self, code: &str) -> usize {
        self.inner
            .lock()
            .expect("problems poisoned")
            .iter()
            .filter(|problem| problem.code == code)
            .count()
    }

    /// Snapshot of the accumulated problems, sorted by URL then path so
    /// that reports are deterministic regardless of phase-1 scheduling.
    pub fn to_vec(&self) -> Vec<Problem> {
        let mut problems = self.inner.lock().expect("problems poisoned").clone();
        problems.sort_by(|a, b| {
            (a.url.as_str(), a.path.as_str(), a.message.as_str()).cmp(&(
                b.url.as_str(),
                b.path.as_str(),
                b.message.as_str(),
            ))
        });
        problems
    }
}

impl fmt::Debug for Problems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problems_sort_deterministically() {
        let problems = Problems::new();
        for (url, message) in [("b", "second"), ("a", "first")] {
            problems.append(Problem {
                severity: Severity::Error,
                code: "Test",
                url: url.to_string(),
                path: String::new(),
                locator: None,
                message: message.to_string(),
            });
        }
        let sorted = problems.to_vec();
        assert_eq!(sorted[0].message, "first");
        assert_eq!(sorted[1].message, "second");
    }
}
