use std::fmt;

/// Line/column position of a value within its source document.
/// Lines and columns are 1-based; `Locator::default()` is the document root.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Locator {
    pub line: usize,
    pub column: usize,
}

impl Locator {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
