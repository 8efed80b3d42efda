use normal::Scriptlet;
use std::collections::BTreeMap;
use url::Url;

/// The grammar's named script snippets for constraints, functions and
/// converters. The pipeline only fills and round-trips this namespace;
/// evaluation belongs to a downstream runtime.
#[derive(Clone, Debug, Default)]
pub struct ScriptletNamespace {
    namespace: BTreeMap<String, Scriptlet>,
}

impl ScriptletNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&Scriptlet> {
        self.namespace.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.namespace.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, scriptlet: Scriptlet) {
        self.namespace.insert(name.into(), scriptlet);
    }

    /// Register an embedded scriptlet. The name may carry parenthesized
    /// native-argument indexes.
    pub fn register(&mut self, name: &str, source: &str) {
        let (name, native_argument_indexes) = parse_scriptlet_name(name);
        self.set(
            name,
            Scriptlet {
                origin: None,
                path: None,
                source: Some(cleanup_scriptlet(source)),
                native_argument_indexes,
            },
        );
    }

    /// Register a scriptlet imported by path, relative to `origin`.
    pub fn register_import(&mut self, name: &str, origin: Option<Url>, path: &str) {
        let (name, native_argument_indexes) = parse_scriptlet_name(name);
        self.set(
            name,
            Scriptlet {
                origin,
                path: Some(path.to_string()),
                source: None,
                native_argument_indexes,
            },
        );
    }

    /// Later registrations win, matching import merge order.
    pub fn merge(&mut self, other: &ScriptletNamespace) {
        for (name, scriptlet) in &other.namespace {
            self.namespace.insert(name.clone(), scriptlet.clone());
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, Scriptlet> {
        self.namespace.clone()
    }
}

/// Parse optional native-argument indexes from a scriptlet name, notation
/// `my_constraint(0,1)`. Indexes that fail to parse are ignored.
pub fn parse_scriptlet_name(name: &str) -> (String, Vec<usize>) {
    let Some(parenthesis) = name.find('(') else {
        return (name.to_string(), Vec::new());
    };
    let inner = name[parenthesis + 1..].trim_end_matches(')');
    let indexes = inner
        .split(',')
        .filter_map(|segment| segment.trim().parse::<usize>().ok())
        .collect();
    (name[..parenthesis].to_string(), indexes)
}

/// Strip a leading shebang-style comment line and outer blank lines from
/// embedded scriptlet source.
fn cleanup_scriptlet(source: &str) -> String {
    source.trim_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_native_argument_indexes() {
        assert_eq!(
            parse_scriptlet_name("my_constraint(0,2)"),
            ("my_constraint".to_string(), vec![0, 2])
        );
        assert_eq!(parse_scriptlet_name("plain"), ("plain".to_string(), vec![]));
        // Unparseable segments are dropped, parseable ones kept.
        assert_eq!(
            parse_scriptlet_name("mixed(x,1)"),
            ("mixed".to_string(), vec![1])
        );
    }

    #[test]
    fn merge_prefers_later_registrations() {
        let mut first = ScriptletNamespace::new();
        first.register("c", "function a() {}");
        let mut second = ScriptletNamespace::new();
        second.register("c", "function b() {}");

        first.merge(&second);
        assert_eq!(
            first.lookup("c").unwrap().source.as_deref(),
            Some("function b() {}")
        );
    }
}
