use crate::fields::Reader;
use crate::scriptlets::ScriptletNamespace;
use std::fmt;

/// A registered grammar: a version selector, the root and import-file
/// readers, and a hook that installs the grammar's embedded profile
/// documents and scriptlets into the session.
pub struct Grammar {
    pub name: &'static str,
    /// Top-level key whose value selects a version of this grammar.
    pub selector_key: &'static str,
    /// `(accepted version value, implicit profile path)` pairs. The
    /// profile path is an internal URL installed by `register`, imported
    /// implicitly into every file of this grammar.
    pub versions: &'static [(&'static str, Option<&'static str>)],
    /// `$Root` reader: the entry document, topology included.
    pub read_root: Reader,
    /// `$File` reader: an imported document.
    pub read_file: Reader,
    pub register: fn(&resources::UrlContext, &mut ScriptletNamespace),
}

impl Grammar {
    pub fn implicit_profile(&self, version: &str) -> Option<&'static str> {
        self.versions
            .iter()
            .find(|(accepted, _)| *accepted == version)
            .and_then(|(_, profile)| *profile)
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar").field("name", &self.name).finish()
    }
}

impl PartialEq for Grammar {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// All registered grammars, in detection order.
pub static GRAMMARS: &[&Grammar] = &[
    &crate::grammars::tosca_v2_0::GRAMMAR,
    &crate::grammars::tosca_v1_x::GRAMMAR_1_3,
    &crate::grammars::tosca_v1_x::GRAMMAR_1_2,
    &crate::grammars::tosca_v1_x::GRAMMAR_1_1,
    &crate::grammars::tosca_v1_x::GRAMMAR_1_0,
    &crate::grammars::hot::GRAMMAR,
];

#[derive(Debug)]
pub enum Detected {
    Grammar {
        grammar: &'static Grammar,
        version: &'static str,
    },
    /// A selector key was present but its version value is not supported.
    UnknownVersion { key: String, version: String },
    /// No selector key matched at all.
    NoMatch,
}

/// Choose a grammar for a source document: for each registered grammar,
/// the source's top-level map must contain the selector key with an
/// accepted version value.
pub fn detect(data: &ir::Value) -> Detected {
    let Some(map) = data.as_map() else {
        return Detected::NoMatch;
    };

    for grammar in GRAMMARS {
        let Some(value) = map.get(&ir::Value::from(grammar.selector_key)) else {
            continue;
        };
        let Some(version) = value.as_str() else {
            continue;
        };
        for (accepted, _) in grammar.versions {
            if *accepted == version {
                return Detected::Grammar {
                    grammar,
                    version: accepted,
                };
            }
        }
    }

    // Second pass: name the version in the report when a selector key
    // exists but its value isn't supported. This also covers the Cloudify
    // DSL, which shares the TOSCA selector key.
    for key in ["tosca_definitions_version", "heat_template_version"] {
        if let Some(value) = map.get(&ir::Value::from(key)) {
            return Detected::UnknownVersion {
                key: key.to_string(),
                version: value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| value.key_string()),
            };
        }
    }

    Detected::NoMatch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> ir::Value {
        let (value, _) = ir::decode(text.as_bytes(), ir::Format::Yaml).unwrap();
        value
    }

    #[test]
    fn detects_tosca_2_0() {
        match detect(&yaml("tosca_definitions_version: tosca_2_0\n")) {
            Detected::Grammar { grammar, version } => {
                assert_eq!(grammar.name, "tosca_v2_0");
                assert_eq!(version, "tosca_2_0");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn detects_simple_profile_versions() {
        match detect(&yaml("tosca_definitions_version: tosca_simple_yaml_1_3\n")) {
            Detected::Grammar { grammar, .. } => assert_eq!(grammar.name, "tosca_v1_3"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn detects_hot_by_template_version() {
        match detect(&yaml("heat_template_version: \"2021-04-16\"\n")) {
            Detected::Grammar { grammar, .. } => assert_eq!(grammar.name, "hot"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_versions_are_named() {
        match detect(&yaml("tosca_definitions_version: cloudify_dsl_1_3\n")) {
            Detected::UnknownVersion { version, .. } => {
                assert_eq!(version, "cloudify_dsl_1_3")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_selector_is_no_match() {
        assert!(matches!(detect(&yaml("a: b\n")), Detected::NoMatch));
        assert!(matches!(detect(&yaml("[]")), Detected::NoMatch));
    }
}
