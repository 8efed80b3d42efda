/// Opt-in deviations from strict grammar semantics, keyed by stable names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Quirks {
    /// `imports.implicit.disable`: do not append the grammar's implicit
    /// profile import.
    pub imports_implicit_disable: bool,
    /// `imports.topology_template.ignore`: imported files skip their
    /// topology template section.
    pub imports_topology_template_ignore: bool,
    /// `namespace.normative.ignore`: types marked `tosca.normative` are
    /// not registered into namespaces.
    pub namespace_normative_ignore: bool,
    /// `annotations.ignore`: the `annotations` keyword is accepted and
    /// discarded instead of reported as unsupported.
    pub annotations_ignore: bool,
    /// `data_types.string.permissive`: non-string primitives coerce to
    /// string when a string is expected.
    pub data_types_string_permissive: bool,
    /// `substitution_mappings.requirements.list`: requirement mappings
    /// accept the single-element list form.
    pub substitution_mappings_requirements_list: bool,
}

impl Quirks {
    /// Enable a quirk by its stable name. Returns false for unknown names.
    pub fn enable(&mut self, name: &str) -> bool {
        match name {
            "imports.implicit.disable" => self.imports_implicit_disable = true,
            "imports.topology_template.ignore" => self.imports_topology_template_ignore = true,
            "namespace.normative.ignore" => self.namespace_normative_ignore = true,
            "annotations.ignore" => self.annotations_ignore = true,
            "data_types.string.permissive" => self.data_types_string_permissive = true,
            "substitution_mappings.requirements.list" => {
                self.substitution_mappings_requirements_list = true
            }
            _ => return false,
        }
        true
    }

    pub fn parse(names: &[String]) -> (Quirks, Vec<String>) {
        let mut quirks = Quirks::default();
        let mut unknown = Vec::new();
        for name in names {
            if !quirks.enable(name) {
                unknown.push(name.clone());
            }
        }
        (quirks, unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_flags_unknown() {
        let (quirks, unknown) = Quirks::parse(&[
            "imports.implicit.disable".to_string(),
            "no.such.quirk".to_string(),
        ]);
        assert!(quirks.imports_implicit_disable);
        assert!(!quirks.annotations_ignore);
        assert_eq!(unknown, vec!["no.such.quirk".to_string()]);
    }
}
