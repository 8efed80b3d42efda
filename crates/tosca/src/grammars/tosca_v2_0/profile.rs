use crate::scriptlets::ScriptletNamespace;

/// Internal path of the embedded normative profile, imported implicitly
/// into every TOSCA 2.0 file.
pub const PROFILE_PATH: &str = "profiles/tosca/2.0/profile.yaml";

static PROFILE_YAML: &str = include_str!("profile.yaml");

/// Install the profile document and the constraint/comparer scriptlets
/// into the session.
pub fn register(urls: &resources::UrlContext, scriptlets: &mut ScriptletNamespace) {
    urls.register_internal(PROFILE_PATH, PROFILE_YAML.as_bytes());
    register_scriptlets(scriptlets);
}

pub fn register_scriptlets(scriptlets: &mut ScriptletNamespace) {
    for (name, source) in CONSTRAINT_SCRIPTLETS {
        scriptlets.register(name, source);
    }
}

/// Constraint and comparer scriptlets, evaluated by the downstream
/// runtime against rendered values. Scalars arrive either bare or in the
/// canonical `{$originalString, $number}` form.
static CONSTRAINT_SCRIPTLETS: &[(&str, &str)] = &[
    (
        "tosca.comparer.default",
        r#"
function compare(a, b) {
	if (a < b) return -1;
	else if (a > b) return 1;
	return 0;
}
"#,
    ),
    (
        "tosca.comparer.version",
        r#"
function compare(a, b) {
	a = a.split('.');
	b = b.split('.');
	for (var i = 0, l = Math.max(a.length, b.length); i < l; i++) {
		var an = parseInt(a[i] || '0');
		var bn = parseInt(b[i] || '0');
		if (an !== bn) return an < bn ? -1 : 1;
	}
	return 0;
}
"#,
    ),
    (
        "tosca.comparer.scalar-unit",
        r#"
function compare(a, b) {
	a = (a && a.$number !== undefined) ? a.$number : a;
	b = (b && b.$number !== undefined) ? b.$number : b;
	if (a < b) return -1;
	else if (a > b) return 1;
	return 0;
}
"#,
    ),
    (
        "tosca.constraint.equal",
        r#"
function validate(value, argument) {
	value = (value && value.$number !== undefined) ? value.$number : value;
	return JSON.stringify(value) === JSON.stringify(argument);
}
"#,
    ),
    (
        "tosca.constraint.greater_than",
        r#"
function validate(value, argument) {
	value = (value && value.$number !== undefined) ? value.$number : value;
	return value > argument;
}
"#,
    ),
    (
        "tosca.constraint.greater_or_equal",
        r#"
function validate(value, argument) {
	value = (value && value.$number !== undefined) ? value.$number : value;
	return value >= argument;
}
"#,
    ),
    (
        "tosca.constraint.less_than",
        r#"
function validate(value, argument) {
	value = (value && value.$number !== undefined) ? value.$number : value;
	return value < argument;
}
"#,
    ),
    (
        "tosca.constraint.less_or_equal",
        r#"
function validate(value, argument) {
	value = (value && value.$number !== undefined) ? value.$number : value;
	return value <= argument;
}
"#,
    ),
    (
        "tosca.constraint.in_range",
        r#"
function validate(value, lower, upper) {
	value = (value && value.$number !== undefined) ? value.$number : value;
	if (value < lower) return false;
	return (upper === 'UNBOUNDED') || (value <= upper);
}
"#,
    ),
    (
        "tosca.constraint.valid_values",
        r#"
function validate(value) {
	for (var i = 1; i < arguments.length; i++)
		if (JSON.stringify(value) === JSON.stringify(arguments[i]))
			return true;
	return false;
}
"#,
    ),
    (
        "tosca.constraint.length",
        r#"
function validate(value, argument) {
	return value.length === argument;
}
"#,
    ),
    (
        "tosca.constraint.min_length",
        r#"
function validate(value, argument) {
	return value.length >= argument;
}
"#,
    ),
    (
        "tosca.constraint.max_length",
        r#"
function validate(value, argument) {
	return value.length <= argument;
}
"#,
    ),
    (
        "tosca.constraint.pattern",
        r#"
function validate(value, argument) {
	return new RegExp(argument).test(value);
}
"#,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_parses_as_yaml() {
        let (value, _) = ir::decode(PROFILE_YAML.as_bytes(), ir::Format::Yaml).unwrap();
        assert_eq!(
            value.get("tosca_definitions_version"),
            Some(&ir::Value::from("tosca_2_0"))
        );
        let data_types = value.get("data_types").and_then(ir::Value::as_map).unwrap();
        for name in ["string", "integer", "list", "scalar-unit.size"] {
            assert!(
                data_types.contains_key(&ir::Value::from(name)),
                "missing {name}"
            );
        }
    }

    #[test]
    fn scriptlets_register_under_their_names() {
        let mut scriptlets = ScriptletNamespace::new();
        register_scriptlets(&mut scriptlets);
        assert!(scriptlets.contains("tosca.constraint.greater_than"));
        assert!(scriptlets.contains("tosca.comparer.scalar-unit"));
    }
}
