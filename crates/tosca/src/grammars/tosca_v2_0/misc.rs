use crate::fields::{FieldReader, ReadCtx};

/// `[min, max]` occurrence bounds, where max may be `UNBOUNDED`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Occurrences {
    pub min: i64,
    pub max: Option<i64>,
}

impl Occurrences {
    pub fn read(ctx: &ReadCtx<'_>, data: &ir::Value) -> Option<Occurrences> {
        let Some(list) = data.as_list() else {
            ctx.report_wrong_type("list of 2", data);
            return None;
        };
        if list.len() != 2 {
            ctx.report_wrong_type("list of 2", data);
            return None;
        }
        let min = match list[0].as_integer() {
            Some(min) => min,
            None => {
                ctx.child_index(0).report_wrong_type("integer", &list[0]);
                return None;
            }
        };
        let max = match &list[1] {
            ir::Value::String(s) if s == "UNBOUNDED" => None,
            ir::Value::Integer(max) => Some(*max),
            other => {
                ctx.child_index(1)
                    .report_wrong_type("integer or UNBOUNDED", other);
                return None;
            }
        };
        Some(Occurrences { min, max })
    }
}

/// Operation implementation: either a bare artifact name or the long form
/// with dependencies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Implementation {
    pub primary: Option<String>,
    pub dependencies: Vec<String>,
}

impl Implementation {
    pub fn read(ctx: &ReadCtx<'_>, data: &ir::Value) -> Implementation {
        match data {
            ir::Value::String(primary) => Implementation {
                primary: Some(primary.clone()),
                dependencies: Vec::new(),
            },
            _ => {
                let mut fields = FieldReader::new(ctx, data);
                let implementation = Implementation {
                    primary: fields.string("primary"),
                    dependencies: fields.string_list("dependencies").unwrap_or_default(),
                };
                fields.finish();
                implementation
            }
        }
    }
}

/// A substitution mapping target: `[node_template, port]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mapping {
    pub node_template_name: String,
    pub port_name: String,
}

impl Mapping {
    pub fn read(ctx: &ReadCtx<'_>, data: &ir::Value) -> Option<Mapping> {
        let Some(list) = data.as_list() else {
            ctx.report_wrong_type("list of 2 strings", data);
            return None;
        };
        match (list.first().and_then(ir::Value::as_str), list.get(1).and_then(ir::Value::as_str)) {
            (Some(node_template_name), Some(port_name)) if list.len() == 2 => Some(Mapping {
                node_template_name: node_template_name.to_string(),
                port_name: port_name.to_string(),
            }),
            _ => {
                ctx.report_wrong_type("list of 2 strings", data);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, File};
    use crate::entity::FileId;
    use crate::quirks::Quirks;
    use std::sync::Arc;

    fn test_ctx() -> (Catalog, FileId) {
        let catalog = Catalog::new(Arc::new(resources::UrlContext::new()), Quirks::default());
        let file = catalog.add_file(File::new(
            url::Url::parse("internal:/test.yaml").unwrap(),
        ));
        (catalog, file)
    }

    fn yaml(text: &str) -> ir::Value {
        ir::decode(text.as_bytes(), ir::Format::Yaml).unwrap().0
    }

    #[test]
    fn occurrences_accept_unbounded() {
        let (catalog, file) = test_ctx();
        let ctx = ReadCtx::root(&catalog, file);
        assert_eq!(
            Occurrences::read(&ctx, &yaml("[1, UNBOUNDED]")),
            Some(Occurrences { min: 1, max: None })
        );
        assert_eq!(
            Occurrences::read(&ctx, &yaml("[0, 3]")),
            Some(Occurrences {
                min: 0,
                max: Some(3)
            })
        );
        assert_eq!(Occurrences::read(&ctx, &yaml("[1]")), None);
        assert_eq!(catalog.problems.count("WrongType"), 1);
    }

    #[test]
    fn implementation_accepts_short_form() {
        let (catalog, file) = test_ctx();
        let ctx = ReadCtx::root(&catalog, file);
        let implementation = Implementation::read(&ctx, &yaml("scripts/create.sh"));
        assert_eq!(implementation.primary.as_deref(), Some("scripts/create.sh"));
        assert!(catalog.problems.is_empty());
    }
}
