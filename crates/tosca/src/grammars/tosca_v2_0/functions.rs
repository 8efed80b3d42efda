use crate::fields::ReadCtx;
use normal::{CallArgument, FunctionCall};

/// Intrinsic function names recognized in the 1.x-compatible bare form.
/// TOSCA 2.0 additionally accepts any `$`-prefixed name.
static FUNCTION_NAMES: &[&str] = &[
    "concat",
    "join",
    "token",
    "get_input",
    "get_property",
    "get_attribute",
    "get_operation_output",
    "get_nodes_of_type",
    "get_artifact",
];

/// Detect the function-call shape: a single-entry map whose key is an
/// intrinsic name (or any `$name`). Arguments convert recursively, so
/// nested calls become call arguments rather than raw maps. The call is
/// recorded, never evaluated.
pub fn to_function_call(ctx: &ReadCtx<'_>, data: &ir::Value) -> Option<FunctionCall> {
    let map = data.as_map()?;
    if map.len() != 1 {
        return None;
    }
    let (key, arguments) = map.iter().next().expect("len was checked");
    let key = key.as_str()?;

    let name = if let Some(stripped) = key.strip_prefix('$') {
        // An escaped "$$" literal is not a call.
        if stripped.starts_with('$') {
            return None;
        }
        stripped
    } else if FUNCTION_NAMES.contains(&key) {
        key
    } else {
        return None;
    };

    let arguments = match arguments {
        ir::Value::List(list) => list.iter().map(|arg| to_argument(ctx, arg)).collect(),
        other => vec![to_argument(ctx, other)],
    };

    Some(
        FunctionCall::new(name, arguments).at(
            Some(ctx.catalog.file_url(ctx.file)),
            ctx.path.clone(),
        ),
    )
}

fn to_argument(ctx: &ReadCtx<'_>, data: &ir::Value) -> CallArgument {
    match to_function_call(ctx, data) {
        Some(call) => CallArgument::Call(Box::new(call)),
        None => CallArgument::Literal(data.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, File};
    use crate::quirks::Quirks;
    use std::sync::Arc;

    fn yaml(text: &str) -> ir::Value {
        ir::decode(text.as_bytes(), ir::Format::Yaml).unwrap().0
    }

    fn with_ctx<R>(f: impl FnOnce(&ReadCtx<'_>) -> R) -> R {
        let catalog = Catalog::new(Arc::new(resources::UrlContext::new()), Quirks::default());
        let file = catalog.add_file(File::new(
            url::Url::parse("internal:/test.yaml").unwrap(),
        ));
        f(&ReadCtx::root(&catalog, file))
    }

    #[test]
    fn detects_bare_intrinsics() {
        with_ctx(|ctx| {
            let call = to_function_call(ctx, &yaml("get_input: port\n")).unwrap();
            assert_eq!(call.name, "get_input");
            assert_eq!(
                call.arguments,
                vec![CallArgument::Literal(ir::Value::from("port"))]
            );
        });
    }

    #[test]
    fn detects_dollar_form_and_nesting() {
        with_ctx(|ctx| {
            let call =
                to_function_call(ctx, &yaml("$concat: [\"a\", {get_input: b}]\n")).unwrap();
            assert_eq!(call.name, "concat");
            assert!(matches!(call.arguments[1], CallArgument::Call(_)));
        });
    }

    #[test]
    fn plain_maps_are_not_calls() {
        with_ctx(|ctx| {
            assert!(to_function_call(ctx, &yaml("port: 8080\n")).is_none());
            assert!(to_function_call(ctx, &yaml("a: 1\nb: 2\n")).is_none());
            assert!(to_function_call(ctx, &yaml("\"$$literal\": x\n")).is_none());
        });
    }
}
