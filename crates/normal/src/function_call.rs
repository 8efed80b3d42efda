use url::Url;

/// An unevaluated call of a named scriptlet. The pipeline never executes
/// these; they are carried through normalization as opaque nodes for a
/// downstream runtime to evaluate.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Vec<CallArgument>,
    /// Source coordinates, kept so evaluation-time failures can still
    /// point at the template.
    pub url: Option<Url>,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CallArgument {
    Literal(ir::Value),
    Call(Box<FunctionCall>),
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Vec<CallArgument>) -> Self {
        Self {
            name: name.into(),
            arguments,
            url: None,
            path: String::new(),
        }
    }

    pub fn at(mut self, url: Option<Url>, path: impl Into<String>) -> Self {
        self.url = url;
        self.path = path.into();
        self
    }

    /// Wire form: `{"$functionCall": {"name": ..., "arguments": [...]}}`.
    pub fn to_value(&self) -> ir::Value {
        let mut call = ir::Map::new();
        call.insert("name".into(), ir::Value::from(self.name.clone()));
        call.insert(
            "arguments".into(),
            ir::Value::List(self.arguments.iter().map(CallArgument::to_value).collect()),
        );
        if let Some(url) = &self.url {
            call.insert("url".into(), ir::Value::from(url.as_str()));
        }
        if !self.path.is_empty() {
            call.insert("path".into(), ir::Value::from(self.path.clone()));
        }

        let mut wrapper = ir::Map::new();
        wrapper.insert("$functionCall".into(), ir::Value::Map(call));
        ir::Value::Map(wrapper)
    }
}

impl CallArgument {
    pub fn to_value(&self) -> ir::Value {
        match self {
            CallArgument::Literal(value) => value.clone(),
            CallArgument::Call(call) => call.to_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_nests_calls() {
        let inner = FunctionCall::new("get_input", vec![CallArgument::Literal("port".into())]);
        let outer = FunctionCall::new(
            "concat",
            vec![
                CallArgument::Literal("http://host:".into()),
                CallArgument::Call(Box::new(inner)),
            ],
        );
        let wire = outer.to_value().to_json();
        assert_eq!(wire["$functionCall"]["name"], "concat");
        assert_eq!(
            wire["$functionCall"]["arguments"][1]["$functionCall"]["name"],
            "get_input"
        );
    }
}
