use super::definitions::read_parameter_definition;
use crate::entity::{EntityId, Kind};
use crate::fields::{FieldReader, ReadCtx, Reader};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Workflow {
    pub description: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub input_definitions: BTreeMap<String, EntityId>,
    pub steps: BTreeMap<String, EntityId>,
}

pub fn read_workflow(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let workflow = Workflow {
        description: fields.string("description"),
        metadata: fields.string_map("metadata").unwrap_or_default(),
        input_definitions: fields.entity_map("inputs", read_parameter_definition as Reader),
        steps: fields.entity_map("steps", read_workflow_step as Reader),
    };
    fields.finish();
    ctx.alloc(Kind::Workflow(workflow))
}

#[derive(Debug, Default)]
pub struct WorkflowStep {
    /// A node template or group name.
    pub target_name: Option<String>,
    pub target_node_template: Option<EntityId>,
    pub target_group: Option<EntityId>,
    pub activities: Vec<WorkflowActivity>,
    pub on_success: Vec<String>,
    pub on_failure: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowActivity {
    Delegate(String),
    SetState(String),
    CallOperation { interface: String, operation: String },
    Inline(String),
}

pub fn read_workflow_step(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let activities = match fields.raw("activities") {
        Some(raw) => read_activities(&ctx.field("activities"), &raw),
        None => Vec::new(),
    };
    let step = WorkflowStep {
        target_name: fields.required_string("target"),
        target_node_template: None,
        target_group: None,
        activities,
        on_success: fields.string_list("on_success").unwrap_or_default(),
        on_failure: fields.string_list("on_failure").unwrap_or_default(),
    };
    fields.finish();
    ctx.alloc(Kind::WorkflowStep(step))
}

fn read_activities(ctx: &ReadCtx<'_>, data: &ir::Value) -> Vec<WorkflowActivity> {
    let Some(list) = data.as_list() else {
        ctx.report_wrong_type("list", data);
        return Vec::new();
    };

    list.iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let entry_ctx = ctx.child_index(index);
            let Some(map) = entry.as_map() else {
                entry_ctx.report_wrong_type("single-entry map", entry);
                return None;
            };
            if map.len() != 1 {
                entry_ctx.report_wrong_type("single-entry map", entry);
                return None;
            }
            let (key, value) = map.iter().next().expect("len was checked");
            let Some(argument) = value.as_str() else {
                entry_ctx.report_wrong_type("string", value);
                return None;
            };
            match key.key_string().as_str() {
                "delegate" => Some(WorkflowActivity::Delegate(argument.to_string())),
                "set_state" => Some(WorkflowActivity::SetState(argument.to_string())),
                "inline" => Some(WorkflowActivity::Inline(argument.to_string())),
                "call_operation" => match argument.split_once('.') {
                    Some((interface, operation)) => Some(WorkflowActivity::CallOperation {
                        interface: interface.to_string(),
                        operation: operation.to_string(),
                    }),
                    None => {
                        entry_ctx.report(
                            "WrongType",
                            format!(
                                "malformed operation reference (want interface.operation): {argument:?}"
                            ),
                        );
                        None
                    }
                },
                other => {
                    entry_ctx.report(
                        "UnsupportedField",
                        format!("unsupported activity: {other:?}"),
                    );
                    None
                }
            }
        })
        .collect()
}
