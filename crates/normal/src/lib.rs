//! The canonical, grammar-neutral form that parsed service templates
//! normalize into, one step before the Clout graph.

mod function_call;
mod template;
mod value;

pub use function_call::{CallArgument, FunctionCall};
pub use template::{
    Artifact, Capability, Group, Interface, MappedPort, NodeTemplate, Operation, Policy,
    Relationship, Requirement, Scriptlet, ServiceTemplate, Substitution, Workflow,
    WorkflowActivity, WorkflowStep,
};
pub use value::{
    constrainables_to_value, CallNode, Constrainable, ListNode, MapNode, TypeInformation,
    ValueInformation, ValueNode,
};
