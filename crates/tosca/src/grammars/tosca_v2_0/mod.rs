//! The TOSCA 2.0 grammar: entity structs, readers, the embedded profile,
//! and the per-kind inheritance/render/normalize behavior. Earlier TOSCA
//! versions delegate here through shims.

mod data;
mod definitions;
mod file;
mod functions;
mod inherit;
mod misc;
mod normalize;
mod profile;
mod render;
mod scalar;
mod templates;
mod types;
mod value;
mod workflows;

pub use data::{ConstraintClause, DataType, InternalType, Schema};
pub use definitions::{
    AttributeDefinition, CapabilityDefinition, InterfaceDefinition, OperationDefinition,
    ParameterDefinition, PropertyDefinition, RelationshipDefinition, RequirementDefinition,
};
pub use file::{import_specs, File, Import, ImportSpec, Repository};
pub use functions::to_function_call;
pub use inherit::inherit_entity;
pub use misc::{Implementation, Mapping, Occurrences};
pub use normalize::{normalize_service_template, normalize_value, type_lineage};
pub use profile::PROFILE_PATH;
pub use render::render_entity;
pub use templates::{
    Artifact, CapabilityAssignment, Group, InterfaceAssignment, NodeTemplate,
    OperationAssignment, Policy, RelationshipAssignment, RelationshipTemplate,
    RequirementAssignment, SubstitutionMappings, TopologyTemplate,
};
pub use types::{
    ArtifactType, CapabilityType, GroupType, InterfaceType, NodeType, PolicyType,
    RelationshipType, TypeCommon,
};
pub use value::{read_attribute_value, read_value, render_value_for, Value, ValueData};
pub use workflows::{Workflow, WorkflowActivity, WorkflowStep};

use crate::grammar::Grammar;

/// Metadata keys interpreted by the engine.
pub const METADATA_TYPE: &str = "toscana.type";
pub const METADATA_CONVERTER: &str = "toscana.converter";
pub const METADATA_COMPARER: &str = "toscana.comparer";
pub const METADATA_SCRIPTLET_PREFIX: &str = "toscana.scriptlet:";
pub const METADATA_SCRIPTLET_IMPORT_PREFIX: &str = "toscana.scriptlet.import:";
pub const METADATA_INFORMATION_PREFIX: &str = "toscana.information:";
pub const METADATA_NORMATIVE: &str = "tosca.normative";

pub static GRAMMAR: Grammar = Grammar {
    name: "tosca_v2_0",
    selector_key: "tosca_definitions_version",
    versions: &[("tosca_2_0", Some(profile::PROFILE_PATH))],
    read_root: file::read_root,
    read_file: file::read_file,
    register: profile::register,
};
