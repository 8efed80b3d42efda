use crate::grammars::{hot, tosca_v2_0 as t2};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Handle of an entity within the session arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u32);

/// Handle of a file unit within the session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

/// Per-entity context: where the entity came from and how to talk about
/// it in problem reports.
#[derive(Clone, Debug)]
pub struct Meta {
    /// Local name, usually the map key the entity was read under.
    pub name: String,
    /// Dotted path from the document root, e.g.
    /// `topology_template.node_templates["a"].properties["p"]`.
    pub path: String,
    pub file: FileId,
    pub locator: Option<ir::Locator>,
}

#[derive(Debug)]
pub struct Entity {
    pub meta: Meta,
    pub kind: Kind,
}

/// Every typed concept a grammar reader can produce. Per-kind behavior
/// (traversal, lookup, inheritance, rendering, normalization) dispatches
/// over this enum; capability predicates become matches over it.
#[derive(Debug)]
pub enum Kind {
    File(t2::File),
    Import(t2::Import),
    Repository(t2::Repository),
    DataType(t2::DataType),
    Schema(t2::Schema),
    AttributeDefinition(t2::AttributeDefinition),
    PropertyDefinition(t2::PropertyDefinition),
    ParameterDefinition(t2::ParameterDefinition),
    CapabilityDefinition(t2::CapabilityDefinition),
    RequirementDefinition(t2::RequirementDefinition),
    RelationshipDefinition(t2::RelationshipDefinition),
    InterfaceDefinition(t2::InterfaceDefinition),
    OperationDefinition(t2::OperationDefinition),
    NodeType(t2::NodeType),
    CapabilityType(t2::CapabilityType),
    RelationshipType(t2::RelationshipType),
    InterfaceType(t2::InterfaceType),
    ArtifactType(t2::ArtifactType),
    GroupType(t2::GroupType),
    PolicyType(t2::PolicyType),
    TopologyTemplate(t2::TopologyTemplate),
    NodeTemplate(t2::NodeTemplate),
    RelationshipTemplate(t2::RelationshipTemplate),
    RequirementAssignment(t2::RequirementAssignment),
    CapabilityAssignment(t2::CapabilityAssignment),
    RelationshipAssignment(t2::RelationshipAssignment),
    InterfaceAssignment(t2::InterfaceAssignment),
    OperationAssignment(t2::OperationAssignment),
    Artifact(t2::Artifact),
    Group(t2::Group),
    Policy(t2::Policy),
    Workflow(t2::Workflow),
    WorkflowStep(t2::WorkflowStep),
    SubstitutionMappings(t2::SubstitutionMappings),
    Value(t2::Value),
    HotTemplate(hot::Template),
    HotParameter(hot::Parameter),
    HotResource(hot::Resource),
    HotOutput(hot::Output),
}

/// Namespace/hierarchy key: the same simple name can exist for different
/// tags without collision.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    DataType,
    NodeType,
    CapabilityType,
    RelationshipType,
    InterfaceType,
    ArtifactType,
    GroupType,
    PolicyType,
    NodeTemplate,
    RelationshipTemplate,
    Group,
    Policy,
    Repository,
    Workflow,
    HotResource,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeTag::DataType => "data type",
            TypeTag::NodeType => "node type",
            TypeTag::CapabilityType => "capability type",
            TypeTag::RelationshipType => "relationship type",
            TypeTag::InterfaceType => "interface type",
            TypeTag::ArtifactType => "artifact type",
            TypeTag::GroupType => "group type",
            TypeTag::PolicyType => "policy type",
            TypeTag::NodeTemplate => "node template",
            TypeTag::RelationshipTemplate => "relationship template",
            TypeTag::Group => "group",
            TypeTag::Policy => "policy",
            TypeTag::Repository => "repository",
            TypeTag::Workflow => "workflow",
            TypeTag::HotResource => "resource",
        })
    }
}

/// The session arena. Entities are appended during reading and rendering
/// and live for the whole parse session; handles never dangle. Each cell
/// carries its own lock, which doubles as the per-entity lock of the
/// inheritance phase.
#[derive(Default)]
pub struct Arena {
    cells: RwLock<Vec<Arc<RwLock<Entity>>>>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&self, entity: Entity) -> EntityId {
        let mut cells = self.cells.write();
        let id = EntityId(cells.len() as u32);
        cells.push(Arc::new(RwLock::new(entity)));
        id
    }

    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<EntityId> {
        (0..self.len() as u32).map(EntityId).collect()
    }

    pub fn cell(&self, id: EntityId) -> Arc<RwLock<Entity>> {
        self.cells.read()[id.0 as usize].clone()
    }

    /// Read-access an entity. Recursive read locking keeps re-entrant
    /// walks over shared data types safe within a phase.
    pub fn with<R>(&self, id: EntityId, f: impl FnOnce(&Entity) -> R) -> R {
        let cell = self.cell(id);
        let guard = cell.read_recursive();
        f(&guard)
    }

    /// Write-access an entity. Must not be nested inside `with` of the
    /// same entity.
    pub fn with_mut<R>(&self, id: EntityId, f: impl FnOnce(&mut Entity) -> R) -> R {
        let cell = self.cell(id);
        let mut guard = cell.write();
        f(&mut guard)
    }

    pub fn name_of(&self, id: EntityId) -> String {
        self.with(id, |entity| entity.meta.name.clone())
    }

    pub fn meta_of(&self, id: EntityId) -> Meta {
        self.with(id, |entity| entity.meta.clone())
    }
}

/// Append a map-key segment to a dotted path.
pub fn path_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        format!("[{key:?}]")
    } else {
        format!("{path}[{key:?}]")
    }
}

/// Append a field segment to a dotted path.
pub fn path_field(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

/// Append a list-index segment to a dotted path.
pub fn path_index(path: &str, index: usize) -> String {
    if path.is_empty() {
        format!("[{index}]")
    } else {
        format!("{path}[{index}]")
    }
}
