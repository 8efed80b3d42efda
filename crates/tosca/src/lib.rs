//! The TOSCA engine: grammars, the entity kernel, and the multi-phase
//! pipeline that parses, validates and normalizes service templates.

mod catalog;
mod dispatch;
mod entity;
mod fields;
mod grammar;
pub mod grammars;
mod hierarchy;
mod namespace;
pub mod parser;
mod problems;
mod quirks;
mod scriptlets;

pub use catalog::{Catalog, File, ImportEdge, Inputs, Site};
pub use entity::{Arena, Entity, EntityId, FileId, Kind, Meta, TypeTag};
pub use fields::{FieldReader, ReadCtx, Reader};
pub use grammar::{detect, Detected, Grammar, GRAMMARS};
pub use hierarchy::{Hierarchy, Insert};
pub use namespace::{NameTransformer, Namespace};
pub use parser::{parse, ParseOptions, Parsed};
pub use problems::{Problem, Problems, Severity};
pub use quirks::Quirks;
pub use scriptlets::{parse_scriptlet_name, ScriptletNamespace};
