//! The canonical post-normalization graph: vertexes, edges, metadata, and
//! the wire formats they round-trip through.

mod compile;
mod graph;
mod wire;

pub use compile::{compile, CompileError};
pub use graph::{Clout, Edge, EdgeRef, Vertex, VERSION};
pub use wire::CloutError;

/// Metadata key under which the engine stores its own bookkeeping
/// (version, scriptlet namespace) inside a Clout.
pub const ENGINE_METADATA_KEY: &str = "toscana";
