pub mod document;
pub mod node;
pub mod parser;
pub mod ready;

pub use document::{
    AdjacentPosition, Document, DocumentError, DocumentMetadata, DocumentReadyState, InlineScript,
    MutationRecord, MutationType, NodeId,
};
pub use node::{AttributeMap, Node, NodeType, ScriptState};
pub use parser::{parse_fragment, FragmentNode};
pub use ready::ReadyGate;
