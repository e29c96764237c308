//! The data model: names, blocks, attributes and document trees.

mod attributes;
mod named_block;
mod reference_name;
pub mod resolve;
mod tangle;
mod tree;

pub use attributes::Attributes;
pub use named_block::NamedBlock;
pub use reference_name::{slash_path, ReferenceName};
pub use resolve::{render, resolve_block, BlockLookup, Diagnostic, Resolution};
pub use tangle::{comment_for_target, tangle_target, Tangled};
pub use tree::{
    flat_content, has_unresolved, outgoing_references, parse_references, push_line,
    remove_blocks, CycleMarker, Document, DocumentTree, RawSegment, Reference, ResolvedBlock,
    Shape,
};
