//! DriveShaft DOM - Document Object Model
//!
//! Arena-based DOM tree shared by the parser, the network layer (form data)
//! and the reconciliation engine.

mod interner;
mod node;
mod tree;
mod document;
mod selector;
mod dom_events;
mod script;
pub mod forms;

pub use interner::{InternedString, StringInterner};
pub use node::{Attribute, ElementData, Node, NodeData, TextData};
pub use tree::{Children, Descendants, DomTree};
pub use document::Document;
pub use selector::{Selector, SelectorError};
pub use dom_events::DomEvent;
pub use script::{ScriptExecutor, ScriptSource};
pub use forms::{FormData, FormDataValue, FormEnctype};

/// Node identifier: arena slot plus the generation of that slot.
///
/// Slots are recycled once their node is removed; the generation is bumped
/// on every recycle so an id held from before never resolves to the new
/// occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Root (document) node ID
    pub const ROOT: NodeId = NodeId::new(0, 0);
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId::new(u32::MAX, 0);

    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Check this is not the `NONE` sentinel
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    /// Arena slot index
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when this id was handed out
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("node {0:?} not found")]
    NotFound(NodeId),

    #[error("hierarchy request error")]
    HierarchyRequest,

    #[error("reference node is not a child of the parent")]
    NotAChild,

    #[error("invalid node type for this operation")]
    InvalidNodeType,
}
