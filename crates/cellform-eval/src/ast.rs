//! Arena-backed expression tree.
//!
//! Nodes live in a flat `Vec` and point at each other by [`NodeId`]; the tree
//! is immutable once built, so one `Ast` can be evaluated repeatedly and from
//! multiple threads against different snapshots.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use smallvec::SmallVec;

use cellform_common::CellValue;

use crate::function::Function;
use crate::reference::Reference;

/// Index of a node in its [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// The call at this node may suspend.
        const ASYNC    = 0b0000_0001;
        /// The call at this node must not be cached across passes.
        const VOLATILE = 0b0000_0010;
        /// The call at this node depends on where the formula lives.
        const ADDRESS  = 0b0000_0100;
    }
}

/// Unary prefix written before an operand or call head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    /// Leading `-`: numeric negation.
    Minus,
    /// Leading `@`: implicit intersection of an array result.
    Intersect,
}

/// The closed set of node shapes the evaluator dispatches on.
///
/// There is no operator variant: infix and postfix operators are built as
/// `Call` nodes over their registered executors, so the evaluator has exactly
/// one call path.
#[derive(Clone)]
pub enum NodeKind {
    /// Settled constant: literals, error literals, constant arrays, and the
    /// `#NAME?` placeholder for unknown functions.
    Value(CellValue),
    Reference(Reference),
    Call {
        name: String,
        func: Arc<dyn Function>,
    },
    Prefix(PrefixOp),
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Value(v) => f.debug_tuple("Value").field(v).finish(),
            NodeKind::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
            NodeKind::Call { name, .. } => f.debug_struct("Call").field("name", name).finish(),
            NodeKind::Prefix(op) => f.debug_tuple("Prefix").field(op).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AstNode {
    pub kind: NodeKind,
    pub children: SmallVec<[NodeId; 2]>,
    pub flags: NodeFlags,
}

impl AstNode {
    pub fn new(kind: NodeKind) -> Self {
        AstNode {
            kind,
            children: SmallVec::new(),
            flags: NodeFlags::empty(),
        }
    }
}

/// A built expression tree plus its arena.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<AstNode>,
    root: NodeId,
}

impl Ast {
    pub(crate) fn new(nodes: Vec<AstNode>, root: NodeId) -> Self {
        Ast { nodes, root }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All references the formula reads, in arena order. Hosts use this for
    /// dependency extraction before any evaluation happens.
    pub fn references(&self) -> Vec<&Reference> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Reference(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Whether any call in the tree may suspend.
    pub fn is_async(&self) -> bool {
        self.nodes.iter().any(|n| n.flags.contains(NodeFlags::ASYNC))
    }

    /// Whether any call in the tree is volatile.
    pub fn is_volatile(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| n.flags.contains(NodeFlags::VOLATILE))
    }
}

/// Arena under construction; hands out ids as nodes are pushed.
#[derive(Debug, Default)]
pub(crate) struct AstArena {
    nodes: Vec<AstNode>,
}

impl AstArena {
    pub(crate) fn push(&mut self, node: AstNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub(crate) fn finish(self, root: NodeId) -> Ast {
        Ast::new(self.nodes, root)
    }
}
