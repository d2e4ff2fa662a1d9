pub mod basic_block;
pub mod domain;
pub mod error;
pub mod graph;
pub mod id;
pub mod instruction;
pub mod node;
pub mod parsed;
pub mod raw;
pub mod visitor;

pub use basic_block::{form_basic_blocks, BasicBlock};
pub use domain::{ArgumentRequest, ControlDomain};
pub use error::BuildError;
pub use graph::{BuildState, BuilderConfig, ControlEdge, ControlEdgeKind, ControlGraph};
pub use id::{DomainId, NodeId, ParsedBlockId};
pub use instruction::{
    BinaryOperator, ExpectedArity, Instruction, Opcode, Special, UnaryOperator,
};
pub use node::{ControlNode, InstructionNode, NodeKind, PhiNode, TauNode};
pub use parsed::{ParsedBlock, ParsedMethod};
pub use raw::{LiteralValue, RawInstructionByte, RawMethod};
pub use visitor::{
    walk_blocks, walk_domains, walk_nodes, walk_plain, BlockVisitor, DomainVisitor, NodeVisitor,
    PlainNodeVisitor,
};
