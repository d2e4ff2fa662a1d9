//! Control-graph node model (component C of §3): the three-variant
//! `ControlNode` sum type and the value-flow bookkeeping (arguments,
//! consumers) each variant carries. Control-flow edges themselves live in
//! the graph's petgraph store (see `graph.rs`); only argument/consumer
//! relationships are node-local.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::{DomainId, NodeId, ParsedBlockId};
use crate::instruction::Instruction;

/// Wraps one decoded `Instruction`. `attached_block` is set only for
/// `pushBlock` nodes, resolved during Phase 1 construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionNode {
    pub instruction: Instruction,
    /// Positional argument slots this instruction consumes, indexed by the
    /// opcode's own argument-slot convention (§4.D table). `None` until the
    /// linker resolves that slot.
    pub arguments: Vec<Option<NodeId>>,
    pub consumers: BTreeSet<NodeId>,
    pub attached_block: Option<ParsedBlockId>,
}

impl InstructionNode {
    pub fn new(instruction: Instruction) -> Self {
        InstructionNode {
            instruction,
            arguments: Vec::new(),
            consumers: BTreeSet::new(),
            attached_block: None,
        }
    }

    pub fn set_argument(&mut self, slot: u32, value: NodeId) {
        let slot = slot as usize;
        if self.arguments.len() <= slot {
            self.arguments.resize(slot + 1, None);
        }
        self.arguments[slot] = Some(value);
    }
}

/// A join value inserted by the linker when an argument request cannot be
/// satisfied from a single referer. `phi_index` names the argument slot of
/// `consumer` that this phi feeds, needed by Phase 3's degenerate-phi
/// splice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhiNode {
    pub incoming: Vec<(DomainId, NodeId)>,
    pub consumer: Option<NodeId>,
    pub phi_index: u32,
    pub consumers: BTreeSet<NodeId>,
}

impl PhiNode {
    pub fn new(phi_index: u32) -> Self {
        PhiNode {
            incoming: Vec::new(),
            consumer: None,
            phi_index,
            consumers: BTreeSet::new(),
        }
    }

    /// `optimizePhi`'s "all incomings resolve to one unique value" test.
    pub fn unique_incoming_value(&self) -> Option<NodeId> {
        let mut values = self.incoming.iter().map(|(_, node)| *node);
        let first = values.next()?;
        if values.all(|node| node == first) {
            Some(first)
        } else {
            None
        }
    }
}

/// Reserved placeholder for type-refinement joins over temporaries. Never
/// produced by the current builder (§9 Open Questions); kept as a variant
/// so the node taxonomy matches the data model exactly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TauNode {
    pub consumers: BTreeSet<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    Instruction(InstructionNode),
    Phi(PhiNode),
    Tau(TauNode),
}

/// A node in the control graph: one of an instruction, a phi, or a
/// (currently unused) tau, tagged with its allocation-order `index` and
/// owning domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlNode {
    pub index: NodeId,
    pub domain: DomainId,
    pub kind: NodeKind,
}

impl ControlNode {
    pub fn instruction(&self) -> Option<&InstructionNode> {
        match &self.kind {
            NodeKind::Instruction(node) => Some(node),
            _ => None,
        }
    }

    pub fn instruction_mut(&mut self) -> Option<&mut InstructionNode> {
        match &mut self.kind {
            NodeKind::Instruction(node) => Some(node),
            _ => None,
        }
    }

    pub fn phi(&self) -> Option<&PhiNode> {
        match &self.kind {
            NodeKind::Phi(node) => Some(node),
            _ => None,
        }
    }

    pub fn phi_mut(&mut self) -> Option<&mut PhiNode> {
        match &mut self.kind {
            NodeKind::Phi(node) => Some(node),
            _ => None,
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self.kind, NodeKind::Phi(_))
    }

    pub fn is_tau(&self) -> bool {
        matches!(self.kind, NodeKind::Tau(_))
    }

    pub fn is_terminator(&self) -> bool {
        self.instruction().is_some_and(|n| n.instruction.is_terminator())
    }

    pub fn is_value_provider(&self) -> bool {
        match &self.kind {
            NodeKind::Instruction(n) => n.instruction.is_value_provider(),
            NodeKind::Phi(_) => true,
            NodeKind::Tau(_) => true,
        }
    }

    pub fn consumers(&self) -> &BTreeSet<NodeId> {
        match &self.kind {
            NodeKind::Instruction(n) => &n.consumers,
            NodeKind::Phi(n) => &n.consumers,
            NodeKind::Tau(n) => &n.consumers,
        }
    }

    pub fn consumers_mut(&mut self) -> &mut BTreeSet<NodeId> {
        match &mut self.kind {
            NodeKind::Instruction(n) => &mut n.consumers,
            NodeKind::Phi(n) => &mut n.consumers,
            NodeKind::Tau(n) => &mut n.consumers,
        }
    }

    pub fn add_consumer(&mut self, consumer: NodeId) {
        self.consumers_mut().insert(consumer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Opcode;

    #[test]
    fn phi_with_identical_incomings_is_redundant() {
        let mut phi = PhiNode::new(0);
        phi.incoming.push((DomainId(0), NodeId(1)));
        phi.incoming.push((DomainId(4), NodeId(1)));
        assert_eq!(phi.unique_incoming_value(), Some(NodeId(1)));
    }

    #[test]
    fn phi_with_distinct_incomings_is_kept() {
        let mut phi = PhiNode::new(0);
        phi.incoming.push((DomainId(0), NodeId(1)));
        phi.incoming.push((DomainId(4), NodeId(2)));
        assert_eq!(phi.unique_incoming_value(), None);
    }

    #[test]
    fn instruction_node_reports_value_provider_from_opcode() {
        let instr = Instruction::new(0, Opcode::PushLiteral, 0, 0);
        let node = ControlNode {
            index: NodeId(0),
            domain: DomainId(0),
            kind: NodeKind::Instruction(InstructionNode::new(instr)),
        };
        assert!(node.is_value_provider());
        assert!(!node.is_terminator());
    }
}
