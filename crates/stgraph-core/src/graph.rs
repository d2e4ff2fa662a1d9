//! `ControlGraph`: the three-phase builder that lifts a parsed block's
//! stack bytecode into a control/data-flow graph with phi nodes.
//!
//! Construction runs Phase 1 (per-block abstract stack simulation), Phase 2
//! (branch linking + argument-request resolution + phi insertion), and
//! Phase 3 (dead-push and degenerate-phi cleanup, gated by
//! [`BuilderConfig::optimize`]). The builder is a one-shot state machine
//! (`Constructing -> Linking -> Optimizing -> Done`); a built graph is read
//! through `&ControlGraph` only.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use petgraph::stable_graph::StableGraph;
use petgraph::Directed;
use petgraph::Direction;

use crate::basic_block::form_basic_blocks;
use crate::domain::ControlDomain;
use crate::error::BuildError;
use crate::id::{DomainId, NodeId, ParsedBlockId};
use crate::instruction::{Instruction, Opcode, Special};
use crate::node::{ControlNode, InstructionNode, NodeKind, PhiNode};
use crate::parsed::ParsedMethod;

/// The one real builder knob: whether Phase 3's dead-push/redundant-phi
/// sweep runs. Default on; a caller inspecting the pre-optimization shape
/// (a coverage tool, say) can ask for the linked-but-unoptimized graph.
#[derive(Debug, Clone, Copy)]
pub struct BuilderConfig {
    pub optimize: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig { optimize: true }
    }
}

/// The control graph's own build-state machine. No regression between
/// states; a graph is built exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Constructing,
    Linking,
    Optimizing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEdgeKind {
    /// `referer.terminator -> domain.entryPoint`, from Phase 2's branching
    /// step.
    Branch,
    /// The requesting/producing pair of a resolved argument, when both
    /// nodes share a domain or either end is a phi.
    Argument,
    /// Added by the within-domain sweep to keep a domain strongly ordered
    /// when no stack dependency already provides an out-edge.
    Synthetic,
}

#[derive(Debug, Clone, Copy)]
pub struct ControlEdge {
    pub kind: ControlEdgeKind,
}

type Graph = StableGraph<ControlNode, ControlEdge, Directed, u32>;

/// Owns all nodes and all domains of one analyzed block, keyed by basic
/// block offset.
#[derive(Debug, Clone)]
pub struct ControlGraph {
    graph: Graph,
    domains: IndexMap<DomainId, ControlDomain>,
    state: BuildState,
}

impl ControlGraph {
    /// Builds a graph for `block_id` within `method`, with Phase 3
    /// optimization enabled. Idempotent in the sense that it always starts
    /// from a fresh graph; calling it twice produces two independent,
    /// structurally identical graphs.
    pub fn build_graph(method: &ParsedMethod, block_id: ParsedBlockId) -> Result<Self, BuildError> {
        Self::build_graph_with(method, block_id, BuilderConfig::default())
    }

    pub fn build_graph_with(
        method: &ParsedMethod,
        block_id: ParsedBlockId,
        config: BuilderConfig,
    ) -> Result<Self, BuildError> {
        let parsed_block = method.block(block_id);
        let basic_blocks = form_basic_blocks(&parsed_block.instructions);

        let mut graph = ControlGraph {
            graph: StableGraph::with_capacity(0, 0),
            domains: IndexMap::new(),
            state: BuildState::Constructing,
        };

        for bb in basic_blocks {
            let domain_id = DomainId(bb.offset);
            graph.domains.insert(domain_id, ControlDomain::new(bb));
        }

        graph.run_construction(method)?;

        graph.state = BuildState::Linking;
        graph.run_linking()?;

        graph.state = BuildState::Optimizing;
        if config.optimize {
            graph.run_optimization();
        }

        graph.state = BuildState::Done;
        Ok(graph)
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn domain(&self, id: DomainId) -> Option<&ControlDomain> {
        self.domains.get(&id)
    }

    /// Domains in strictly increasing block-offset order (construction
    /// order, preserved by `IndexMap` insertion order).
    pub fn domains_in_order(&self) -> impl Iterator<Item = (DomainId, &ControlDomain)> {
        self.domains.iter().map(|(id, d)| (*id, d))
    }

    pub fn node(&self, id: NodeId) -> Option<&ControlNode> {
        self.graph.node_weight(id.into())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut ControlNode> {
        self.graph.node_weight_mut(id.into())
    }

    /// All nodes, in ascending index order (the allocation order that
    /// survives deletions as gaps, never reordering).
    pub fn nodes(&self) -> Vec<(NodeId, &ControlNode)> {
        let mut out: Vec<(NodeId, &ControlNode)> = self
            .graph
            .node_indices()
            .map(|idx| {
                let id = NodeId::from(idx);
                (id, self.graph.node_weight(idx).expect("index came from node_indices"))
            })
            .collect();
        out.sort_by_key(|(id, _)| id.0);
        out
    }

    pub fn out_edges(&self, id: NodeId) -> Vec<(NodeId, ControlEdgeKind)> {
        self.graph
            .edges_directed(id.into(), Direction::Outgoing)
            .map(|e| (NodeId::from(e.target()), e.weight().kind))
            .collect()
    }

    pub fn in_edges(&self, id: NodeId) -> Vec<(NodeId, ControlEdgeKind)> {
        self.graph
            .edges_directed(id.into(), Direction::Incoming)
            .map(|e| (NodeId::from(e.source()), e.weight().kind))
            .collect()
    }

    fn add_edge(&mut self, from: NodeId, to: NodeId, kind: ControlEdgeKind) {
        if self.graph.find_edge(from.into(), to.into()).is_none() {
            self.graph.add_edge(from.into(), to.into(), ControlEdge { kind });
        }
    }

    fn remove_edge(&mut self, from: NodeId, to: NodeId) {
        if let Some(e) = self.graph.find_edge(from.into(), to.into()) {
            self.graph.remove_edge(e);
        }
    }

    fn new_instruction_node(&mut self, domain_id: DomainId, instruction: Instruction) -> NodeId {
        let index = self.graph.add_node(ControlNode {
            index: NodeId(0), // patched below
            domain: domain_id,
            kind: NodeKind::Instruction(InstructionNode::new(instruction)),
        });
        let id = NodeId::from(index);
        self.graph.node_weight_mut(index).unwrap().index = id;
        id
    }

    fn new_phi_node(&mut self, domain_id: DomainId, phi_index: u32) -> NodeId {
        let index = self.graph.add_node(ControlNode {
            index: NodeId(0),
            domain: domain_id,
            kind: NodeKind::Phi(PhiNode::new(phi_index)),
        });
        let id = NodeId::from(index);
        self.graph.node_weight_mut(index).unwrap().index = id;
        id
    }

    // ---- Phase 1: Construction ----------------------------------------

    fn run_construction(&mut self, method: &ParsedMethod) -> Result<(), BuildError> {
        let domain_ids: Vec<DomainId> = self.domains.keys().copied().collect();
        for domain_id in domain_ids {
            self.construct_domain(method, domain_id)?;
        }
        Ok(())
    }

    fn construct_domain(&mut self, method: &ParsedMethod, domain_id: DomainId) -> Result<(), BuildError> {
        let instructions = self.domains[&domain_id].basic_block.instructions.clone();

        for instruction in instructions {
            if instruction.is_branch() {
                let target = DomainId(instruction.extra);
                if !self.domains.contains_key(&target) {
                    return Err(BuildError::UnresolvedBranchTarget {
                        offset: instruction.extra,
                    });
                }
            }

            let node_id = self.new_instruction_node(domain_id, instruction);

            if instruction.opcode == Opcode::PushBlock {
                let child = method
                    .parsed_block_by_end_offset(instruction.extra)
                    .ok_or(BuildError::UnresolvedBlockOffset {
                        offset: instruction.extra,
                    })?;
                if let Some(node) = self.node_mut(node_id).and_then(|n| n.instruction_mut()) {
                    node.attached_block = Some(child);
                }
            }

            self.apply_stack_effects(domain_id, node_id, instruction);

            self.domains.get_mut(&domain_id).unwrap().push_node(node_id);

            if instruction.is_terminator() {
                self.domains.get_mut(&domain_id).unwrap().set_terminator(node_id);
            }
        }
        Ok(())
    }

    /// Implements the §4.D stack-action table for one instruction's node.
    fn apply_stack_effects(&mut self, domain_id: DomainId, node_id: NodeId, instruction: Instruction) {
        let request = |graph: &mut Self, slot: u32, non_consuming: bool| {
            let resolved = graph
                .domains
                .get_mut(&domain_id)
                .unwrap()
                .resolve_or_request(slot, node_id, non_consuming);
            if let Some(value) = resolved {
                graph.bind_argument(domain_id, node_id, slot, value);
            }
        };

        match instruction.opcode {
            Opcode::PushInstance
            | Opcode::PushArgument
            | Opcode::PushTemporary
            | Opcode::PushLiteral
            | Opcode::PushConstant
            | Opcode::PushBlock => {
                self.domains.get_mut(&domain_id).unwrap().stack_push(node_id);
            }
            Opcode::AssignInstance | Opcode::AssignTemporary => {
                request(self, 0, true);
            }
            Opcode::SendUnary => {
                request(self, 0, false);
                self.domains.get_mut(&domain_id).unwrap().stack_push(node_id);
            }
            Opcode::SendBinary => {
                request(self, 1, false);
                request(self, 0, false);
                self.domains.get_mut(&domain_id).unwrap().stack_push(node_id);
            }
            Opcode::SendMessage => {
                request(self, 0, false);
                self.domains.get_mut(&domain_id).unwrap().stack_push(node_id);
            }
            Opcode::MarkArguments => {
                let n = instruction.argument;
                let mut index = n;
                while index > 0 {
                    index -= 1;
                    request(self, index, false);
                }
                self.domains.get_mut(&domain_id).unwrap().stack_push(node_id);
            }
            Opcode::DoPrimitive => {
                const BLOCK_INVOKE: u32 = 8;
                if instruction.extra == BLOCK_INVOKE {
                    request(self, 0, false); // the block object
                    // FIXME (preserved verbatim, see §9): never reaches index 0.
                    let mut index = instruction.argument.saturating_sub(1);
                    while index > 0 {
                        request(self, index, false);
                        index -= 1;
                    }
                } else if instruction.argument > 0 {
                    let mut index = instruction.argument;
                    while index > 0 {
                        index -= 1;
                        request(self, index, false);
                    }
                }
                self.domains.get_mut(&domain_id).unwrap().stack_push(node_id);
            }
            Opcode::DoSpecial => match instruction.special() {
                Some(Special::SelfReturn) => {}
                Some(Special::StackReturn | Special::BlockReturn) => {
                    request(self, 0, false);
                }
                Some(Special::SendToSuper) => {
                    request(self, 0, false);
                    self.domains.get_mut(&domain_id).unwrap().stack_push(node_id);
                }
                Some(Special::Duplicate) => {
                    request(self, 0, true);
                    self.domains.get_mut(&domain_id).unwrap().stack_push(node_id);
                }
                Some(Special::PopTop) => {
                    request(self, 0, false);
                }
                Some(Special::BranchIfTrue | Special::BranchIfFalse) => {
                    request(self, 0, false);
                }
                Some(Special::Branch) | Some(Special::Breakpoint) | None => {}
            },
            Opcode::Extended => {}
        }
    }

    fn bind_argument(&mut self, domain_id: DomainId, consumer: NodeId, slot: u32, value: NodeId) {
        if let Some(node) = self.node_mut(consumer).and_then(|n| n.instruction_mut()) {
            node.set_argument(slot, value);
        }
        if let Some(producer) = self.node_mut(value) {
            producer.add_consumer(consumer);
        }
        let producer_domain = self.node(value).map(|n| n.domain);
        if producer_domain == Some(domain_id) {
            self.add_edge(value, consumer, ControlEdgeKind::Argument);
        }
    }

    // ---- Phase 2: Linking ----------------------------------------------

    fn run_linking(&mut self) -> Result<(), BuildError> {
        let domain_ids: Vec<DomainId> = self.domains.keys().copied().collect();

        for &domain_id in &domain_ids {
            self.link_branching(domain_id)?;
        }
        for &domain_id in &domain_ids {
            self.link_argument_requests(domain_id)?;
        }
        for &domain_id in &domain_ids {
            self.sweep_within_domain_ordering(domain_id);
        }
        Ok(())
    }

    fn link_branching(&mut self, domain_id: DomainId) -> Result<(), BuildError> {
        let entry_point = self.domains[&domain_id]
            .entry_point
            .expect("every domain has a non-null entry point (invariant 2)");
        let referers: Vec<u32> = self.domains[&domain_id]
            .basic_block
            .referers
            .iter()
            .copied()
            .collect();

        for referer_offset in referers {
            let referer_id = DomainId(referer_offset);
            let terminator = self
                .domains
                .get(&referer_id)
                .ok_or(BuildError::DanglingReferer { domain: domain_id })?
                .terminator
                .expect("every domain has a non-null terminator (invariant 2)");
            self.add_edge(terminator, entry_point, ControlEdgeKind::Branch);
        }
        Ok(())
    }

    fn link_argument_requests(&mut self, domain_id: DomainId) -> Result<(), BuildError> {
        let requests = self.domains[&domain_id].requested_arguments.clone();
        for request in requests {
            let value = self.get_requested_node(domain_id, request.relative_index)?;
            self.bind_argument(domain_id, request.requesting_node, request.slot, value);
        }
        Ok(())
    }

    /// `getRequestedNode`: walks `domain`'s referer set to satisfy a
    /// cross-block argument request at relative index `k`, inserting a phi
    /// when more than one referer contributes.
    fn get_requested_node(&mut self, domain_id: DomainId, k: u32) -> Result<NodeId, BuildError> {
        let referers: Vec<u32> = self.domains[&domain_id]
            .basic_block
            .referers
            .iter()
            .copied()
            .collect();
        debug_assert!(
            !referers.is_empty(),
            "argument request with no referers to satisfy it from"
        );

        if referers.len() == 1 {
            let referer_id = DomainId(referers[0]);
            return self.fetch_from_referer(referer_id, k);
        }

        let phi_id = self.new_phi_node(domain_id, 0);
        for referer_offset in referers {
            let referer_id = DomainId(referer_offset);
            let contribution = self.fetch_from_referer(referer_id, k)?;

            if let Some(phi) = self.node_mut(phi_id).and_then(|n| n.phi_mut()) {
                phi.incoming.push((referer_id, contribution));
            }
            if let Some(producer) = self.node_mut(contribution) {
                producer.add_consumer(phi_id);
            }
            if self.node(contribution).is_some_and(|n| n.is_phi()) {
                self.add_edge(contribution, phi_id, ControlEdgeKind::Argument);
            }
        }

        Ok(self.optimize_phi(phi_id))
    }

    fn fetch_from_referer(&mut self, referer_id: DomainId, k: u32) -> Result<NodeId, BuildError> {
        let referer_stack_len = self.domains[&referer_id].local_stack.len() as u32;
        if referer_stack_len > 0 && k <= referer_stack_len - 1 {
            let value_index = referer_stack_len - 1 - k;
            Ok(self.domains[&referer_id].local_stack[value_index as usize])
        } else {
            let new_index = k - referer_stack_len;
            self.get_requested_node(referer_id, new_index)
        }
    }

    /// If every incoming of `phi_id` resolves to the same value, delete the
    /// phi and return that value directly; otherwise keep the phi and
    /// return its own id.
    fn optimize_phi(&mut self, phi_id: NodeId) -> NodeId {
        let unique = self
            .node(phi_id)
            .and_then(|n| n.phi())
            .and_then(|phi| phi.unique_incoming_value());

        match unique {
            None => phi_id,
            Some(value) => {
                if let Some(producer) = self.node_mut(value) {
                    producer.consumers_mut().remove(&phi_id);
                }
                self.remove_edge(value, phi_id);
                self.graph.remove_node(phi_id.into());
                value
            }
        }
    }

    /// Every non-terminator node needs >= 1 control out-edge to a
    /// higher-indexed node in the same domain; add a synthetic one to the
    /// next-visited node when no such edge exists.
    fn sweep_within_domain_ordering(&mut self, domain_id: DomainId) {
        let nodes = self.domains[&domain_id].nodes.clone();
        for window in nodes.windows(2) {
            let (node_id, next_id) = (window[0], window[1]);
            if self.node(node_id).is_some_and(|n| n.is_terminator()) {
                continue;
            }
            let has_forward_edge = self.out_edges(node_id).iter().any(|(target, _)| {
                self.node(*target)
                    .is_some_and(|n| n.domain == domain_id && n.index.0 > node_id.0)
            });
            if !has_forward_edge {
                self.add_edge(node_id, next_id, ControlEdgeKind::Synthetic);
            }
        }
    }

    // ---- Phase 3: Optimization ------------------------------------------

    fn run_optimization(&mut self) {
        self.remove_dead_trivial_providers();
        self.splice_degenerate_phis();
    }

    fn remove_dead_trivial_providers(&mut self) {
        loop {
            let mut removed_any = false;
            let candidates: Vec<NodeId> = self
                .nodes()
                .into_iter()
                .filter_map(|(id, node)| {
                    let instr = node.instruction()?;
                    if !instr.instruction.is_trivial() {
                        return None;
                    }
                    Some(id)
                })
                .collect();

            for node_id in candidates {
                let consumers: Vec<NodeId> = match self.node(node_id) {
                    Some(n) => n.consumers().iter().copied().collect(),
                    None => continue,
                };

                if consumers.is_empty() {
                    self.unlink_and_erase(node_id);
                    removed_any = true;
                } else if consumers.len() == 1 {
                    let consumer_is_pop_top = self
                        .node(consumers[0])
                        .and_then(|n| n.instruction())
                        .is_some_and(|i| i.instruction.special() == Some(Special::PopTop));
                    if consumer_is_pop_top {
                        let pop_top = consumers[0];
                        self.unlink_and_erase(node_id);
                        self.unlink_and_erase(pop_top);
                        removed_any = true;
                    }
                }
            }

            if !removed_any {
                break;
            }
        }
    }

    /// Removes `node_id`, asserting it has exactly one control out-edge,
    /// and rewires every in-edge to point at that successor instead.
    fn unlink_and_erase(&mut self, node_id: NodeId) {
        if self.node(node_id).is_none() {
            return;
        }
        let out_edges = self.out_edges(node_id);
        debug_assert_eq!(
            out_edges.len(),
            1,
            "a removable instruction node must have exactly one out-edge"
        );
        let successor = match out_edges.first() {
            Some((target, _)) => *target,
            None => return,
        };

        let in_edges = self.in_edges(node_id);
        for (source, kind) in in_edges {
            self.remove_edge(source, node_id);
            self.add_edge(source, successor, kind);
        }
        self.remove_edge(node_id, successor);

        let domain_id = self.node(node_id).unwrap().domain;
        let domain = self.domains.get_mut(&domain_id).unwrap();
        if domain.entry_point == Some(node_id) {
            domain.entry_point = Some(successor);
        }
        domain.nodes.retain(|&n| n != node_id);

        self.graph.remove_node(node_id.into());
    }

    fn splice_degenerate_phis(&mut self) {
        loop {
            let degenerate: Vec<NodeId> = self
                .nodes()
                .into_iter()
                .filter(|(_, n)| n.phi().is_some_and(|phi| phi.incoming.len() == 1))
                .map(|(id, _)| id)
                .collect();

            if degenerate.is_empty() {
                break;
            }

            for phi_id in degenerate {
                self.splice_phi(phi_id);
            }
        }
    }

    fn splice_phi(&mut self, phi_id: NodeId) {
        let (source, phi_index, consumers) = {
            let node = match self.node(phi_id) {
                Some(n) => n,
                None => return,
            };
            let phi = match node.phi() {
                Some(p) => p,
                None => return,
            };
            if phi.incoming.len() != 1 {
                return;
            }
            (phi.incoming[0].1, phi.phi_index, node.consumers().clone())
        };

        for consumer in &consumers {
            if let Some(node) = self.node_mut(*consumer).and_then(|n| n.instruction_mut()) {
                node.set_argument(phi_index, source);
            }
        }

        if let Some(producer) = self.node_mut(source) {
            producer.consumers_mut().remove(&phi_id);
            for consumer in &consumers {
                producer.consumers_mut().insert(*consumer);
            }
        }

        let out_edges = self.out_edges(phi_id);
        let in_edges = self.in_edges(phi_id);
        for (target, kind) in &out_edges {
            self.remove_edge(phi_id, *target);
            self.add_edge(source, *target, *kind);
        }
        for (from, _) in &in_edges {
            self.remove_edge(*from, phi_id);
        }

        let domain_id = self.node(phi_id).unwrap().domain;
        let domain = self.domains.get_mut(&domain_id).unwrap();
        domain.nodes.retain(|&n| n != phi_id);
        self.graph.remove_node(phi_id.into());
    }

    /// Reachability from every domain's entry point via out-edges must
    /// cover the full node set (`H_NoOrphans`, used by the oracle crate).
    pub fn reachable_from_entry_points(&self) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<NodeId> = self
            .domains
            .values()
            .filter_map(|d| d.entry_point)
            .collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            for (target, _) in self.out_edges(id) {
                if !seen.contains(&target) {
                    stack.push(target);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Opcode as Op;
    use crate::raw::RawMethod;

    fn method_self_return() -> ParsedMethod {
        let mut raw = RawMethod::new(0, 0);
        raw.push(Op::DoSpecial, Special::SelfReturn as u32, 0);
        ParsedMethod::parse(raw)
    }

    #[test]
    fn scenario_s1_method_self_return() {
        let method = method_self_return();
        let graph = ControlGraph::build_graph(&method, method.outer_block_id()).unwrap();

        assert_eq!(graph.domains_in_order().count(), 1);
        assert_eq!(graph.nodes().len(), 1);

        let (_, domain) = graph.domains_in_order().next().unwrap();
        let terminator = domain.terminator.unwrap();
        assert_eq!(Some(terminator), domain.entry_point);
        assert!(graph.node(terminator).unwrap().is_terminator());
    }

    #[test]
    fn scenario_unconditional_branch_links_terminator_to_entry() {
        // 0: branch -> 1 ; 1: selfReturn
        let mut raw = RawMethod::new(0, 0);
        raw.push(Op::DoSpecial, Special::Branch as u32, 1);
        raw.push(Op::DoSpecial, Special::SelfReturn as u32, 0);
        let method = ParsedMethod::parse(raw);

        let graph = ControlGraph::build_graph(&method, method.outer_block_id()).unwrap();
        assert_eq!(graph.domains_in_order().count(), 2);

        let entry_domain = graph.domain(DomainId(0)).unwrap();
        let branch_node = entry_domain.terminator.unwrap();
        let target_domain = graph.domain(DomainId(1)).unwrap();
        let target_entry = target_domain.entry_point.unwrap();

        assert!(graph
            .out_edges(branch_node)
            .iter()
            .any(|(target, kind)| *target == target_entry && *kind == ControlEdgeKind::Branch));
    }

    #[test]
    fn unresolved_branch_target_is_a_build_error() {
        let mut raw = RawMethod::new(0, 0);
        raw.push(Op::DoSpecial, Special::Branch as u32, 99);
        let method = ParsedMethod::parse(raw);

        let result = ControlGraph::build_graph(&method, method.outer_block_id());
        assert!(matches!(result, Err(BuildError::UnresolvedBranchTarget { offset: 99 })));
    }

    #[test]
    fn diamond_join_inserts_phi_with_two_incomings() {
        // 0: pushConstant true ; 1: branchIfFalse -> 4
        // 2: pushLiteral 0 (then arm) ; 3: branch -> 6
        // 4: pushLiteral 1 (else arm) ; 5: branch -> 6 (explicit, well-formed
        //    bytecode never leaves a fallthrough across a jump-target boundary)
        // 6: doSpecial stackReturn (join: consumes the arm's value)
        let mut raw = RawMethod::new(0, 0);
        raw.push(Op::PushConstant, 11, 0); // 0: true
        raw.push(Op::DoSpecial, Special::BranchIfFalse as u32, 4); // 1
        raw.push(Op::PushLiteral, 0, 0); // 2: then-arm value
        raw.push(Op::DoSpecial, Special::Branch as u32, 6); // 3
        raw.push(Op::PushLiteral, 1, 0); // 4: else-arm value
        raw.push(Op::DoSpecial, Special::Branch as u32, 6); // 5
        raw.push(Op::DoSpecial, Special::StackReturn as u32, 0); // 6: join
        let method = ParsedMethod::parse(raw);

        let graph = ControlGraph::build_graph(&method, method.outer_block_id()).unwrap();

        let join_domain = graph.domain(DomainId(6)).unwrap();
        let join_node = join_domain.entry_point.unwrap();
        let arg = graph
            .node(join_node)
            .unwrap()
            .instruction()
            .unwrap()
            .arguments
            .first()
            .copied()
            .flatten()
            .unwrap();

        let phi = graph.node(arg).unwrap().phi().unwrap();
        assert_eq!(phi.incoming.len(), 2);
    }

    #[test]
    fn phase3_removes_dead_trivial_push() {
        // pushLiteral 0 (never consumed) ; selfReturn
        let mut raw = RawMethod::new(0, 0);
        raw.push(Op::PushLiteral, 0, 0);
        raw.push(Op::DoSpecial, Special::SelfReturn as u32, 0);
        let method = ParsedMethod::parse(raw);

        let graph = ControlGraph::build_graph(&method, method.outer_block_id()).unwrap();
        assert_eq!(graph.nodes().len(), 1);
    }

    #[test]
    fn phase3_can_be_disabled() {
        let mut raw = RawMethod::new(0, 0);
        raw.push(Op::PushLiteral, 0, 0);
        raw.push(Op::DoSpecial, Special::SelfReturn as u32, 0);
        let method = ParsedMethod::parse(raw);

        let graph = ControlGraph::build_graph_with(
            &method,
            method.outer_block_id(),
            BuilderConfig { optimize: false },
        )
        .unwrap();
        assert_eq!(graph.nodes().len(), 2);
    }

    #[test]
    fn no_orphans_after_build() {
        let method = method_self_return();
        let graph = ControlGraph::build_graph(&method, method.outer_block_id()).unwrap();
        let all: BTreeSet<NodeId> = graph.nodes().into_iter().map(|(id, _)| id).collect();
        assert_eq!(graph.reachable_from_entry_points(), all);
    }

    #[test]
    fn scenario_s5_pushblock_graph_is_built_independently() {
        // outer: pushBlock extra=3 ; selfReturn -- inner body occupies [1, 3)
        let mut raw = RawMethod::new(0, 0);
        raw.push(Op::PushBlock, 0, 3);
        raw.push(Op::PushArgument, 0, 0);
        raw.push(Op::DoSpecial, Special::BlockReturn as u32, 0);
        raw.push(Op::DoSpecial, Special::SelfReturn as u32, 0);
        let method = ParsedMethod::parse(raw);

        let outer_graph = ControlGraph::build_graph(&method, method.outer_block_id()).unwrap();
        // The outer graph only has the pushBlock + selfReturn nodes: building it
        // never pulls the inner block's instructions into the same graph.
        assert_eq!(outer_graph.nodes().len(), 2);

        let push_block_id = outer_graph
            .nodes()
            .into_iter()
            .find(|(_, n)| n.instruction().is_some_and(|i| i.instruction.opcode == Op::PushBlock))
            .unwrap()
            .0;
        let inner_block_id = outer_graph
            .node(push_block_id)
            .unwrap()
            .instruction()
            .unwrap()
            .attached_block
            .expect("pushBlock node has its child block attached");

        // The inner block builds its own, separate graph with its own domains.
        let inner_graph = ControlGraph::build_graph(&method, inner_block_id).unwrap();
        assert_eq!(inner_graph.nodes().len(), 2);
        assert_eq!(inner_graph.domains_in_order().count(), 1);
    }
}
