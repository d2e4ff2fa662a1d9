//! Structural oracles (§4.G): dedicated passes checking invariants 1-8
//! (§3), exposed as a public API rather than only asserted inside
//! `#[test]` functions, so a downstream tool built on this crate can run
//! the same checks against a graph it built itself.
//!
//! Each check is ported from one of the original test helper's visitor
//! classes (`H_LastInstIsTerminator`, `H_DomainHasTerminator`,
//! `H_AreBBsLinked`, `H_CorrectNumOfEdges`, `H_NoOrphans`,
//! `H_ConsumeProvider`, `H_BranchJumpsOnCorrectNode`,
//! `H_NonUniqueIncomingsOfPhi`), using the [`crate` mod's] visitor walks in
//! place of that inheritance hierarchy.

use stgraph_core::{
    walk_domains, walk_plain, ControlEdgeKind, ControlGraph, DomainId, DomainVisitor, NodeId,
    PlainNodeVisitor,
};

/// One failed invariant, carrying enough identity to locate it in the
/// graph. `check` names the oracle function that produced it, matching the
/// original `SCOPED_TRACE` labels closely enough to cross-reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleViolation {
    pub check: &'static str,
    pub domain: Option<DomainId>,
    pub node: Option<NodeId>,
    pub message: String,
}

impl OracleViolation {
    fn domain(check: &'static str, domain: DomainId, message: impl Into<String>) -> Self {
        OracleViolation {
            check,
            domain: Some(domain),
            node: None,
            message: message.into(),
        }
    }

    fn node(check: &'static str, node: NodeId, message: impl Into<String>) -> Self {
        OracleViolation {
            check,
            domain: None,
            node: Some(node),
            message: message.into(),
        }
    }
}

/// `H_LastInstIsTerminator` + `H_DomainHasTerminator`: every basic block is
/// non-empty, ends in exactly one terminator, and the domain's own
/// `terminator` field agrees with it (invariants 1-2).
pub fn check_terminators(graph: &ControlGraph) -> Vec<OracleViolation> {
    struct Check<'g> {
        graph: &'g ControlGraph,
        violations: Vec<OracleViolation>,
    }

    impl DomainVisitor for Check<'_> {
        fn visit_domain(&mut self, _graph: &ControlGraph, domain_id: DomainId) -> bool {
            let domain = self.graph.domain(domain_id).expect("domain id from walk");
            let block = &domain.basic_block;

            if block.instructions.is_empty() {
                self.violations.push(OracleViolation::domain(
                    "check_terminators",
                    domain_id,
                    "basic block has no instructions",
                ));
                return true;
            }

            let last = block.instructions.len() - 1;
            for (i, instr) in block.instructions.iter().enumerate() {
                let should_be_terminator = i == last;
                if instr.is_terminator() != should_be_terminator {
                    self.violations.push(OracleViolation::domain(
                        "check_terminators",
                        domain_id,
                        format!(
                            "instruction at offset {} {} a terminator but is {} in the block",
                            instr.offset,
                            if instr.is_terminator() { "is" } else { "is not" },
                            if should_be_terminator { "last" } else { "not last" }
                        ),
                    ));
                }
            }

            match domain.terminator {
                Some(id) if self.graph.node(id).is_some_and(|n| n.is_terminator()) => {}
                Some(id) => self.violations.push(OracleViolation::node(
                    "check_terminators",
                    id,
                    "domain's recorded terminator is not itself a terminator instruction",
                )),
                None => self.violations.push(OracleViolation::domain(
                    "check_terminators",
                    domain_id,
                    "domain has no terminator",
                )),
            }
            true
        }
    }

    let mut check = Check { graph, violations: Vec::new() };
    walk_domains(graph, &mut check);
    check.violations
}

/// `H_AreBBsLinked`: every non-entry block has a referer, and every branch
/// terminator's out-edges match its opcode's target-count/target-offset
/// contract (invariants 2, 6).
pub fn check_branches_linked(graph: &ControlGraph) -> Vec<OracleViolation> {
    struct Check<'g> {
        graph: &'g ControlGraph,
        violations: Vec<OracleViolation>,
    }

    impl DomainVisitor for Check<'_> {
        fn visit_domain(&mut self, graph: &ControlGraph, domain_id: DomainId) -> bool {
            let domain = self.graph.domain(domain_id).expect("domain id from walk");

            if domain.offset() != 0 && domain.basic_block.referers.is_empty() {
                self.violations.push(OracleViolation::domain(
                    "check_branches_linked",
                    domain_id,
                    "non-entry block has no referers",
                ));
            }

            let Some(terminator_id) = domain.terminator else { return true };
            let Some(terminator) = graph.node(terminator_id).and_then(|n| n.instruction()) else {
                return true;
            };
            if !terminator.instruction.is_branch() {
                return true;
            }

            let out_edges: Vec<NodeId> = graph
                .out_edges(terminator_id)
                .into_iter()
                .filter(|(_, kind)| *kind == ControlEdgeKind::Branch)
                .map(|(target, _)| target)
                .collect();

            if terminator.instruction.is_conditional_branch() {
                if out_edges.len() != 2 {
                    self.violations.push(OracleViolation::node(
                        "check_branches_linked",
                        terminator_id,
                        format!("conditional branch has {} branch out-edges, expected 2", out_edges.len()),
                    ));
                    return true;
                }
                let target_offsets: Vec<u32> = out_edges
                    .iter()
                    .map(|id| graph.node(*id).expect("out-edge target exists").domain.0)
                    .collect();
                let matches = target_offsets.iter().filter(|o| **o == terminator.instruction.extra).count();
                if matches != 1 {
                    self.violations.push(OracleViolation::node(
                        "check_branches_linked",
                        terminator_id,
                        "conditional branch's extra must match exactly one out-edge target offset",
                    ));
                }
            } else {
                if out_edges.len() != 1 {
                    self.violations.push(OracleViolation::node(
                        "check_branches_linked",
                        terminator_id,
                        format!("unconditional branch has {} branch out-edges, expected 1", out_edges.len()),
                    ));
                    return true;
                }
                let target_offset = graph.node(out_edges[0]).expect("out-edge target exists").domain.0;
                if target_offset != terminator.instruction.extra {
                    self.violations.push(OracleViolation::node(
                        "check_branches_linked",
                        terminator_id,
                        "unconditional branch's out-edge target offset does not match its extra",
                    ));
                }
            }
            true
        }
    }

    let mut check = Check { graph, violations: Vec::new() };
    walk_domains(graph, &mut check);
    check.violations
}

/// `H_CorrectNumOfEdges`: every instruction node's argument count matches
/// its opcode's expected arity, every non-`pushBlock` value-provider has at
/// least one consumer, and every phi has >=1 incoming and >=1 out-edge
/// (invariants 3-5).
pub fn check_argument_counts(graph: &ControlGraph) -> Vec<OracleViolation> {
    struct Check {
        violations: Vec<OracleViolation>,
    }

    impl PlainNodeVisitor for Check {
        fn visit_node(&mut self, graph: &ControlGraph, node_id: NodeId, node: &stgraph_core::ControlNode) {
            if let Some(inst) = node.instruction() {
                let expected = inst.instruction.expected_argument_count();
                let actual = inst.arguments.iter().filter(|a| a.is_some()).count();
                if !expected.satisfied_by(actual) {
                    self.violations.push(OracleViolation::node(
                        "check_argument_counts",
                        node_id,
                        format!(
                            "{} has {} resolved arguments, expected {:?}",
                            inst.instruction.to_diagnostic_string(),
                            actual,
                            expected
                        ),
                    ));
                }
                let is_push_block = inst.instruction.opcode == stgraph_core::Opcode::PushBlock;
                if inst.instruction.is_value_provider() && !is_push_block && inst.consumers.is_empty() {
                    self.violations.push(OracleViolation::node(
                        "check_argument_counts",
                        node_id,
                        "value-provider instruction has no consumers",
                    ));
                }
            }
            if let Some(phi) = node.phi() {
                if phi.incoming.is_empty() {
                    self.violations.push(OracleViolation::node(
                        "check_argument_counts",
                        node_id,
                        "phi has no incoming values",
                    ));
                }
                if graph.out_edges(node_id).is_empty() && phi.consumer.is_none() && phi.consumers.is_empty() {
                    self.violations.push(OracleViolation::node(
                        "check_argument_counts",
                        node_id,
                        "phi has no consumer and no out-edge",
                    ));
                }
            }
            if node.is_tau() {
                self.violations.push(OracleViolation::node(
                    "check_argument_counts",
                    node_id,
                    "tau node exists but tau is reserved and never produced",
                ));
            }
        }
    }

    let mut check = Check { violations: Vec::new() };
    walk_plain(graph, &mut check);
    check.violations
}

/// `H_NoOrphans`: every node must be reachable from some domain's entry
/// point via out-edges (invariant 9).
pub fn check_no_orphans(graph: &ControlGraph) -> Vec<OracleViolation> {
    let reachable = graph.reachable_from_entry_points();
    graph
        .nodes()
        .into_iter()
        .filter(|(id, _)| !reachable.contains(id))
        .map(|(id, _)| OracleViolation::node("check_no_orphans", id, "node is unreachable from every domain entry point"))
        .collect()
}

/// `H_ConsumeProvider`: every value-consumer's positional arguments must
/// reference value-provider nodes, and a phi's graph in-edges are never
/// direct instruction nodes (invariants 7, 10).
pub fn check_consume_provider(graph: &ControlGraph) -> Vec<OracleViolation> {
    struct Check {
        violations: Vec<OracleViolation>,
    }

    impl PlainNodeVisitor for Check {
        fn visit_node(&mut self, graph: &ControlGraph, node_id: NodeId, node: &stgraph_core::ControlNode) {
            if let Some(inst) = node.instruction() {
                if inst.instruction.is_value_consumer() {
                    for arg in inst.arguments.iter().flatten() {
                        if let Some(provider) = graph.node(*arg) {
                            if !provider.is_value_provider() {
                                self.violations.push(OracleViolation::node(
                                    "check_consume_provider",
                                    node_id,
                                    format!("argument node {arg} does not provide a value"),
                                ));
                            }
                        }
                    }
                }
            }
            if node.is_phi() {
                for (source, _) in graph.in_edges(node_id) {
                    if graph.node(source).is_some_and(|n| n.instruction().is_some()) {
                        self.violations.push(OracleViolation::node(
                            "check_consume_provider",
                            node_id,
                            "phi has a direct instruction in-edge",
                        ));
                    }
                }
            }
        }
    }

    let mut check = Check { violations: Vec::new() };
    walk_plain(graph, &mut check);
    check.violations
}

/// `H_BranchJumpsOnCorrectNode`: unconditional branches never jump directly
/// to a terminator, and conditional branches never jump directly to
/// another branch. Ported as a standalone function but **excluded from
/// [`check_all`]**, matching the original's own commented-out invocation in
/// `H_CheckCFGCorrect` — the original author evidently chose not to run
/// this check, and the port does not silently reinstate it.
pub fn check_branch_jumps_on_correct_node(graph: &ControlGraph) -> Vec<OracleViolation> {
    struct Check {
        violations: Vec<OracleViolation>,
    }

    impl PlainNodeVisitor for Check {
        fn visit_node(&mut self, graph: &ControlGraph, node_id: NodeId, node: &stgraph_core::ControlNode) {
            let Some(inst) = node.instruction() else { return };
            if !inst.instruction.is_branch() {
                return;
            }
            for (target, _) in graph.out_edges(node_id) {
                let Some(out_inst) = graph.node(target).and_then(|n| n.instruction()) else { continue };
                if inst.instruction.is_conditional_branch() {
                    if out_inst.instruction.is_branch() {
                        self.violations.push(OracleViolation::node(
                            "check_branch_jumps_on_correct_node",
                            node_id,
                            "conditional branch jumps directly to another branch",
                        ));
                    }
                } else if out_inst.instruction.is_terminator() {
                    self.violations.push(OracleViolation::node(
                        "check_branch_jumps_on_correct_node",
                        node_id,
                        "unconditional branch jumps directly to a terminator",
                    ));
                }
            }
        }
    }

    let mut check = Check { violations: Vec::new() };
    walk_plain(graph, &mut check);
    check.violations
}

/// `H_NonUniqueIncomingsOfPhi`: no phi has two incomings from the same
/// source node (invariant 8).
pub fn check_unique_phi_incomings(graph: &ControlGraph) -> Vec<OracleViolation> {
    struct Check {
        violations: Vec<OracleViolation>,
    }

    impl PlainNodeVisitor for Check {
        fn visit_node(&mut self, _graph: &ControlGraph, node_id: NodeId, node: &stgraph_core::ControlNode) {
            let Some(phi) = node.phi() else { return };
            let mut seen = std::collections::BTreeSet::new();
            for (_, value) in &phi.incoming {
                if !seen.insert(*value) {
                    self.violations.push(OracleViolation::node(
                        "check_unique_phi_incomings",
                        node_id,
                        format!("phi has two incomings from node {value}"),
                    ));
                }
            }
        }
    }

    let mut check = Check { violations: Vec::new() };
    walk_plain(graph, &mut check);
    check.violations
}

/// The default oracle bundle, matching `H_CheckCFGCorrect`: every check
/// except [`check_branch_jumps_on_correct_node`], which the original leaves
/// commented out of its own top-level runner.
pub fn check_all(graph: &ControlGraph) -> Vec<OracleViolation> {
    let mut violations = Vec::new();
    violations.extend(check_terminators(graph));
    violations.extend(check_branches_linked(graph));
    violations.extend(check_argument_counts(graph));
    violations.extend(check_no_orphans(graph));
    violations.extend(check_consume_provider(graph));
    violations.extend(check_unique_phi_incomings(graph));
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use stgraph_core::raw::RawMethod;
    use stgraph_core::{Opcode, ParsedMethod, Special};

    #[test]
    fn well_formed_graph_has_no_violations() {
        let mut raw = RawMethod::new(0, 0);
        raw.push(Opcode::PushConstant, 11, 0);
        raw.push(Opcode::DoSpecial, Special::BranchIfFalse as u32, 4);
        raw.push(Opcode::PushLiteral, 0, 0);
        raw.push(Opcode::DoSpecial, Special::Branch as u32, 6);
        raw.push(Opcode::PushLiteral, 1, 0);
        raw.push(Opcode::DoSpecial, Special::Branch as u32, 6);
        raw.push(Opcode::DoSpecial, Special::StackReturn as u32, 0);
        let method = ParsedMethod::parse(raw);
        let graph = ControlGraph::build_graph(&method, method.outer_block_id()).unwrap();

        assert_eq!(check_all(&graph), Vec::new());
    }

    #[test]
    fn no_orphans_on_trivial_method() {
        let mut raw = RawMethod::new(0, 0);
        raw.push(Opcode::DoSpecial, Special::SelfReturn as u32, 0);
        let method = ParsedMethod::parse(raw);
        let graph = ControlGraph::build_graph(&method, method.outer_block_id()).unwrap();

        assert!(check_no_orphans(&graph).is_empty());
    }

    /// Builds a straight-line method from a sequence of step flags: `true`
    /// pushes a small-integer constant, `false` folds the top two stack
    /// values with `sendBinary +` when at least two are available (a no-op
    /// otherwise). Before returning, folds whatever remains down to a single
    /// value so every pushed/computed value is consumed by something —
    /// real compiler output never leaves an intermediate send result
    /// sitting dead below the final returned value, and the builder only
    /// garbage-collects *trivial* (push-only) dead values, not send results.
    fn build_straight_line(steps: &[bool]) -> RawMethod {
        let mut raw = RawMethod::new(0, 0);
        let mut depth: u32 = 0;
        for &push in steps {
            if push {
                raw.push(Opcode::PushConstant, 1, 0);
                depth += 1;
            } else if depth >= 2 {
                raw.push(Opcode::SendBinary, stgraph_core::BinaryOperator::Plus as u32, 0);
                depth -= 1;
            }
        }
        while depth >= 2 {
            raw.push(Opcode::SendBinary, stgraph_core::BinaryOperator::Plus as u32, 0);
            depth -= 1;
        }
        if depth >= 1 {
            raw.push(Opcode::DoSpecial, Special::StackReturn as u32, 0);
        } else {
            raw.push(Opcode::DoSpecial, Special::SelfReturn as u32, 0);
        }
        raw
    }

    proptest::proptest! {
        #[test]
        fn check_all_holds_on_random_straight_line_methods(steps in proptest::collection::vec(proptest::bool::ANY, 0..24)) {
            let raw = build_straight_line(&steps);
            let method = ParsedMethod::parse(raw);
            let graph = ControlGraph::build_graph(&method, method.outer_block_id()).unwrap();
            proptest::prop_assert_eq!(check_all(&graph), Vec::new());
        }
    }
}
