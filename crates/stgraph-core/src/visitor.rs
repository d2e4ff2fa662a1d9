//! Visitor framework (component E): ordered traversal skeletons over
//! basic blocks, domains, and nodes, plus an unordered global walk for
//! optimizer/oracle sweeps.
//!
//! The original taxonomy (`BlockVisitor`/`DomainVisitor`/`NodeVisitor`/
//! `PlainNodeVisitor`) is a small inheritance hierarchy; this port keeps
//! the same four traversal shapes as traits with a driving free function
//! each, matching the teacher's preference for trait objects over a class
//! hierarchy.

use crate::domain::ControlDomain;
use crate::graph::ControlGraph;
use crate::id::{DomainId, NodeId};
use crate::node::ControlNode;

/// Visits basic blocks in strictly increasing offset order.
pub trait BlockVisitor {
    fn visit_block(&mut self, domain_id: DomainId, domain: &ControlDomain);

    /// Post-hook for visitors that must defer mutation until the full
    /// traversal has completed.
    fn blocks_visited(&mut self) {}
}

pub fn walk_blocks(graph: &ControlGraph, visitor: &mut impl BlockVisitor) {
    for (id, domain) in graph.domains_in_order() {
        visitor.visit_block(id, domain);
    }
    visitor.blocks_visited();
}

/// Visits domains in strictly increasing offset order. Distinct from
/// `BlockVisitor` only in that it receives the domain's analysis state,
/// not just the basic block it wraps.
pub trait DomainVisitor {
    fn visit_domain(&mut self, graph: &ControlGraph, domain_id: DomainId) -> bool;

    fn domains_visited(&mut self) {}
}

pub fn walk_domains(graph: &ControlGraph, visitor: &mut impl DomainVisitor) {
    for (id, _) in graph.domains_in_order() {
        if !visitor.visit_domain(graph, id) {
            break;
        }
    }
    visitor.domains_visited();
}

/// Visits nodes per-domain, in strictly increasing node-index order, with
/// an outer per-domain loop ordered by block offset.
pub trait NodeVisitor {
    fn visit_domain(&mut self, _graph: &ControlGraph, _domain_id: DomainId) -> bool {
        true
    }

    fn visit_node(&mut self, graph: &ControlGraph, node_id: NodeId, node: &ControlNode);

    fn nodes_visited(&mut self) {}
}

pub fn walk_nodes(graph: &ControlGraph, visitor: &mut impl NodeVisitor) {
    for (domain_id, domain) in graph.domains_in_order() {
        if !visitor.visit_domain(graph, domain_id) {
            continue;
        }
        for &node_id in &domain.nodes {
            if let Some(node) = graph.node(node_id) {
                visitor.visit_node(graph, node_id, node);
            }
        }
    }
    visitor.nodes_visited();
}

/// Visits every node in the graph irrespective of owning domain, in
/// ascending node-index order — used by global sweeps (the optimizer, the
/// structural oracles) that don't care about block structure.
pub trait PlainNodeVisitor {
    fn visit_node(&mut self, graph: &ControlGraph, node_id: NodeId, node: &ControlNode);

    fn nodes_visited(&mut self) {}
}

pub fn walk_plain(graph: &ControlGraph, visitor: &mut impl PlainNodeVisitor) {
    for (node_id, node) in graph.nodes() {
        visitor.visit_node(graph, node_id, node);
    }
    visitor.nodes_visited();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Opcode, Special};
    use crate::parsed::ParsedMethod;
    use crate::raw::RawMethod;

    struct CountingBlockVisitor {
        offsets: Vec<u32>,
    }

    impl BlockVisitor for CountingBlockVisitor {
        fn visit_block(&mut self, domain_id: DomainId, _domain: &ControlDomain) {
            self.offsets.push(domain_id.0);
        }
    }

    #[test]
    fn walk_blocks_visits_in_offset_order() {
        let mut raw = RawMethod::new(0, 0);
        raw.push(Opcode::DoSpecial, Special::Branch as u32, 1);
        raw.push(Opcode::DoSpecial, Special::SelfReturn as u32, 0);
        let method = ParsedMethod::parse(raw);
        let graph = ControlGraph::build_graph(&method, method.outer_block_id()).unwrap();

        let mut visitor = CountingBlockVisitor { offsets: Vec::new() };
        walk_blocks(&graph, &mut visitor);
        assert_eq!(visitor.offsets, vec![0, 1]);
    }

    struct CountingPlainVisitor {
        count: usize,
    }

    impl PlainNodeVisitor for CountingPlainVisitor {
        fn visit_node(&mut self, _graph: &ControlGraph, _node_id: NodeId, _node: &ControlNode) {
            self.count += 1;
        }
    }

    #[test]
    fn walk_plain_visits_every_node() {
        let mut raw = RawMethod::new(0, 0);
        raw.push(Opcode::DoSpecial, Special::SelfReturn as u32, 0);
        let method = ParsedMethod::parse(raw);
        let graph = ControlGraph::build_graph(&method, method.outer_block_id()).unwrap();

        let mut visitor = CountingPlainVisitor { count: 0 };
        walk_plain(&graph, &mut visitor);
        assert_eq!(visitor.count, graph.nodes().len());
    }
}
