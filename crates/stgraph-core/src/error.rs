//! Core error type for the control-graph builder.
//!
//! Per the error handling design, the builder's own preconditions (a
//! well-formed method: every block ends in exactly one terminator, every
//! referenced offset resolves) are asserted, not recovered — they are
//! programmer errors in the builder itself. The one exception is a
//! `pushBlock`/branch target offset that fails to resolve against the
//! `ParsedMethod`'s offset index: that can originate from a malformed method
//! handed in by the (out-of-scope) external loader, so it surfaces as a
//! `BuildError` instead of a panic.

use thiserror::Error;

use crate::id::DomainId;

/// Errors produced by [`ControlGraph::build_graph`](crate::graph::ControlGraph::build_graph)
/// that originate from malformed input rather than a builder bug.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A `pushBlock extra=end_offset` instruction's `extra` does not name a
    /// known child block of the enclosing `ParsedMethod`.
    #[error("pushBlock target offset {offset} does not resolve to a known block")]
    UnresolvedBlockOffset { offset: u32 },

    /// A branch instruction's target offset does not name a known basic
    /// block within the method.
    #[error("branch target offset {offset} does not resolve to a known basic block")]
    UnresolvedBranchTarget { offset: u32 },

    /// A domain was asked to link against a referer domain that no longer
    /// exists in the graph (dangling referer set — loader inconsistency).
    #[error("domain {domain} references a referer basic block that is not present in the graph")]
    DanglingReferer { domain: DomainId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_block_offset_message() {
        let err = BuildError::UnresolvedBlockOffset { offset: 40 };
        assert_eq!(
            err.to_string(),
            "pushBlock target offset 40 does not resolve to a known block"
        );
    }

    #[test]
    fn dangling_referer_message() {
        let err = BuildError::DanglingReferer {
            domain: DomainId(3),
        };
        assert!(err.to_string().contains("domain 3"));
    }
}
