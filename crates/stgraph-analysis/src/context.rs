//! The analyzer's output (§4.F): an injective map from node identity to
//! [`Type`], the method's own positional argument types, and the
//! [`Diagnostic`] sink that replaces the source's `fprintf(stderr, ...)`
//! calls (§1.1).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stgraph_core::NodeId;

use crate::types::Type;

/// A non-fatal analyzer warning: an unrecognized push-constant tag, an
/// unknown binary/unary operator, anything the source reports via
/// `fprintf(stderr, ...)` and keeps going. Carries enough context (node,
/// instruction offset, message) for a caller to render or ignore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub node: NodeId,
    pub offset: u32,
    pub message: String,
}

/// Per-analyzer-run output. Never shared between runs (§5): `TypeAnalyzer::run`
/// takes `&ControlGraph` and returns an owned `TypeContext`.
#[derive(Debug, Clone, Default)]
pub struct TypeContext {
    types: HashMap<NodeId, Type>,
    argument_types: Vec<Type>,
    diagnostics: Vec<Diagnostic>,
}

impl TypeContext {
    pub fn new(argument_types: Vec<Type>) -> Self {
        TypeContext {
            types: HashMap::new(),
            argument_types,
            diagnostics: Vec::new(),
        }
    }

    /// Binds `node`'s type. Asserts the map stays injective: a well-behaved
    /// analyzer visits each node exactly once.
    pub fn set(&mut self, node: NodeId, ty: Type) {
        let previous = self.types.insert(node, ty);
        debug_assert!(
            previous.is_none(),
            "TypeContext is injective: node {node} was typed twice"
        );
    }

    pub fn get(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }

    /// The method's `index`-th positional argument type. Out-of-range reads
    /// (a malformed `pushArgument` whose index exceeds the method's declared
    /// argument count) resolve to `Undefined` rather than panicking; the
    /// builder's own precondition checking is the place that should have
    /// caught a truly malformed method.
    pub fn argument(&self, index: u32) -> &Type {
        self.argument_types
            .get(index as usize)
            .unwrap_or(&Type::Undefined)
    }

    pub fn push_diagnostic(&mut self, node: NodeId, offset: u32, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            node,
            offset,
            message: message.into(),
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjectValue, Type};

    #[test]
    fn argument_out_of_range_is_undefined() {
        let ctx = TypeContext::new(vec![Type::Literal(ObjectValue::SmallInteger(1))]);
        assert_eq!(ctx.argument(0), &Type::Literal(ObjectValue::SmallInteger(1)));
        assert_eq!(ctx.argument(5), &Type::Undefined);
    }

    #[test]
    fn set_then_get_roundtrips() {
        let mut ctx = TypeContext::new(vec![]);
        ctx.set(NodeId(0), Type::Polytype);
        assert_eq!(ctx.get(NodeId(0)), Some(&Type::Polytype));
        assert_eq!(ctx.get(NodeId(1)), None);
    }

    #[test]
    #[should_panic(expected = "injective")]
    fn setting_same_node_twice_panics_in_debug() {
        let mut ctx = TypeContext::new(vec![]);
        ctx.set(NodeId(0), Type::Undefined);
        ctx.set(NodeId(0), Type::Polytype);
    }

    #[test]
    fn diagnostics_accumulate_in_order() {
        let mut ctx = TypeContext::new(vec![]);
        ctx.push_diagnostic(NodeId(0), 3, "unknown push constant 42");
        ctx.push_diagnostic(NodeId(1), 4, "unknown binary operator 9");
        assert_eq!(ctx.diagnostics().len(), 2);
        assert_eq!(ctx.diagnostics()[0].message, "unknown push constant 42");
    }
}
