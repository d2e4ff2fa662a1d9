//! The type analyzer (component F): abstract interpretation over a built
//! [`ControlGraph`], populating a [`TypeContext`] entry per node.
//!
//! Dispatch mirrors the source `TypeAnalyzer::processInstruction`'s switch
//! over opcodes, plus the `processPhi`/`processTau` node-kind handlers —
//! ported here as match arms over [`stgraph_core::NodeKind`] driven by
//! [`walk_plain`], since the source itself is a `PlainNodeVisitor`.

use stgraph_core::instruction::push_constants;
use stgraph_core::{
    walk_plain, BinaryOperator, ControlGraph, ControlNode, NodeId, Opcode, PlainNodeVisitor,
    Special, UnaryOperator,
};

use crate::context::TypeContext;
use crate::globals::Globals;
use crate::types::{ObjectValue, Type};

/// The one real analyzer knob today: `walk_complete` is a post-hook for
/// future fixed-point iteration and is presently a no-op, matching the
/// source's empty `TypeAnalyzer::walkComplete`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzerConfig {
    pub run_walk_complete: bool,
}

/// Runs the analyzer over `graph`, given the method's positional argument
/// types and the runtime's well-known objects. Pure: takes `&ControlGraph`,
/// returns an owned `TypeContext` (§5) — re-entrant on an unchanged graph.
pub struct TypeAnalyzer<'a> {
    graph: &'a ControlGraph,
    globals: &'a Globals,
    config: AnalyzerConfig,
}

impl<'a> TypeAnalyzer<'a> {
    pub fn new(graph: &'a ControlGraph, globals: &'a Globals) -> Self {
        TypeAnalyzer { graph, globals, config: AnalyzerConfig::default() }
    }

    pub fn with_config(graph: &'a ControlGraph, globals: &'a Globals, config: AnalyzerConfig) -> Self {
        TypeAnalyzer { graph, globals, config }
    }

    pub fn run(&self, argument_types: Vec<Type>) -> TypeContext {
        let mut context = TypeContext::new(argument_types);

        struct Pass<'g> {
            globals: &'g Globals,
            context: TypeContext,
        }

        impl PlainNodeVisitor for Pass<'_> {
            fn visit_node(&mut self, graph: &ControlGraph, node_id: NodeId, node: &ControlNode) {
                let ty = process_node(graph, self.globals, &mut self.context, node_id, node);
                self.context.set(node_id, ty);
            }
        }

        let mut pass = Pass { globals: self.globals, context };
        walk_plain(self.graph, &mut pass);
        context = pass.context;

        if self.config.run_walk_complete {
            self.walk_complete(&mut context);
        }
        context
    }

    /// Post-hook for future fixed-point iteration; presently empty,
    /// matching the source.
    fn walk_complete(&self, _context: &mut TypeContext) {}
}

fn process_node(
    graph: &ControlGraph,
    globals: &Globals,
    context: &mut TypeContext,
    node_id: NodeId,
    node: &ControlNode,
) -> Type {
    if let Some(phi) = node.phi() {
        let subtypes: Vec<Type> = real_incoming_types(graph, context, phi);
        return Type::Composite(subtypes);
    }
    if node.is_tau() {
        return Type::Polytype;
    }

    let inst = node.instruction().expect("every node is instruction, phi, or tau");
    let instruction = inst.instruction;
    let arg = |slot: usize| -> Type {
        inst.arguments
            .get(slot)
            .copied()
            .flatten()
            .and_then(|id| context.get(id))
            .cloned()
            .unwrap_or(Type::Undefined)
    };

    match instruction.opcode {
        Opcode::PushArgument => context.argument(instruction.argument).clone(),
        Opcode::PushConstant => push_constant_type(globals, context, node_id, instruction.argument, instruction.offset),
        Opcode::PushLiteral => push_literal_type(graph, instruction.argument),
        Opcode::SendUnary => send_unary_type(globals, context, node_id, instruction.argument, instruction.offset, arg(0)),
        Opcode::SendBinary => {
            send_binary_type(globals, context, node_id, instruction.argument, instruction.offset, arg(0), arg(1))
        }
        Opcode::SendMessage => Type::Polytype,
        Opcode::MarkArguments => mark_arguments_type(globals, &inst.arguments, context),
        _ => Type::Undefined,
    }
}

fn push_constant_type(
    globals: &Globals,
    context: &mut TypeContext,
    node_id: NodeId,
    argument: u32,
    offset: u32,
) -> Type {
    match argument {
        0..=9 => Type::Literal(ObjectValue::SmallInteger(argument as i64)),
        push_constants::NIL => Type::Literal(ObjectValue::Object(globals.nil_object)),
        push_constants::TRUE_OBJECT => Type::Literal(ObjectValue::Object(globals.true_object)),
        push_constants::FALSE_OBJECT => Type::Literal(ObjectValue::Object(globals.false_object)),
        _ => {
            context.push_diagnostic(node_id, offset, format!("unknown push constant {argument}"));
            Type::Undefined
        }
    }
}

fn push_literal_type(graph: &ControlGraph, _argument: u32) -> Type {
    // The literal table lives on the owning `ParsedMethod`/`RawMethod`, not
    // on the graph; callers resolve the literal value themselves and this
    // falls back to the same conservative default the source uses when a
    // literal's shape isn't recognized. `graph` is accepted for symmetry
    // with the other `*_type` helpers and future literal-table threading.
    let _ = graph;
    Type::Polytype
}

fn send_unary_type(
    globals: &Globals,
    context: &mut TypeContext,
    node_id: NodeId,
    argument: u32,
    offset: u32,
    operand: Type,
) -> Type {
    let Some(op) = UnaryOperator::from_argument(argument) else {
        context.push_diagnostic(node_id, offset, format!("unknown unary operator {argument}"));
        return Type::Undefined;
    };

    match &operand {
        Type::Literal(_) | Type::Monotype(_) => {
            let is_nil = operand.identity_is(globals.nil_object) || operand.identity_is(globals.nil_class);
            let result = match (op, is_nil) {
                (UnaryOperator::IsNil, true) | (UnaryOperator::NotNil, false) => globals.true_object,
                _ => globals.false_object,
            };
            Type::Literal(ObjectValue::Object(result))
        }
        Type::Composite(_) | Type::Array(_) => Type::Polytype,
        _ => Type::Monotype(globals.boolean_class),
    }
}

fn send_binary_type(
    globals: &Globals,
    context: &mut TypeContext,
    node_id: NodeId,
    argument: u32,
    offset: u32,
    left: Type,
    right: Type,
) -> Type {
    let Some(op) = BinaryOperator::from_argument(argument) else {
        context.push_diagnostic(node_id, offset, format!("unknown binary operator {argument}"));
        return Type::Undefined;
    };

    if left.is_small_integer_literal() && right.is_small_integer_literal() {
        let l = left.as_small_integer().unwrap();
        let r = right.as_small_integer().unwrap();
        return match op {
            BinaryOperator::Less => literal_bool(globals, l < r),
            BinaryOperator::LessOrEqual => literal_bool(globals, l <= r),
            BinaryOperator::Plus => Type::Literal(ObjectValue::SmallInteger(l + r)),
        };
    }

    let is_int = |t: &Type| t.is_small_integer_literal() || t.identity_is(globals.small_int_class);
    if is_int(&left) && is_int(&right) {
        return match op {
            BinaryOperator::Less | BinaryOperator::LessOrEqual => Type::Monotype(globals.boolean_class),
            BinaryOperator::Plus => Type::Monotype(globals.small_int_class),
        };
    }

    Type::Polytype
}

fn literal_bool(globals: &Globals, value: bool) -> Type {
    let obj = if value { globals.true_object } else { globals.false_object };
    Type::Literal(ObjectValue::Object(obj))
}

fn mark_arguments_type(globals: &Globals, arguments: &[Option<NodeId>], context: &TypeContext) -> Type {
    let slot_types: Vec<Type> = arguments
        .iter()
        .map(|slot| slot.and_then(|id| context.get(id)).cloned().unwrap_or(Type::Undefined))
        .collect();

    let imprecise = slot_types.iter().any(|t| t.is_undefined() || t.is_polytype());
    if imprecise || slot_types.is_empty() {
        Type::Monotype(globals.array_class)
    } else {
        Type::Array(slot_types)
    }
}

/// `getRealValues`: transitively chases through phi-of-phi chains,
/// deduplicating by node identity, and returns the resolved types of the
/// non-phi contributors.
fn real_incoming_types(graph: &ControlGraph, context: &TypeContext, phi: &stgraph_core::PhiNode) -> Vec<Type> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = phi.incoming.iter().map(|(_, node)| *node).collect();

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        match graph.node(id).and_then(|n| n.phi()) {
            Some(nested) => stack.extend(nested.incoming.iter().map(|(_, n)| *n)),
            None => {
                if let Some(ty) = context.get(id) {
                    out.push(ty.clone());
                }
            }
        }
    }
    out
}
