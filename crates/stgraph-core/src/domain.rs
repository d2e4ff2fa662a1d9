//! `ControlDomain` (component C): the per-basic-block analysis scope used
//! during graph construction and linking.

use crate::basic_block::BasicBlock;
use crate::id::NodeId;

/// A pending consumer argument that could not be satisfied from the local
/// stack at request time (`TArgumentRequest` in the original builder). The
/// linker resolves these by walking the domain's referers.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentRequest {
    /// The positional argument slot on `requesting_node` this request
    /// fills (the `i` in "request arg #i").
    pub slot: u32,
    /// Index from the top of the referer's stack, adjusted for however
    /// much of this domain's own local stack was already consulted before
    /// the request fell through — the `k` the linker's predecessor walk
    /// uses.
    pub relative_index: u32,
    pub requesting_node: NodeId,
    /// `duplicate` and `assign*` leave the requested value on the stack
    /// instead of consuming it.
    pub non_consuming: bool,
}

/// One per basic block. Owns the block's nodes in allocation order, the
/// abstract operand stack accumulated during Phase 1, and any argument
/// requests still pending resolution by Phase 2.
#[derive(Debug, Clone)]
pub struct ControlDomain {
    pub basic_block: BasicBlock,
    pub nodes: Vec<NodeId>,
    pub entry_point: Option<NodeId>,
    pub terminator: Option<NodeId>,
    pub local_stack: Vec<NodeId>,
    pub requested_arguments: Vec<ArgumentRequest>,
}

impl ControlDomain {
    pub fn new(basic_block: BasicBlock) -> Self {
        ControlDomain {
            basic_block,
            nodes: Vec::new(),
            entry_point: None,
            terminator: None,
            local_stack: Vec::new(),
            requested_arguments: Vec::new(),
        }
    }

    pub fn offset(&self) -> u32 {
        self.basic_block.offset
    }

    /// Appends `node` to the domain, setting `entry_point` if this is the
    /// first node added (§4.D: "the first instruction added sets
    /// entryPoint").
    pub fn push_node(&mut self, node: NodeId) {
        if self.entry_point.is_none() {
            self.entry_point = Some(node);
        }
        self.nodes.push(node);
    }

    /// Sets the domain's terminator. Asserts it was previously unset
    /// (§4.D: "Setting terminator asserts it was previously unset").
    pub fn set_terminator(&mut self, node: NodeId) {
        debug_assert!(
            self.terminator.is_none(),
            "domain terminator set twice (builder precondition violated)"
        );
        self.terminator = Some(node);
    }

    /// Pushes a value onto the abstract operand stack.
    pub fn stack_push(&mut self, node: NodeId) {
        self.local_stack.push(node);
    }

    /// Attempts to satisfy a request for the stack value `index` slots from
    /// the top without consuming it; returns `None` if the local stack is
    /// too shallow (the value lives in a predecessor).
    pub fn stack_peek(&self, index: u32) -> Option<NodeId> {
        let len = self.local_stack.len();
        if (len as u32) > index {
            Some(self.local_stack[len - 1 - index as usize])
        } else {
            None
        }
    }

    /// Removes the stack value `index` slots from the top, for a consuming
    /// request. Panics if the index is out of range; callers must check
    /// `stack_peek` first.
    pub fn stack_consume(&mut self, index: u32) -> NodeId {
        let len = self.local_stack.len();
        let pos = len - 1 - index as usize;
        self.local_stack.remove(pos)
    }

    pub fn request_argument(&mut self, request: ArgumentRequest) {
        self.requested_arguments.push(request);
    }

    /// Attempts to satisfy `slot` (arg index `slot` from the top) from this
    /// domain's own local stack; if it isn't deep enough yet, enqueues a
    /// request for the linker instead. Returns the resolved value
    /// immediately when available.
    pub fn resolve_or_request(
        &mut self,
        slot: u32,
        requesting_node: NodeId,
        non_consuming: bool,
    ) -> Option<NodeId> {
        if let Some(value) = self.stack_peek(slot) {
            if !non_consuming {
                self.stack_consume(slot);
            }
            Some(value)
        } else {
            let relative_index = slot - self.local_stack.len() as u32;
            self.request_argument(ArgumentRequest {
                slot,
                relative_index,
                requesting_node,
                non_consuming,
            });
            None
        }
    }
}
