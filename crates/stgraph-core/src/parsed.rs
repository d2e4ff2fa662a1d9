//! Parsed method/block (component B): a read-only view of a method's
//! bytecode as ordered instructions addressed by byte offset, with nested
//! blocks indexed by both their start and end offset.

use std::collections::HashMap;

use crate::id::ParsedBlockId;
use crate::instruction::{Instruction, Opcode};
use crate::raw::RawMethod;

/// A half-open instruction range `[start, stop)` within a method's
/// bytecode. Block bodies for `pushBlock` instructions are decoded
/// recursively and excluded from the parent's own instruction list (they
/// live in their own child `ParsedBlock`, attached via `child_blocks`).
#[derive(Debug, Clone)]
pub struct ParsedBlock {
    pub start_offset: u32,
    pub stop_offset: u32,
    pub instructions: Vec<Instruction>,
    /// Inner `ParsedBlock`s created for each `pushBlock` instruction found
    /// in this block's range, keyed by that instruction's `extra` (its end
    /// offset), matching `ParsedMethod::parsed_block_by_end_offset`.
    pub child_blocks: Vec<ParsedBlockId>,
}

impl ParsedBlock {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Owns the ordered arena of `ParsedBlock`s for one method, plus the two
/// offset indexes required by the builder (`getParsedBlockByEndOffset` and,
/// symmetrically, by-start lookup for basic-block formation).
#[derive(Debug, Clone)]
pub struct ParsedMethod {
    raw: RawMethod,
    blocks: Vec<ParsedBlock>,
    start_offset_index: HashMap<u32, ParsedBlockId>,
    end_offset_index: HashMap<u32, ParsedBlockId>,
    outer_block: ParsedBlockId,
}

impl ParsedMethod {
    /// Decodes the full method: the outer (top-level) block spans the
    /// entire bytecode range, and nested blocks are parsed recursively as
    /// `pushBlock` instructions are encountered.
    pub fn parse(raw: RawMethod) -> Self {
        let mut method = ParsedMethod {
            raw,
            blocks: Vec::new(),
            start_offset_index: HashMap::new(),
            end_offset_index: HashMap::new(),
            outer_block: ParsedBlockId(0),
        };
        let stop = method.raw.len();
        method.outer_block = method.parse_block(0, stop);
        method
    }

    /// `ParsedBlock(method, start, stop)`: decode instructions in `[start,
    /// stop)`, recursively creating a child `ParsedBlock` for any
    /// `pushBlock extra=endOffset` whose body lies inside this range.
    fn parse_block(&mut self, start: u32, stop: u32) -> ParsedBlockId {
        let mut instructions = Vec::new();
        let mut child_blocks = Vec::new();
        let mut offset = start;

        while offset < stop {
            let raw_instr = self
                .raw
                .bytecode
                .get(offset as usize)
                .expect("offset within [start, stop) must address a decoded bytecode byte");
            let instruction = Instruction::new(
                raw_instr.offset,
                raw_instr.opcode,
                raw_instr.argument,
                raw_instr.extra,
            );
            instructions.push(instruction);

            if raw_instr.opcode == Opcode::PushBlock {
                let body_start = offset + 1;
                let body_stop = raw_instr.extra;
                if body_stop > body_start && body_stop <= stop {
                    let child_id = self.parse_block(body_start, body_stop);
                    child_blocks.push(child_id);
                    offset = body_stop;
                    continue;
                }
            }

            offset += 1;
        }

        let id = ParsedBlockId(self.blocks.len() as u32);
        self.blocks.push(ParsedBlock {
            start_offset: start,
            stop_offset: stop,
            instructions,
            child_blocks,
        });
        self.start_offset_index.insert(start, id);
        self.end_offset_index.insert(stop, id);
        id
    }

    pub fn raw(&self) -> &RawMethod {
        &self.raw
    }

    pub fn outer_block_id(&self) -> ParsedBlockId {
        self.outer_block
    }

    pub fn outer_block(&self) -> &ParsedBlock {
        self.block(self.outer_block)
    }

    pub fn block(&self, id: ParsedBlockId) -> &ParsedBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn blocks(&self) -> impl Iterator<Item = (ParsedBlockId, &ParsedBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (ParsedBlockId(i as u32), b))
    }

    /// `getParsedBlockByEndOffset` — used by the builder to resolve a
    /// `pushBlock`'s `extra` into the child block it already decoded.
    pub fn parsed_block_by_end_offset(&self, end_offset: u32) -> Option<ParsedBlockId> {
        self.end_offset_index.get(&end_offset).copied()
    }

    pub fn parsed_block_by_start_offset(&self, start_offset: u32) -> Option<ParsedBlockId> {
        self.start_offset_index.get(&start_offset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Opcode, Special};

    fn push_self_return(raw: &mut RawMethod) {
        raw.push(Opcode::DoSpecial, Special::SelfReturn as u32, 0);
    }

    #[test]
    fn single_instruction_method_has_one_block() {
        let mut raw = RawMethod::new(0, 0);
        push_self_return(&mut raw);
        let method = ParsedMethod::parse(raw);

        assert_eq!(method.blocks().count(), 1);
        assert_eq!(method.outer_block().len(), 1);
        assert_eq!(method.outer_block().start_offset, 0);
        assert_eq!(method.outer_block().stop_offset, 1);
    }

    #[test]
    fn push_block_creates_nested_parsed_block() {
        // outer: pushBlock extra=3 ; selfReturn
        // inner (offsets 1..3): pushArgument 0 ; blockReturn
        let mut raw = RawMethod::new(1, 0);
        raw.push(Opcode::PushBlock, 0, 3);
        raw.push(Opcode::PushArgument, 0, 0);
        raw.push(Opcode::DoSpecial, Special::BlockReturn as u32, 0);
        raw.push(Opcode::DoSpecial, Special::SelfReturn as u32, 0);

        let method = ParsedMethod::parse(raw);

        // outer block contains only the pushBlock and the trailing selfReturn
        assert_eq!(method.outer_block().len(), 2);
        assert_eq!(method.outer_block().child_blocks.len(), 1);

        let inner_id = method.outer_block().child_blocks[0];
        let inner = method.block(inner_id);
        assert_eq!(inner.start_offset, 1);
        assert_eq!(inner.stop_offset, 3);
        assert_eq!(inner.len(), 2);

        assert_eq!(method.parsed_block_by_end_offset(3), Some(inner_id));
    }

    #[test]
    fn nested_blocks_decode_recursively() {
        // outer: pushBlock extra=3 ; selfReturn
        // inner (1..3): pushArgument 0 ; blockReturn
        let mut raw = RawMethod::new(0, 0);
        raw.push(Opcode::PushBlock, 0, 3); // 0: inner body [1,3)
        raw.push(Opcode::PushArgument, 0, 0); // 1
        raw.push(Opcode::DoSpecial, Special::BlockReturn as u32, 0); // 2
        raw.push(Opcode::DoSpecial, Special::SelfReturn as u32, 0); // 3

        let method = ParsedMethod::parse(raw);
        assert_eq!(method.outer_block().len(), 2);
        assert_eq!(method.blocks().count(), 2);
    }
}
