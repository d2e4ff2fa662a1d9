//! Basic-block formation (component C): partition a parsed block's flat
//! instruction sequence into basic blocks at terminator and branch-target
//! boundaries, and compute each block's referer (predecessor) set.

use std::collections::{BTreeSet, HashMap};

use crate::instruction::Instruction;

/// A contiguous instruction range ending in exactly one terminator, the
/// last instruction in the range (invariant 1 in the data model).
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Byte offset of the first instruction — this block's identity within
    /// its owning `ParsedBlock`.
    pub offset: u32,
    pub instructions: Vec<Instruction>,
    /// Offsets of predecessor blocks that branch (or fall through) here.
    /// Empty only for the entry block.
    pub referers: BTreeSet<u32>,
}

impl BasicBlock {
    pub fn terminator(&self) -> &Instruction {
        self.instructions
            .last()
            .expect("a basic block is never empty (invariant 1)")
    }

    pub fn entry_offset(&self) -> u32 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Splits `instructions` (assumed already in strictly increasing offset
/// order, as decoded by a single `ParsedBlock`) into basic blocks and wires
/// up referer sets. The first instruction's offset becomes the entry
/// block's offset; by construction no well-formed bytecode branches
/// backward into the entry, so its referer set comes out empty.
pub fn form_basic_blocks(instructions: &[Instruction]) -> Vec<BasicBlock> {
    if instructions.is_empty() {
        return Vec::new();
    }

    let offset_index: HashMap<u32, usize> = instructions
        .iter()
        .enumerate()
        .map(|(i, instr)| (instr.offset, i))
        .collect();

    let mut starts: BTreeSet<u32> = BTreeSet::new();
    starts.insert(instructions[0].offset);

    for (i, instr) in instructions.iter().enumerate() {
        if instr.is_terminator() {
            if let Some(next) = instructions.get(i + 1) {
                starts.insert(next.offset);
            }
        }
        if instr.is_branch() {
            if offset_index.contains_key(&instr.extra) {
                starts.insert(instr.extra);
            }
        }
    }

    let start_positions: Vec<usize> = starts
        .iter()
        .map(|offset| offset_index[offset])
        .collect();

    let mut blocks = Vec::with_capacity(start_positions.len());
    for (i, &start_pos) in start_positions.iter().enumerate() {
        let end_pos = start_positions.get(i + 1).copied().unwrap_or(instructions.len());
        let slice = &instructions[start_pos..end_pos];
        blocks.push(BasicBlock {
            offset: slice[0].offset,
            instructions: slice.to_vec(),
            referers: BTreeSet::new(),
        });
    }

    let block_index_by_offset: HashMap<u32, usize> = blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.offset, i))
        .collect();

    for i in 0..blocks.len() {
        let terminator = *blocks[i].terminator();
        let this_offset = blocks[i].offset;
        if terminator.is_branch() {
            if let Some(&target_idx) = block_index_by_offset.get(&terminator.extra) {
                blocks[target_idx].referers.insert(this_offset);
            }
            if terminator.is_conditional_branch() {
                if let Some(fallthrough) = blocks.get(i + 1) {
                    let fallthrough_offset = fallthrough.offset;
                    if let Some(&fallthrough_idx) = block_index_by_offset.get(&fallthrough_offset)
                    {
                        blocks[fallthrough_idx].referers.insert(this_offset);
                    }
                }
            }
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Opcode, Special};

    fn instr(offset: u32, opcode: Opcode, argument: u32, extra: u32) -> Instruction {
        Instruction::new(offset, opcode, argument, extra)
    }

    #[test]
    fn single_instruction_is_one_block_with_no_referers() {
        let instrs = vec![instr(0, Opcode::DoSpecial, Special::SelfReturn as u32, 0)];
        let blocks = form_basic_blocks(&instrs);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].referers.is_empty());
        assert_eq!(blocks[0].offset, 0);
    }

    #[test]
    fn unconditional_branch_splits_into_two_blocks_with_one_referer() {
        // 0: branch -> 2 ; 1: (unreachable filler not needed) ; 2: selfReturn
        let instrs = vec![
            instr(0, Opcode::DoSpecial, Special::Branch as u32, 2),
            instr(2, Opcode::DoSpecial, Special::SelfReturn as u32, 0),
        ];
        let blocks = form_basic_blocks(&instrs);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].offset, 0);
        assert_eq!(blocks[1].offset, 2);
        assert!(blocks[0].referers.is_empty());
        assert_eq!(blocks[1].referers, BTreeSet::from([0]));
    }

    #[test]
    fn conditional_branch_adds_referer_to_both_targets() {
        // 0: pushConstant ; 1: branchIfFalse -> 3 ; 2: pushLiteral (then-arm) ;
        // 3: selfReturn (else-arm / join, reached by fallthrough too in this toy shape)
        let instrs = vec![
            instr(0, Opcode::PushConstant, 11, 0),
            instr(1, Opcode::DoSpecial, Special::BranchIfFalse as u32, 3),
            instr(2, Opcode::DoSpecial, Special::SelfReturn as u32, 0),
            instr(3, Opcode::DoSpecial, Special::SelfReturn as u32, 0),
        ];
        let blocks = form_basic_blocks(&instrs);
        // splits: {0} entry (contains pushConstant + branchIfFalse),
        // {2} fallthrough target, {3} branch target
        assert_eq!(blocks.len(), 3);
        let by_offset: HashMap<u32, &BasicBlock> =
            blocks.iter().map(|b| (b.offset, b)).collect();
        assert_eq!(by_offset[&2].referers, BTreeSet::from([0]));
        assert_eq!(by_offset[&3].referers, BTreeSet::from([0]));
    }
}
