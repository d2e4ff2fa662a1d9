//! The instruction model (component A): a tagged opcode/argument/extra
//! triple plus the predicates the rest of the pipeline dispatches on.
//!
//! Opcode and special tags mirror the numeric layout of the original VM's
//! `TInstruction::Opcode` and `TSmalltalkInstruction::Special` enums so that
//! [`Instruction::serialize`] round-trips against real bytecode streams.

use serde::{Deserialize, Serialize};

/// Primary opcode, carried in the first byte of an encoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Extended = 0,
    PushInstance = 1,
    PushArgument = 2,
    PushTemporary = 3,
    PushLiteral = 4,
    PushConstant = 5,
    AssignInstance = 6,
    AssignTemporary = 7,
    MarkArguments = 8,
    SendMessage = 9,
    SendUnary = 10,
    SendBinary = 11,
    PushBlock = 12,
    DoPrimitive = 13,
    DoSpecial = 15,
}

/// Secondary opcode carried in `argument` when `opcode == DoSpecial`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Special {
    SelfReturn = 1,
    StackReturn = 2,
    BlockReturn = 3,
    Duplicate = 4,
    PopTop = 5,
    Branch = 6,
    BranchIfTrue = 7,
    BranchIfFalse = 8,
    SendToSuper = 11,
    Breakpoint = 12,
}

/// Well-known `pushConstant` argument tags (small integers 0-9 are their own
/// tag; everything above them names a global singleton).
pub mod push_constants {
    pub const NIL: u32 = 10;
    pub const TRUE_OBJECT: u32 = 11;
    pub const FALSE_OBJECT: u32 = 12;
}

/// Binary send operators recognized by the type analyzer's fast paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BinaryOperator {
    Less = 0,
    LessOrEqual = 1,
    Plus = 2,
}

impl BinaryOperator {
    pub fn from_argument(argument: u32) -> Option<Self> {
        match argument {
            0 => Some(BinaryOperator::Less),
            1 => Some(BinaryOperator::LessOrEqual),
            2 => Some(BinaryOperator::Plus),
            _ => None,
        }
    }
}

/// Unary send selectors recognized by the type analyzer's fast paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UnaryOperator {
    IsNil = 0,
    NotNil = 1,
}

impl UnaryOperator {
    pub fn from_argument(argument: u32) -> Option<Self> {
        match argument {
            0 => Some(UnaryOperator::IsNil),
            1 => Some(UnaryOperator::NotNil),
            _ => None,
        }
    }
}

/// Immutable `(opcode, argument, extra)` triple. `argument` carries the
/// special code for `DoSpecial`, the primitive number for `DoPrimitive`, the
/// literal/temp/instance index for pushes, or the send-argument count for
/// `MarkArguments`. `extra` carries a branch/block target byte offset where
/// relevant and is otherwise zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub argument: u32,
    pub extra: u32,
    /// Byte offset of this instruction within its method — not part of the
    /// original triple, but needed for offset-addressed indexing (§3) and
    /// kept here rather than threaded everywhere.
    pub offset: u32,
}

impl Instruction {
    pub fn new(offset: u32, opcode: Opcode, argument: u32, extra: u32) -> Self {
        Instruction {
            opcode,
            argument,
            extra,
            offset,
        }
    }

    /// The special code, if this is a `DoSpecial` instruction.
    pub fn special(&self) -> Option<Special> {
        if self.opcode != Opcode::DoSpecial {
            return None;
        }
        match self.argument {
            1 => Some(Special::SelfReturn),
            2 => Some(Special::StackReturn),
            3 => Some(Special::BlockReturn),
            4 => Some(Special::Duplicate),
            5 => Some(Special::PopTop),
            6 => Some(Special::Branch),
            7 => Some(Special::BranchIfTrue),
            8 => Some(Special::BranchIfFalse),
            11 => Some(Special::SendToSuper),
            12 => Some(Special::Breakpoint),
            _ => None,
        }
    }

    /// A terminator is any return-kind special or a branch (invariant 1/2).
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.special(),
            Some(
                Special::SelfReturn
                    | Special::StackReturn
                    | Special::BlockReturn
                    | Special::Branch
                    | Special::BranchIfTrue
                    | Special::BranchIfFalse
            )
        )
    }

    /// A branch is one of the three branch specials (invariant 6).
    pub fn is_branch(&self) -> bool {
        matches!(
            self.special(),
            Some(Special::Branch | Special::BranchIfTrue | Special::BranchIfFalse)
        )
    }

    pub fn is_conditional_branch(&self) -> bool {
        matches!(
            self.special(),
            Some(Special::BranchIfTrue | Special::BranchIfFalse)
        )
    }

    /// Any push, any send, `markArguments`, `pushBlock`, `duplicate`,
    /// `sendToSuper`, `doPrimitive` produces a stack value.
    pub fn is_value_provider(&self) -> bool {
        match self.opcode {
            Opcode::PushInstance
            | Opcode::PushArgument
            | Opcode::PushTemporary
            | Opcode::PushLiteral
            | Opcode::PushConstant
            | Opcode::PushBlock
            | Opcode::SendMessage
            | Opcode::SendUnary
            | Opcode::SendBinary
            | Opcode::MarkArguments
            | Opcode::DoPrimitive => true,
            Opcode::DoSpecial => matches!(
                self.special(),
                Some(Special::Duplicate | Special::SendToSuper)
            ),
            _ => false,
        }
    }

    /// Any send, `assign*`, return-stack/block, `popTop`, conditional
    /// branches, `duplicate` consumes at least one stack value.
    pub fn is_value_consumer(&self) -> bool {
        match self.opcode {
            Opcode::SendMessage
            | Opcode::SendUnary
            | Opcode::SendBinary
            | Opcode::AssignInstance
            | Opcode::AssignTemporary
            | Opcode::MarkArguments
            | Opcode::DoPrimitive => true,
            Opcode::DoSpecial => matches!(
                self.special(),
                Some(
                    Special::StackReturn
                        | Special::BlockReturn
                        | Special::PopTop
                        | Special::BranchIfTrue
                        | Special::BranchIfFalse
                        | Special::Duplicate
                        | Special::SendToSuper
                )
            ),
            _ => false,
        }
    }

    /// Side-effect-free push-like instructions whose only observable effect
    /// is producing a stack value (candidates for Phase 3 dead-push removal).
    pub fn is_trivial(&self) -> bool {
        matches!(
            self.opcode,
            Opcode::PushInstance
                | Opcode::PushArgument
                | Opcode::PushTemporary
                | Opcode::PushLiteral
                | Opcode::PushConstant
        )
    }

    /// The number of positional arguments this opcode's node must carry,
    /// per the §4.D table. `None` means "variable" (`doPrimitive` uses its
    /// own argument count; `markArguments` uses its own `n`).
    pub fn expected_argument_count(&self) -> ExpectedArity {
        match self.opcode {
            Opcode::PushInstance
            | Opcode::PushArgument
            | Opcode::PushTemporary
            | Opcode::PushLiteral
            | Opcode::PushConstant
            | Opcode::PushBlock => ExpectedArity::Exactly(0),
            Opcode::SendUnary | Opcode::AssignInstance | Opcode::AssignTemporary => {
                ExpectedArity::Exactly(1)
            }
            Opcode::SendBinary => ExpectedArity::Exactly(2),
            Opcode::SendMessage => ExpectedArity::Exactly(1),
            Opcode::MarkArguments => ExpectedArity::Exactly(self.argument),
            Opcode::DoPrimitive => ExpectedArity::Exactly(self.argument),
            Opcode::DoSpecial => match self.special() {
                Some(Special::SelfReturn) => ExpectedArity::Exactly(0),
                Some(Special::StackReturn | Special::BlockReturn) => ExpectedArity::Exactly(1),
                Some(Special::Duplicate | Special::SendToSuper) => ExpectedArity::Exactly(1),
                Some(Special::PopTop) => ExpectedArity::Exactly(1),
                Some(Special::BranchIfTrue | Special::BranchIfFalse) => ExpectedArity::Exactly(1),
                Some(Special::Branch | Special::Breakpoint) => ExpectedArity::Exactly(0),
                None => ExpectedArity::AtLeast(1),
            },
            Opcode::Extended => ExpectedArity::Exactly(0),
        }
    }

    /// Stable textual form, used only in diagnostics — never parsed back.
    pub fn to_diagnostic_string(&self) -> String {
        match self.special() {
            Some(special) => format!(
                "@{}: doSpecial {:?} (extra={})",
                self.offset, special, self.extra
            ),
            None => format!(
                "@{}: {:?} {} (extra={})",
                self.offset, self.opcode, self.argument, self.extra
            ),
        }
    }

    /// Bit-exact encoding used by tests and the round-trip oracle (invariant
    /// 11) to compare "the same instruction".
    pub fn serialize(&self) -> [u32; 3] {
        [self.opcode as u32, self.argument, self.extra]
    }
}

/// Result of [`Instruction::expected_argument_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedArity {
    Exactly(u32),
    AtLeast(u32),
}

impl ExpectedArity {
    pub fn satisfied_by(&self, actual: usize) -> bool {
        match *self {
            ExpectedArity::Exactly(n) => actual as u32 == n,
            ExpectedArity::AtLeast(n) => actual as u32 >= n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn special(offset: u32, special: Special, extra: u32) -> Instruction {
        Instruction::new(offset, Opcode::DoSpecial, special as u32, extra)
    }

    #[test]
    fn self_return_is_terminator_not_branch() {
        let instr = special(0, Special::SelfReturn, 0);
        assert!(instr.is_terminator());
        assert!(!instr.is_branch());
    }

    #[test]
    fn branch_if_true_is_terminator_and_branch_and_consumer() {
        let instr = special(4, Special::BranchIfTrue, 12);
        assert!(instr.is_terminator());
        assert!(instr.is_branch());
        assert!(instr.is_conditional_branch());
        assert!(instr.is_value_consumer());
        assert!(!instr.is_value_provider());
    }

    #[test]
    fn unconditional_branch_is_not_conditional() {
        let instr = special(4, Special::Branch, 12);
        assert!(instr.is_branch());
        assert!(!instr.is_conditional_branch());
        assert!(!instr.is_value_consumer());
    }

    #[test]
    fn push_literal_is_trivial_provider_with_no_arguments() {
        let instr = Instruction::new(0, Opcode::PushLiteral, 3, 0);
        assert!(instr.is_trivial());
        assert!(instr.is_value_provider());
        assert!(!instr.is_value_consumer());
        assert_eq!(instr.expected_argument_count(), ExpectedArity::Exactly(0));
    }

    #[test]
    fn send_binary_expects_two_arguments() {
        let instr = Instruction::new(0, Opcode::SendBinary, 2, 0);
        assert_eq!(instr.expected_argument_count(), ExpectedArity::Exactly(2));
        assert!(instr.is_value_provider());
        assert!(instr.is_value_consumer());
        assert!(!instr.is_trivial());
    }

    #[test]
    fn mark_arguments_arity_matches_its_own_argument() {
        let instr = Instruction::new(0, Opcode::MarkArguments, 3, 0);
        assert_eq!(instr.expected_argument_count(), ExpectedArity::Exactly(3));
    }

    #[test]
    fn duplicate_is_both_provider_and_consumer() {
        let instr = special(0, Special::Duplicate, 0);
        assert!(instr.is_value_provider());
        assert!(instr.is_value_consumer());
        assert!(!instr.is_terminator());
    }

    #[test]
    fn serialize_is_bit_exact_for_equal_instructions() {
        let a = Instruction::new(8, Opcode::PushConstant, 5, 0);
        let b = Instruction::new(8, Opcode::PushConstant, 5, 0);
        assert_eq!(a.serialize(), b.serialize());
    }

    #[test]
    fn binary_operator_decoding() {
        assert_eq!(BinaryOperator::from_argument(2), Some(BinaryOperator::Plus));
        assert_eq!(BinaryOperator::from_argument(99), None);
    }
}
