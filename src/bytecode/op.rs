use crate::lang::value::Value;
use serde::{Deserialize, Serialize};

// =============================================================================
// OP - Bytecode instructions
// =============================================================================

/// One instruction of the machine.
///
/// Addresses are absolute indices into the program's instruction array.
/// Lexical addresses count `frame` enclosing-links outward from the
/// current environment and then index `slot` within that frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    // literals
    /// Box the value and push it. `( -- v )`
    LoadConstant(Value),

    // names
    /// Push the value bound at the lexical address. `( -- v )`
    LoadLexical { frame: usize, slot: usize },

    /// Store top of stack at the lexical address; the value stays. `( v -- v )`
    AssignLexical { frame: usize, slot: usize },

    // control flow
    /// Pop the predicate; jump if it is `false`. `( b -- )`
    JumpOnFalse(usize),

    /// Unconditional jump. `( -- )`
    Goto(usize),

    /// Discard top of stack. `( v -- )`
    Pop,

    // scopes
    /// Save the environment in a block frame and extend it with `count`
    /// unassigned slots.
    EnterScope(usize),

    /// Restore the environment saved by the matching `EnterScope`.
    ExitScope,

    // functions
    /// Create a closure over the current environment. `( -- f )`
    LoadFunction {
        arity: usize,
        address: usize,
        max_stack: usize,
    },

    /// Apply the callee below `n` arguments. `( f a1 .. an -- r )`
    Call(usize),

    /// Apply in tail position, reusing the current call frame.
    TailCall(usize),

    /// Return top of stack to the caller.
    Return,

    /// Halt. The sole value on the operand stack is the result.
    Done,
}

impl Op {
    /// Jump target, if the instruction transfers control to a fixed address.
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Op::JumpOnFalse(addr) | Op::Goto(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Mnemonic used by the disassembler and in runtime errors.
    pub fn name(&self) -> &'static str {
        match self {
            Op::LoadConstant(_) => "LDC",
            Op::LoadLexical { .. } => "LDL",
            Op::AssignLexical { .. } => "ASSL",
            Op::JumpOnFalse(_) => "JOF",
            Op::Goto(_) => "GOTO",
            Op::Pop => "POP",
            Op::EnterScope(_) => "ENTER_SCOPE",
            Op::ExitScope => "EXIT_SCOPE",
            Op::LoadFunction { .. } => "LDF",
            Op::Call(_) => "CALL",
            Op::TailCall(_) => "TAIL_CALL",
            Op::Return => "RTN",
            Op::Done => "DONE",
        }
    }
}
