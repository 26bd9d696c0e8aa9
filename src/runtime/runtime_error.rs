use crate::bytecode::op::Op;
use crate::runtime::heap::HeapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    OutOfMemory,
    TypeError,
    NotAFunction,
    ArityMismatch,
    UnassignedName,
    OperandStackOverflow,
    OperandStackUnderflow,
    ControlStackUnderflow,
    InvalidAddress,
    StaleReference,
    StepLimit,
    Internal,
}

/// A fatal machine error. The machine has no recovery: the first error
/// ends the run, tagged with the instruction that raised it.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    pub pc: Option<usize>,
    pub opcode: Option<String>,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
            pc: None,
            opcode: None,
        }
    }

    /// Attach the failing instruction, unless an inner frame already did.
    pub fn at(mut self, pc: usize, op: &Op) -> Self {
        if self.pc.is_none() {
            self.pc = Some(pc);
            self.opcode = Some(op.name().to_string());
        }
        self
    }
}

pub fn type_error(expected: &str, got: &str, context: &str) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::TypeError,
        format!("{} expects {}, got {}", context, expected, got),
    )
}

pub fn not_a_function(got: &str) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::NotAFunction,
        format!("cannot call a value of type {}", got),
    )
}

pub fn arity_mismatch(expected: usize, got: usize) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::ArityMismatch,
        format!("expected {} argument(s), got {}", expected, got),
    )
}

pub fn internal(message: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::Internal, message)
}

impl From<HeapError> for RuntimeError {
    fn from(err: HeapError) -> Self {
        let kind = match err {
            HeapError::OutOfMemory { .. } => RuntimeErrorKind::OutOfMemory,
            HeapError::StaleReference { .. } | HeapError::CorruptHeader { .. } => {
                RuntimeErrorKind::StaleReference
            }
            HeapError::OperandStackOverflow { .. } => RuntimeErrorKind::OperandStackOverflow,
            HeapError::OperandStackUnderflow => RuntimeErrorKind::OperandStackUnderflow,
            HeapError::KindMismatch { .. }
            | HeapError::OffsetOutOfBounds { .. }
            | HeapError::UnexpectedWord { .. } => {
                RuntimeErrorKind::Internal
            }
        };
        RuntimeError::new(kind, err.to_string())
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error")?;
        if let Some(pc) = self.pc {
            write!(f, " at pc={}", pc)?;
        }
        if let Some(op) = &self.opcode {
            write!(f, " ({})", op)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for RuntimeError {}
