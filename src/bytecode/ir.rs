use crate::bytecode::Op;
use serde::{Deserialize, Serialize};

/// A compiled program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Flat instruction array. Function bodies are inlined behind a
    /// `Goto` that skips them. Convention: the last op is always `Done`.
    pub ops: Vec<Op>,

    /// Operand-stack capacity needed by the top-level code.
    pub main_stack_size: usize,
}

impl Program {
    pub fn new(ops: Vec<Op>, main_stack_size: usize) -> Self {
        Self {
            ops,
            main_stack_size,
        }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Entry addresses of every function body, in emission order.
    pub fn function_entries(&self) -> Vec<usize> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::LoadFunction { address, .. } => Some(*address),
                _ => None,
            })
            .collect()
    }
}
