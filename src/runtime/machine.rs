use crate::bytecode::{Op, Program, disasm::format_op};
use crate::runtime::{
    config::MachineConfig,
    heap::{Heap, HeapStats, NodeKind, NodeRef, Word},
    objects::*,
    primitives::{Host, PRIMITIVES, lookup},
    registers::Registers,
    runtime_error::{
        RuntimeError, RuntimeErrorKind, arity_mismatch, internal, not_a_function, type_error,
    },
    value::{Prim, ResultValue, Unboxed},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MachineStats {
    pub steps: usize,
    pub peak_control_depth: usize,
    pub heap: HeapStats,
}

/// Compile-free entry point: boot a machine for `program` and run it.
#[allow(dead_code)]
pub fn execute(program: &Program, config: MachineConfig) -> Result<ResultValue, RuntimeError> {
    Machine::boot(program, config)?.run()
}

pub struct Machine<'p> {
    program: &'p Program,
    config: MachineConfig,
    heap: Heap,
    regs: Registers,
    host: Host,
    steps: usize,
    peak_control_depth: usize,
    /// Collection count at the last string-table sweep.
    swept_at: usize,
}

impl<'p> Machine<'p> {
    /// Build the global environment (one primitive function per table
    /// entry) and the top-level operand stack.
    pub fn boot(program: &'p Program, config: MachineConfig) -> Result<Self, RuntimeError> {
        let mut heap = Heap::new(config.heap_size);
        let mut roots: Vec<NodeRef> = Vec::new();

        let globals = new_environment(&mut heap, &mut roots, PRIMITIVES.len())?;
        roots.push(globals);
        for id in 0..PRIMITIVES.len() {
            let primitive = new_primitive_function(&mut heap, &mut roots, id)?;
            set_env_slot(&mut heap, roots[0], id, primitive)?;
        }
        let os = new_operand_stack(&mut heap, &mut roots, program.main_stack_size)?;

        log::debug!(
            "booted: {} primitives, heap {} words ({} in use)",
            PRIMITIVES.len(),
            heap.stats().capacity,
            heap.used()
        );

        Ok(Self {
            program,
            regs: Registers::new(roots[0], os),
            heap,
            config,
            host: Host::new(),
            steps: 0,
            peak_control_depth: 0,
            swept_at: 0,
        })
    }

    pub fn stats(&self) -> MachineStats {
        MachineStats {
            steps: self.steps,
            peak_control_depth: self.peak_control_depth,
            heap: self.heap.stats(),
        }
    }

    /// Lines printed by `display`, in order.
    #[allow(dead_code)]
    pub fn output(&self) -> &[String] {
        &self.host.output
    }

    pub fn run(&mut self) -> Result<ResultValue, RuntimeError> {
        let program = self.program;
        loop {
            let pc = self.regs.pc;
            let op = program.ops.get(pc).ok_or_else(|| {
                RuntimeError::new(
                    RuntimeErrorKind::InvalidAddress,
                    format!(
                        "pc {} is outside the program ({} instructions)",
                        pc,
                        program.len()
                    ),
                )
            })?;

            self.check_limits().map_err(|e| e.at(pc, op))?;
            log::trace!("{:>5}  {}", pc, format_op(op));

            match self.step(op) {
                Ok(Some(result)) => return Ok(result),
                Ok(None) => self.sweep_strings(),
                Err(e) => return Err(e.at(pc, op)),
            }
        }
    }

    /// After a collection, release strings no surviving boxed value uses.
    fn sweep_strings(&mut self) {
        let collections = self.heap.stats().collections;
        if collections == self.swept_at {
            return;
        }
        self.swept_at = collections;

        let live = self.heap.live_words().iter().filter_map(|word| match word {
            Word::Prim(Prim::Str(id)) => Some(*id),
            _ => None,
        });
        self.host.retain_strings(live);
    }

    fn check_limits(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(RuntimeError::new(
                    RuntimeErrorKind::StepLimit,
                    format!("execution step limit exceeded ({})", max),
                ));
            }
        }

        Ok(())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Execute one instruction. Every handler that allocates re-reads
    /// `self.regs` afterwards instead of keeping node references in locals.
    fn step(&mut self, op: &Op) -> Result<Option<ResultValue>, RuntimeError> {
        match op {
            Op::LoadConstant(value) => {
                let prim = self.host.from_value(value);
                let node = new_boxed(&mut self.heap, &mut self.regs, prim)?;
                self.push(node)?;
                self.regs.pc += 1;
            }

            Op::LoadLexical { frame, slot } => {
                let env = self.walk(*frame)?;
                let value = env_slot(&self.heap, env, *slot)?.ok_or_else(|| {
                    RuntimeError::new(
                        RuntimeErrorKind::UnassignedName,
                        format!(
                            "name at ({}, {}) is used before its declaration runs",
                            frame, slot
                        ),
                    )
                })?;
                self.push(value)?;
                self.regs.pc += 1;
            }

            Op::AssignLexical { frame, slot } => {
                let value = stack_peek(&self.heap, self.regs.os, 0)?;
                let env = self.walk(*frame)?;
                set_env_slot(&mut self.heap, env, *slot, value)?;
                self.regs.pc += 1;
            }

            Op::JumpOnFalse(target) => {
                let predicate = self.pop()?;
                match unbox(&self.heap, predicate)? {
                    Unboxed::Prim(Prim::Bool(true)) => self.regs.pc += 1,
                    Unboxed::Prim(Prim::Bool(false)) => self.regs.pc = *target,
                    other => return Err(type_error("boolean", other.type_name(), "conditional")),
                }
            }

            Op::Goto(target) => self.regs.pc = *target,

            Op::Pop => {
                self.pop()?;
                self.regs.pc += 1;
            }

            Op::EnterScope(count) => {
                let frame = new_block_frame(&mut self.heap, &mut self.regs)?;
                set_frame_env(&mut self.heap, frame, self.regs.env)?;
                self.push_control(frame);

                // The frame is rooted now; the environment may move it.
                let env = new_environment(&mut self.heap, &mut self.regs, *count)?;
                set_env_enclosing(&mut self.heap, env, self.regs.env)?;
                self.regs.env = env;
                self.regs.pc += 1;
            }

            Op::ExitScope => {
                let frame = self.pop_control()?;
                self.heap.expect(frame, NodeKind::BlockFrame)?;
                self.regs.env = frame_env(&self.heap, frame)?;
                self.regs.pc += 1;
            }

            Op::LoadFunction {
                arity,
                address,
                max_stack,
            } => {
                let closure =
                    new_closure(&mut self.heap, &mut self.regs, *arity, *address, *max_stack)?;
                set_closure_env(&mut self.heap, closure, self.regs.env)?;
                self.push(closure)?;
                self.regs.pc += 1;
            }

            Op::Call(n) => self.call(*n, false)?,

            Op::TailCall(n) => self.call(*n, true)?,

            Op::Return => self.return_from_call()?,

            Op::Done => return self.done().map(Some),
        }

        Ok(None)
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn call(&mut self, n: usize, tail: bool) -> Result<(), RuntimeError> {
        let callee = stack_peek(&self.heap, self.regs.os, n)?;
        match self.heap.kind(callee)? {
            NodeKind::PrimitiveFunction => self.call_primitive(callee, n, tail),
            NodeKind::Closure => self.call_closure(callee, n, tail),
            _ => {
                let got = unbox(&self.heap, callee).map_or("non-value node", |v| v.type_name());
                Err(not_a_function(got))
            }
        }
    }

    /// Unbox the arguments, run the host function, box the result.
    fn call_primitive(&mut self, callee: NodeRef, n: usize, tail: bool) -> Result<(), RuntimeError> {
        let id = primitive_id(&self.heap, callee)?;
        let def = lookup(id).ok_or_else(|| internal(format!("no primitive with id {}", id)))?;
        if def.arity != n {
            let mut err = arity_mismatch(def.arity, n);
            err.message = format!("{}: {}", def.name, err.message);
            return Err(err);
        }

        let mut args = vec![Unboxed::Prim(Prim::Undefined); n];
        for arg in args.iter_mut().rev() {
            let node = self.pop()?;
            *arg = unbox(&self.heap, node)?;
        }
        self.pop()?;

        let prim = (def.apply)(&mut self.host, &args)?;
        let result = new_boxed(&mut self.heap, &mut self.regs, prim)?;
        self.push(result)?;

        if tail {
            self.return_from_call()
        } else {
            self.regs.pc += 1;
            Ok(())
        }
    }

    /// Allocate the callee's environment and operand stack (and, for a
    /// non-tail call, the call frame) while the arguments are still on
    /// the caller's stack, then move them across.
    fn call_closure(&mut self, callee: NodeRef, n: usize, tail: bool) -> Result<(), RuntimeError> {
        let arity = closure_arity(&self.heap, callee)?;
        let address = closure_address(&self.heap, callee)?;
        let max_stack = closure_max_stack(&self.heap, callee)?;
        if arity != n {
            return Err(arity_mismatch(arity, n));
        }

        let env = new_environment(&mut self.heap, &mut self.regs, n)?;
        self.regs.pinned.push(env);
        let os = new_operand_stack(&mut self.heap, &mut self.regs, max_stack)?;
        self.regs.pinned.push(os);
        let frame = if tail {
            None
        } else {
            let return_pc = self.regs.pc + 1;
            Some(new_call_frame(&mut self.heap, &mut self.regs, return_pc)?)
        };

        // No allocation below this line.
        let os = self.unpin()?;
        let env = self.unpin()?;

        for slot in (0..n).rev() {
            let value = self.pop()?;
            set_env_slot(&mut self.heap, env, slot, value)?;
        }
        let closure = self.pop()?;
        let enclosing = closure_env(&self.heap, closure)?;
        set_env_enclosing(&mut self.heap, env, enclosing)?;

        match frame {
            Some(frame) => {
                set_frame_env(&mut self.heap, frame, self.regs.env)?;
                set_frame_stack(&mut self.heap, frame, self.regs.os)?;
                self.push_control(frame);
            }
            None => self.unwind_blocks()?,
        }

        self.regs.env = env;
        self.regs.os = os;
        self.regs.pc = address;
        Ok(())
    }

    /// Pop the return value, drop block frames down to the innermost call
    /// frame, restore the caller and hand it the value.
    fn return_from_call(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop()?;
        self.unwind_blocks()?;
        let frame = self.pop_control()?;

        self.regs.pc = frame_return_pc(&self.heap, frame)?;
        self.regs.env = frame_env(&self.heap, frame)?;
        self.regs.os = frame_stack(&self.heap, frame)?;
        self.push(value)?;
        Ok(())
    }

    /// Discard block frames until a call frame is on top; fails if there is
    /// no call frame at all.
    fn unwind_blocks(&mut self) -> Result<(), RuntimeError> {
        loop {
            let top = *self.regs.control.last().ok_or_else(|| {
                RuntimeError::new(
                    RuntimeErrorKind::ControlStackUnderflow,
                    "return with no enclosing call frame",
                )
            })?;
            match self.heap.kind(top)? {
                NodeKind::CallFrame => return Ok(()),
                NodeKind::BlockFrame => {
                    self.regs.control.pop();
                }
                other => {
                    return Err(internal(format!("{:?} node on the control stack", other)));
                }
            }
        }
    }

    fn done(&mut self) -> Result<ResultValue, RuntimeError> {
        let depth = stack_depth(&self.heap, self.regs.os)?;
        if depth != 1 {
            return Err(internal(format!(
                "program finished with {} values on the operand stack",
                depth
            )));
        }
        let node = self.pop()?;

        log::debug!(
            "done after {} steps, {} collections",
            self.steps,
            self.heap.stats().collections
        );

        Ok(match unbox(&self.heap, node)? {
            Unboxed::Prim(prim) => ResultValue::Value(self.host.to_value(prim)),
            Unboxed::Closure { arity, .. } => ResultValue::Function { arity },
            Unboxed::Primitive(id) => ResultValue::Primitive {
                name: lookup(id).map_or("?", |def| def.name).to_string(),
            },
        })
    }

    // =========================================================================
    // Register helpers
    // =========================================================================

    fn push(&mut self, value: NodeRef) -> Result<(), RuntimeError> {
        stack_push(&mut self.heap, self.regs.os, value)?;
        Ok(())
    }

    fn pop(&mut self) -> Result<NodeRef, RuntimeError> {
        Ok(stack_pop(&mut self.heap, self.regs.os)?)
    }

    fn walk(&self, frames: usize) -> Result<NodeRef, RuntimeError> {
        env_walk(&self.heap, self.regs.env, frames)?.ok_or_else(|| {
            RuntimeError::new(
                RuntimeErrorKind::InvalidAddress,
                format!("environment chain is shorter than {} frames", frames),
            )
        })
    }

    fn push_control(&mut self, frame: NodeRef) {
        self.regs.control.push(frame);
        self.peak_control_depth = self.peak_control_depth.max(self.regs.control.len());
    }

    fn pop_control(&mut self) -> Result<NodeRef, RuntimeError> {
        self.regs.control.pop().ok_or_else(|| {
            RuntimeError::new(
                RuntimeErrorKind::ControlStackUnderflow,
                "control stack is empty",
            )
        })
    }

    fn unpin(&mut self) -> Result<NodeRef, RuntimeError> {
        self.regs
            .pinned
            .pop()
            .ok_or_else(|| internal("temporary root stack is empty"))
    }
}
