//! Fixed layouts for every node kind.
//!
//! ```text
//! environment     [hdr] slot_0 .. slot_n-1  enclosing          children n+1
//! closure         [hdr] env  arity  address  max_stack         children 1
//! primitive fn    [hdr] id                                     children 0
//! call frame      [hdr] env  os  return_pc                     children 2
//! block frame     [hdr] env                                    children 1
//! operand stack   [hdr] slot_0 .. slot_cap-1  top              children cap
//! boxed value     [hdr] prim                                   children 0
//! ```
//!
//! Constructors never take node references: any reference held across
//! the allocation could be stale by the time it is stored. Callers link
//! fresh nodes afterwards, re-reading what they need from their roots.

use crate::runtime::heap::{HEADER_SIZE, Heap, HeapError, NodeKind, NodeRef, RootSet, Word};
use crate::runtime::value::{Prim, Unboxed};

const FIRST: usize = HEADER_SIZE;

pub const CLOSURE_SIZE: usize = HEADER_SIZE + 4;
pub const PRIMITIVE_SIZE: usize = HEADER_SIZE + 1;
pub const CALL_FRAME_SIZE: usize = HEADER_SIZE + 3;
pub const BLOCK_FRAME_SIZE: usize = HEADER_SIZE + 1;
pub const BOXED_SIZE: usize = HEADER_SIZE + 1;

pub fn environment_size(slots: usize) -> usize {
    HEADER_SIZE + slots + 1
}

pub fn operand_stack_size(capacity: usize) -> usize {
    HEADER_SIZE + capacity + 1
}

// =========================================================================
// Constructors
// =========================================================================

/// Environment of `slots` unassigned slots with no enclosing environment.
pub fn new_environment(
    heap: &mut Heap,
    roots: &mut impl RootSet,
    slots: usize,
) -> Result<NodeRef, HeapError> {
    let env = heap.allocate(
        roots,
        NodeKind::Environment,
        environment_size(slots),
        slots + 1,
    )?;
    for slot in 0..slots {
        heap.write(env, FIRST + slot, Word::Unassigned)?;
    }
    heap.write(env, FIRST + slots, Word::Nil)?;
    Ok(env)
}

/// Closure over no environment yet; see [`set_closure_env`].
pub fn new_closure(
    heap: &mut Heap,
    roots: &mut impl RootSet,
    arity: usize,
    address: usize,
    max_stack: usize,
) -> Result<NodeRef, HeapError> {
    let closure = heap.allocate(roots, NodeKind::Closure, CLOSURE_SIZE, 1)?;
    heap.write(closure, FIRST, Word::Nil)?;
    heap.write(closure, FIRST + 1, Word::Count(arity))?;
    heap.write(closure, FIRST + 2, Word::Count(address))?;
    heap.write(closure, FIRST + 3, Word::Count(max_stack))?;
    Ok(closure)
}

pub fn new_primitive_function(
    heap: &mut Heap,
    roots: &mut impl RootSet,
    id: usize,
) -> Result<NodeRef, HeapError> {
    let node = heap.allocate(roots, NodeKind::PrimitiveFunction, PRIMITIVE_SIZE, 0)?;
    heap.write(node, FIRST, Word::Count(id))?;
    Ok(node)
}

pub fn new_call_frame(
    heap: &mut Heap,
    roots: &mut impl RootSet,
    return_pc: usize,
) -> Result<NodeRef, HeapError> {
    let frame = heap.allocate(roots, NodeKind::CallFrame, CALL_FRAME_SIZE, 2)?;
    heap.write(frame, FIRST, Word::Nil)?;
    heap.write(frame, FIRST + 1, Word::Nil)?;
    heap.write(frame, FIRST + 2, Word::Count(return_pc))?;
    Ok(frame)
}

pub fn new_block_frame(heap: &mut Heap, roots: &mut impl RootSet) -> Result<NodeRef, HeapError> {
    let frame = heap.allocate(roots, NodeKind::BlockFrame, BLOCK_FRAME_SIZE, 1)?;
    heap.write(frame, FIRST, Word::Nil)?;
    Ok(frame)
}

/// Empty operand stack holding at most `capacity` entries.
pub fn new_operand_stack(
    heap: &mut Heap,
    roots: &mut impl RootSet,
    capacity: usize,
) -> Result<NodeRef, HeapError> {
    let os = heap.allocate(
        roots,
        NodeKind::OperandStack,
        operand_stack_size(capacity),
        capacity,
    )?;
    heap.write(os, FIRST + capacity, Word::Count(0))?;
    Ok(os)
}

pub fn new_boxed(heap: &mut Heap, roots: &mut impl RootSet, prim: Prim) -> Result<NodeRef, HeapError> {
    let node = heap.allocate(roots, NodeKind::Boxed, BOXED_SIZE, 0)?;
    heap.write(node, FIRST, Word::Prim(prim))?;
    Ok(node)
}

// =========================================================================
// Slot helpers
// =========================================================================

fn read_ref(heap: &Heap, node: NodeRef, offset: usize) -> Result<NodeRef, HeapError> {
    match heap.read(node, offset)? {
        Word::Ref(r) => Ok(r),
        found => Err(unexpected(node, offset, "node reference", found)),
    }
}

fn read_count(heap: &Heap, node: NodeRef, offset: usize) -> Result<usize, HeapError> {
    match heap.read(node, offset)? {
        Word::Count(n) => Ok(n),
        found => Err(unexpected(node, offset, "count", found)),
    }
}

fn unexpected(node: NodeRef, offset: usize, expected: &'static str, found: Word) -> HeapError {
    HeapError::UnexpectedWord {
        index: node.index(),
        offset,
        expected,
        found,
    }
}

// =========================================================================
// Environments
// =========================================================================

pub fn env_len(heap: &Heap, env: NodeRef) -> Result<usize, HeapError> {
    heap.expect(env, NodeKind::Environment)?;
    Ok(heap.child_count(env)? - 1)
}

fn env_slot_offset(heap: &Heap, env: NodeRef, slot: usize) -> Result<usize, HeapError> {
    if slot >= env_len(heap, env)? {
        return Err(HeapError::OffsetOutOfBounds {
            index: env.index(),
            offset: FIRST + slot,
        });
    }
    Ok(FIRST + slot)
}

/// `None` while the slot's declaration has not run.
pub fn env_slot(heap: &Heap, env: NodeRef, slot: usize) -> Result<Option<NodeRef>, HeapError> {
    let offset = env_slot_offset(heap, env, slot)?;
    match heap.read(env, offset)? {
        Word::Ref(r) => Ok(Some(r)),
        Word::Unassigned => Ok(None),
        found => Err(unexpected(env, offset, "value reference", found)),
    }
}

pub fn set_env_slot(
    heap: &mut Heap,
    env: NodeRef,
    slot: usize,
    value: NodeRef,
) -> Result<(), HeapError> {
    let offset = env_slot_offset(heap, env, slot)?;
    heap.write(env, offset, Word::Ref(value))
}

pub fn env_enclosing(heap: &Heap, env: NodeRef) -> Result<Option<NodeRef>, HeapError> {
    let offset = FIRST + env_len(heap, env)?;
    match heap.read(env, offset)? {
        Word::Ref(r) => Ok(Some(r)),
        Word::Nil => Ok(None),
        found => Err(unexpected(env, offset, "environment reference", found)),
    }
}

pub fn set_env_enclosing(heap: &mut Heap, env: NodeRef, enclosing: NodeRef) -> Result<(), HeapError> {
    heap.expect(enclosing, NodeKind::Environment)?;
    let offset = FIRST + env_len(heap, env)?;
    heap.write(env, offset, Word::Ref(enclosing))
}

/// Follow `frames` enclosing links; `None` if the chain is shorter.
pub fn env_walk(heap: &Heap, env: NodeRef, frames: usize) -> Result<Option<NodeRef>, HeapError> {
    let mut current = env;
    for _ in 0..frames {
        match env_enclosing(heap, current)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

// =========================================================================
// Functions
// =========================================================================

pub fn closure_env(heap: &Heap, closure: NodeRef) -> Result<NodeRef, HeapError> {
    heap.expect(closure, NodeKind::Closure)?;
    read_ref(heap, closure, FIRST)
}

pub fn set_closure_env(heap: &mut Heap, closure: NodeRef, env: NodeRef) -> Result<(), HeapError> {
    heap.expect(closure, NodeKind::Closure)?;
    heap.expect(env, NodeKind::Environment)?;
    heap.write(closure, FIRST, Word::Ref(env))
}

pub fn closure_arity(heap: &Heap, closure: NodeRef) -> Result<usize, HeapError> {
    heap.expect(closure, NodeKind::Closure)?;
    read_count(heap, closure, FIRST + 1)
}

pub fn closure_address(heap: &Heap, closure: NodeRef) -> Result<usize, HeapError> {
    heap.expect(closure, NodeKind::Closure)?;
    read_count(heap, closure, FIRST + 2)
}

pub fn closure_max_stack(heap: &Heap, closure: NodeRef) -> Result<usize, HeapError> {
    heap.expect(closure, NodeKind::Closure)?;
    read_count(heap, closure, FIRST + 3)
}

pub fn primitive_id(heap: &Heap, node: NodeRef) -> Result<usize, HeapError> {
    heap.expect(node, NodeKind::PrimitiveFunction)?;
    read_count(heap, node, FIRST)
}

// =========================================================================
// Frames
// =========================================================================

/// Saved environment of a call or block frame.
pub fn frame_env(heap: &Heap, frame: NodeRef) -> Result<NodeRef, HeapError> {
    expect_frame(heap, frame)?;
    read_ref(heap, frame, FIRST)
}

pub fn set_frame_env(heap: &mut Heap, frame: NodeRef, env: NodeRef) -> Result<(), HeapError> {
    expect_frame(heap, frame)?;
    heap.expect(env, NodeKind::Environment)?;
    heap.write(frame, FIRST, Word::Ref(env))
}

fn expect_frame(heap: &Heap, frame: NodeRef) -> Result<(), HeapError> {
    match heap.kind(frame)? {
        NodeKind::CallFrame | NodeKind::BlockFrame => Ok(()),
        found => Err(HeapError::KindMismatch {
            index: frame.index(),
            expected: NodeKind::CallFrame,
            found,
        }),
    }
}

pub fn frame_stack(heap: &Heap, frame: NodeRef) -> Result<NodeRef, HeapError> {
    heap.expect(frame, NodeKind::CallFrame)?;
    read_ref(heap, frame, FIRST + 1)
}

pub fn set_frame_stack(heap: &mut Heap, frame: NodeRef, os: NodeRef) -> Result<(), HeapError> {
    heap.expect(frame, NodeKind::CallFrame)?;
    heap.expect(os, NodeKind::OperandStack)?;
    heap.write(frame, FIRST + 1, Word::Ref(os))
}

pub fn frame_return_pc(heap: &Heap, frame: NodeRef) -> Result<usize, HeapError> {
    heap.expect(frame, NodeKind::CallFrame)?;
    read_count(heap, frame, FIRST + 2)
}

// =========================================================================
// Operand stacks
// =========================================================================

pub fn stack_capacity(heap: &Heap, os: NodeRef) -> Result<usize, HeapError> {
    heap.expect(os, NodeKind::OperandStack)?;
    heap.child_count(os)
}

pub fn stack_depth(heap: &Heap, os: NodeRef) -> Result<usize, HeapError> {
    let capacity = stack_capacity(heap, os)?;
    read_count(heap, os, FIRST + capacity)
}

pub fn stack_push(heap: &mut Heap, os: NodeRef, value: NodeRef) -> Result<(), HeapError> {
    let capacity = stack_capacity(heap, os)?;
    let top = read_count(heap, os, FIRST + capacity)?;
    if top == capacity {
        return Err(HeapError::OperandStackOverflow { capacity });
    }
    heap.write(os, FIRST + top, Word::Ref(value))?;
    heap.write(os, FIRST + capacity, Word::Count(top + 1))
}

pub fn stack_pop(heap: &mut Heap, os: NodeRef) -> Result<NodeRef, HeapError> {
    let capacity = stack_capacity(heap, os)?;
    let top = read_count(heap, os, FIRST + capacity)?;
    if top == 0 {
        return Err(HeapError::OperandStackUnderflow);
    }
    let value = read_ref(heap, os, FIRST + top - 1)?;
    heap.write(os, FIRST + top - 1, Word::Empty)?;
    heap.write(os, FIRST + capacity, Word::Count(top - 1))?;
    Ok(value)
}

/// Entry `depth` places below the top (0 is the top itself).
pub fn stack_peek(heap: &Heap, os: NodeRef, depth: usize) -> Result<NodeRef, HeapError> {
    let top = stack_depth(heap, os)?;
    if depth >= top {
        return Err(HeapError::OperandStackUnderflow);
    }
    read_ref(heap, os, FIRST + top - 1 - depth)
}

// =========================================================================
// Values
// =========================================================================

pub fn boxed_value(heap: &Heap, node: NodeRef) -> Result<Prim, HeapError> {
    heap.expect(node, NodeKind::Boxed)?;
    match heap.read(node, FIRST)? {
        Word::Prim(prim) => Ok(prim),
        found => Err(unexpected(node, FIRST, "primitive payload", found)),
    }
}

/// View any value node the way a primitive function receives it.
pub fn unbox(heap: &Heap, node: NodeRef) -> Result<Unboxed, HeapError> {
    match heap.kind(node)? {
        NodeKind::Boxed => Ok(Unboxed::Prim(boxed_value(heap, node)?)),
        NodeKind::Closure => Ok(Unboxed::Closure {
            node,
            arity: closure_arity(heap, node)?,
        }),
        NodeKind::PrimitiveFunction => Ok(Unboxed::Primitive(primitive_id(heap, node)?)),
        found => Err(HeapError::KindMismatch {
            index: node.index(),
            expected: NodeKind::Boxed,
            found,
        }),
    }
}
