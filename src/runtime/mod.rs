//! # Machine
//!
//! Everything the machine touches at run time lives in one fixed-size
//! [`heap::Heap`]: environments, closures, frames, operand stacks and
//! boxed values. Node references are plain indices that the collector
//! ([`gc`]) rewrites when it moves a node, so they are only trustworthy
//! when reached through [`registers::Registers`].

pub mod config;
pub mod gc;
pub mod heap;
pub mod machine;
pub mod objects;
pub mod primitives;
pub mod registers;
pub mod runtime_error;
pub mod value;
