//! # Syntax tree
//!
//! The data model the external parser produces and the bytecode compiler
//! consumes. Only the forms listed in [`node::Node`] exist; anything the
//! parser cannot express in them is outside the language.

#[allow(dead_code)]
pub mod build;
pub mod codec;
pub mod node;
pub mod value;
