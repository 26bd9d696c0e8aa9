//! Wire format between the external parser and the compiler.
//!
//! Syntax trees travel as postcard-encoded [`Node`] values.

use super::node::Node;

#[derive(Debug)]
pub struct CodecError {
    pub message: String,
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "syntax tree codec error: {}", self.message)
    }
}

impl std::error::Error for CodecError {}

impl From<postcard::Error> for CodecError {
    fn from(e: postcard::Error) -> Self {
        CodecError {
            message: e.to_string(),
        }
    }
}

pub fn encode(tree: &Node) -> Result<Vec<u8>, CodecError> {
    Ok(postcard::to_allocvec(tree)?)
}

pub fn decode(bytes: &[u8]) -> Result<Node, CodecError> {
    Ok(postcard::from_bytes(bytes)?)
}
