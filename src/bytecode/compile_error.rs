use crate::lang::node::Node;

#[derive(Debug, Clone)]
pub enum CompileError {
    /// A name that no enclosing scope declares
    UnresolvedName { name: String },
    /// A node form that the compiler doesn't know how to handle
    UnhandledNode {
        node_type: String,
        hint: Option<String>,
    },
    /// A node that's valid but appeared in an invalid position
    InvalidPosition {
        node_type: String,
        name: Option<String>,
        reason: String,
        hint: Option<String>,
    },
    /// The same name declared twice in one scope
    DuplicateDeclaration { name: String },
    /// Assignment to a name declared with `const`
    ConstantAssignment { name: String },
    /// Internal compiler error (shouldn't happen in normal use)
    Internal(String),
}

impl CompileError {
    pub fn unresolved(name: &str) -> Self {
        CompileError::UnresolvedName {
            name: name.to_string(),
        }
    }

    /// Create an error for an unhandled node with custom hint
    pub fn unhandled_with_hint(node: &Node, hint: impl Into<String>) -> Self {
        CompileError::UnhandledNode {
            node_type: node.type_name().to_string(),
            hint: Some(hint.into()),
        }
    }

    /// Create an error for a return statement outside any function body
    pub fn return_outside_function() -> Self {
        CompileError::InvalidPosition {
            node_type: "return".to_string(),
            name: None,
            reason: "return statements cannot appear outside a function body".to_string(),
            hint: Some("wrap the code in a function, or drop the return".to_string()),
        }
    }

    pub fn duplicate(name: &str) -> Self {
        CompileError::DuplicateDeclaration {
            name: name.to_string(),
        }
    }

    pub fn assign_to_constant(name: &str) -> Self {
        CompileError::ConstantAssignment {
            name: name.to_string(),
        }
    }

    /// Create an internal compiler error
    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::UnresolvedName { name } => {
                write!(f, "compile error: unresolved name '{}'", name)
            }
            CompileError::UnhandledNode { node_type, hint } => {
                write!(f, "compile error: cannot compile '{}' node", node_type)?;
                if let Some(h) = hint {
                    write!(f, "\n  hint: {}", h)?;
                }
                Ok(())
            }
            CompileError::InvalidPosition {
                node_type,
                name,
                reason,
                hint,
            } => {
                write!(f, "compile error: ")?;
                match name {
                    Some(n) => write!(f, "{} '{}': {}", node_type, n, reason)?,
                    None => write!(f, "{}: {}", node_type, reason)?,
                }
                if let Some(h) = hint {
                    write!(f, "\n  hint: {}", h)?;
                }
                Ok(())
            }
            CompileError::DuplicateDeclaration { name } => {
                write!(f, "compile error: '{}' is declared twice in the same scope", name)
            }
            CompileError::ConstantAssignment { name } => {
                write!(f, "compile error: cannot assign to constant '{}'", name)
            }
            CompileError::Internal(msg) => {
                write!(f, "compile error: internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CompileError {}
