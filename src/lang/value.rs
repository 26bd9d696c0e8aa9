use serde::{Deserialize, Serialize};

/// Literal value in the source language.
///
/// These are the only values that can appear in a `Literal` node or a
/// `LoadConstant` instruction. At runtime they are always boxed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit floating-point number (the only numeric type).
    Number(f64),

    /// Boolean value.
    Bool(bool),

    /// UTF-8 string value.
    Str(String),

    /// The `undefined` value. Functions without an explicit return yield it.
    Undefined,

    /// The `null` value.
    Null,
}

impl std::fmt::Display for Value {
    /// Format a value the way the language prints it.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_integral_number_has_no_fraction() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_display_string_is_quoted() {
        assert_eq!(Value::Str("hi".to_string()).to_string(), "\"hi\"");
    }
}
