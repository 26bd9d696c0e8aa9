use crate::lang::value::Value;
use crate::runtime::heap::NodeRef;

/// Index into the host's string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrId(pub(crate) usize);

/// Payload of a boxed value node. Fixed size, so strings live out of band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prim {
    Number(f64),
    Bool(bool),
    Str(StrId),
    Undefined,
    Null,
}

impl Prim {
    pub fn type_name(&self) -> &'static str {
        match self {
            Prim::Number(_) => "number",
            Prim::Bool(_) => "boolean",
            Prim::Str(_) => "string",
            Prim::Undefined => "undefined",
            Prim::Null => "null",
        }
    }
}

/// An operand-stack entry after unboxing, as primitives see it.
///
/// Closure references are only good until the next allocation; a
/// primitive never allocates, so it may compare them freely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unboxed {
    Prim(Prim),
    Closure { node: NodeRef, arity: usize },
    Primitive(usize),
}

impl Unboxed {
    pub fn type_name(&self) -> &'static str {
        match self {
            Unboxed::Prim(p) => p.type_name(),
            Unboxed::Closure { .. } | Unboxed::Primitive(_) => "function",
        }
    }
}

/// The final value of a program, detached from the heap.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Value(Value),
    Function { arity: usize },
    Primitive { name: String },
}

impl std::fmt::Display for ResultValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultValue::Value(v) => write!(f, "{}", v),
            ResultValue::Function { arity } => write!(f, "<function/{}>", arity),
            ResultValue::Primitive { name } => write!(f, "<primitive {}>", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Prim::Number(1.0).type_name(), "number");
        assert_eq!(Unboxed::Prim(Prim::Bool(true)).type_name(), "boolean");
        let closure = Unboxed::Closure {
            node: NodeRef::at(0),
            arity: 2,
        };
        assert_eq!(closure.type_name(), "function");
        assert_eq!(Unboxed::Primitive(0).type_name(), "function");
    }

    #[test]
    fn test_result_display() {
        assert_eq!(ResultValue::Value(Value::Number(3.0)).to_string(), "3");
        assert_eq!(ResultValue::Function { arity: 1 }.to_string(), "<function/1>");
        assert_eq!(
            ResultValue::Primitive {
                name: "+".to_string()
            }
            .to_string(),
            "<primitive +>"
        );
    }
}
