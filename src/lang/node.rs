use super::value::Value;
use serde::{Deserialize, Serialize};

/// Syntax tree node for the JavaScript sublanguage.
///
/// Trees are produced by an external parser and handed to the compiler,
/// either in memory or postcard-encoded (see [`super::codec`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    // ───────────────────────────── Expressions ──────────────────────────
    /// A literal: `1`, `true`, `"text"`, `undefined`, `null`.
    Literal(Value),

    /// A name occurrence: `x`.
    Name(String),

    /// Binary operator combination: `a + b`.
    ///
    /// Compiled as an application of the primitive registered under
    /// `operator`.
    Binary {
        operator: String,
        left: Box<Node>,
        right: Box<Node>,
    },

    /// Unary operator combination: `!a`, `-a`.
    ///
    /// Unary minus is looked up as `-unary` so it does not collide with
    /// binary subtraction.
    Unary { operator: String, operand: Box<Node> },

    /// Short-circuit logical combination: `a && b`, `a || b`.
    Logical {
        operator: String,
        left: Box<Node>,
        right: Box<Node>,
    },

    /// Conditional expression `p ? c : a` or statement `if (p) { c } else { a }`.
    Conditional {
        predicate: Box<Node>,
        consequent: Box<Node>,
        alternative: Box<Node>,
    },

    /// Anonymous function: `(x, y) => body`.
    Lambda {
        parameters: Vec<String>,
        body: Box<Node>,
    },

    /// Function application: `f(a, b)`.
    Application {
        function: Box<Node>,
        arguments: Vec<Node>,
    },

    // ───────────────────────────── Statements ───────────────────────────
    /// Statement sequence. Its value is the value of the last statement.
    Sequence(Vec<Node>),

    /// Braced block introducing a new scope.
    Block(Box<Node>),

    /// `const name = value;` or `let name = value;`
    Declaration {
        name: String,
        value: Box<Node>,
        constant: bool,
    },

    /// `name = value;` for a name declared with `let`.
    Assignment { name: String, value: Box<Node> },

    /// `function name(parameters) { body }`
    FunctionDeclaration {
        name: String,
        parameters: Vec<String>,
        body: Box<Node>,
    },

    /// `return expression;`
    Return(Box<Node>),
}

impl Node {
    /// Human-readable name of the node form, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Literal(v) => match v {
                Value::Number(_) => "number literal",
                Value::Bool(_) => "boolean literal",
                Value::Str(_) => "string literal",
                Value::Undefined => "undefined literal",
                Value::Null => "null literal",
            },
            Node::Name(_) => "name",
            Node::Binary { .. } => "binary operator combination",
            Node::Unary { .. } => "unary operator combination",
            Node::Logical { .. } => "logical combination",
            Node::Conditional { .. } => "conditional",
            Node::Lambda { .. } => "lambda",
            Node::Application { .. } => "application",
            Node::Sequence(_) => "sequence",
            Node::Block(_) => "block",
            Node::Declaration { constant: true, .. } => "const declaration",
            Node::Declaration { constant: false, .. } => "let declaration",
            Node::Assignment { .. } => "assignment",
            Node::FunctionDeclaration { .. } => "function declaration",
            Node::Return(_) => "return statement",
        }
    }
}
