//! Shorthand constructors for syntax trees.
//!
//! The parser lives outside this crate, so demos and tests build their
//! trees with these helpers: `binary("+", num(1.0), name("x"))` reads
//! close enough to `1 + x`.

use super::node::Node;
use super::value::Value;

pub fn num(n: f64) -> Node {
    Node::Literal(Value::Number(n))
}

pub fn boolean(b: bool) -> Node {
    Node::Literal(Value::Bool(b))
}

pub fn string(s: &str) -> Node {
    Node::Literal(Value::Str(s.to_string()))
}

pub fn undefined() -> Node {
    Node::Literal(Value::Undefined)
}

pub fn name(n: &str) -> Node {
    Node::Name(n.to_string())
}

pub fn binary(operator: &str, left: Node, right: Node) -> Node {
    Node::Binary {
        operator: operator.to_string(),
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn unary(operator: &str, operand: Node) -> Node {
    Node::Unary {
        operator: operator.to_string(),
        operand: Box::new(operand),
    }
}

pub fn logical(operator: &str, left: Node, right: Node) -> Node {
    Node::Logical {
        operator: operator.to_string(),
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn cond(predicate: Node, consequent: Node, alternative: Node) -> Node {
    Node::Conditional {
        predicate: Box::new(predicate),
        consequent: Box::new(consequent),
        alternative: Box::new(alternative),
    }
}

pub fn lambda(parameters: &[&str], body: Node) -> Node {
    Node::Lambda {
        parameters: parameters.iter().map(|p| p.to_string()).collect(),
        body: Box::new(body),
    }
}

pub fn apply(function: Node, arguments: Vec<Node>) -> Node {
    Node::Application {
        function: Box::new(function),
        arguments,
    }
}

/// Application of a function referenced by name.
pub fn call(function: &str, arguments: Vec<Node>) -> Node {
    apply(name(function), arguments)
}

pub fn seq(statements: Vec<Node>) -> Node {
    Node::Sequence(statements)
}

pub fn block(statements: Vec<Node>) -> Node {
    Node::Block(Box::new(seq(statements)))
}

pub fn constant(n: &str, value: Node) -> Node {
    Node::Declaration {
        name: n.to_string(),
        value: Box::new(value),
        constant: true,
    }
}

pub fn variable(n: &str, value: Node) -> Node {
    Node::Declaration {
        name: n.to_string(),
        value: Box::new(value),
        constant: false,
    }
}

pub fn assign(n: &str, value: Node) -> Node {
    Node::Assignment {
        name: n.to_string(),
        value: Box::new(value),
    }
}

pub fn function(n: &str, parameters: &[&str], body: Vec<Node>) -> Node {
    Node::FunctionDeclaration {
        name: n.to_string(),
        parameters: parameters.iter().map(|p| p.to_string()).collect(),
        body: Box::new(seq(body)),
    }
}

pub fn ret(expression: Node) -> Node {
    Node::Return(Box::new(expression))
}
