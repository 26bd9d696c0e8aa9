use crate::lang::node::Node;

/// Static upper bound on operand-stack slots a node needs while it runs,
/// counting the value it leaves behind.
///
/// The bound sizes each call's operand stack, so it must be sound for
/// every instruction the compiler emits for `node`; see the machine's
/// `OperandStackOverflow` error for what happens when it is not.
pub fn max_stack(node: &Node) -> usize {
    match node {
        Node::Literal(_) | Node::Name(_) | Node::Lambda { .. } => 1,

        // Declarations leave their value on the stack.
        Node::FunctionDeclaration { .. } => 1,
        Node::Declaration { value, .. } | Node::Assignment { value, .. } => max_stack(value),

        Node::Sequence(statements) => statements.iter().map(max_stack).max().unwrap_or(1),

        Node::Block(body) => max_stack(body),

        Node::Conditional {
            predicate,
            consequent,
            alternative,
        } => max_stack(predicate)
            .max(max_stack(consequent))
            .max(max_stack(alternative)),

        // `a && b` is `a ? b : false`, `a || b` is `a ? true : b`.
        Node::Logical { left, right, .. } => max_stack(left).max(max_stack(right)).max(1),

        Node::Application {
            function,
            arguments,
        } => application_depth(std::iter::once(function.as_ref()).chain(arguments.iter())),

        // The primitive occupies the callee slot.
        Node::Binary { left, right, .. } => {
            1.max(1 + max_stack(left)).max(2 + max_stack(right))
        }
        Node::Unary { operand, .. } => 1.max(1 + max_stack(operand)),

        Node::Return(expression) => max_stack(expression),
    }
}

/// Operand-stack capacity for a function body, including the implicit
/// trailing `return undefined`.
pub fn function_max_stack(body: &Node) -> usize {
    max_stack(body).max(1)
}

/// Each component is compiled on top of the ones already pushed, so the
/// k-th one (callee at k = 0) peaks at `k + max_stack(component)`.
fn application_depth<'a>(components: impl Iterator<Item = &'a Node>) -> usize {
    components
        .enumerate()
        .map(|(k, component)| k + max_stack(component))
        .max()
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::build::*;

    #[test]
    fn test_leaves_need_one_slot() {
        assert_eq!(max_stack(&num(1.0)), 1);
        assert_eq!(max_stack(&name("x")), 1);
        assert_eq!(max_stack(&lambda(&["x"], binary("+", name("x"), num(1.0)))), 1);
    }

    #[test]
    fn test_binary_counts_the_primitive() {
        // + 1 2  ->  callee, 1, 2
        assert_eq!(max_stack(&binary("+", num(1.0), num(2.0))), 3);
    }

    #[test]
    fn test_nested_right_operand_grows() {
        // 1 + (2 * 3): callee, 1, then the right operand needs 3 on top of 2
        let expr = binary("+", num(1.0), binary("*", num(2.0), num(3.0)));
        assert_eq!(max_stack(&expr), 5);
    }

    #[test]
    fn test_nested_left_operand_is_cheaper() {
        // (1 * 2) + 3: left needs 3 on top of the callee, right needs 1 on top of 2
        let expr = binary("+", binary("*", num(1.0), num(2.0)), num(3.0));
        assert_eq!(max_stack(&expr), 4);
    }

    #[test]
    fn test_application_prefixes() {
        // f(1, 2, 3) -> f 1 2 3
        assert_eq!(max_stack(&call("f", vec![num(1.0), num(2.0), num(3.0)])), 4);
        // f() -> f
        assert_eq!(max_stack(&call("f", vec![])), 1);
    }

    #[test]
    fn test_sequence_takes_max() {
        let s = seq(vec![
            num(1.0),
            binary("+", num(1.0), num(2.0)),
            name("x"),
        ]);
        assert_eq!(max_stack(&s), 3);
        assert_eq!(max_stack(&seq(vec![])), 1);
    }

    #[test]
    fn test_conditional_takes_max() {
        let c = cond(
            name("p"),
            call("f", vec![num(1.0), num(2.0)]),
            num(3.0),
        );
        assert_eq!(max_stack(&c), 3);
    }

    #[test]
    fn test_declaration_and_return_pass_through() {
        assert_eq!(max_stack(&constant("x", binary("-", num(1.0), num(2.0)))), 3);
        assert_eq!(max_stack(&ret(call("g", vec![num(1.0)]))), 2);
        assert_eq!(max_stack(&block(vec![constant("y", num(1.0)), name("y")])), 1);
    }

    #[test]
    fn test_function_body_has_room_for_return_value() {
        assert_eq!(function_max_stack(&seq(vec![])), 1);
        assert_eq!(function_max_stack(&ret(binary("*", name("n"), num(2.0)))), 3);
    }
}
