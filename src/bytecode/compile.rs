use std::collections::HashSet;

use crate::{
    bytecode::{
        Op, Program,
        compile_env::{Binding, CompileEnv},
        compile_error::CompileError,
        stack_depth::{function_max_stack, max_stack},
    },
    lang::{node::Node, value::Value},
    runtime::primitives,
};

/// Placeholder address for a jump whose target is not emitted yet.
const UNPATCHED: usize = usize::MAX;

/// Compile a whole program against the standard primitive table.
pub fn compile(tree: &Node) -> Result<Program, CompileError> {
    Compiler::new().compile_program(tree)
}

/// Single-pass compiler from syntax tree to a flat instruction array.
///
/// Names are resolved statically to `(frame, slot)` addresses against a
/// [`CompileEnv`] that grows exactly where the machine's environment
/// grows: on `EnterScope` and on calls.
pub struct Compiler {
    /// Output instruction array
    ops: Vec<Op>,

    /// Scope holding the primitives, outermost at runtime as well
    globals: CompileEnv,

    /// Number of lambdas enclosing the node being compiled
    function_depth: usize,
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_globals(primitives::global_compile_env())
    }

    pub fn with_globals(globals: CompileEnv) -> Self {
        Self {
            ops: Vec::new(),
            globals,
            function_depth: 0,
        }
    }

    /// Compile `tree` as the program body: an implicit block under the
    /// global scope, terminated by `Done`.
    pub fn compile_program(mut self, tree: &Node) -> Result<Program, CompileError> {
        let globals = self.globals.clone();
        self.compile_scope(tree, &globals)?;
        self.emit(Op::Done);

        let program = Program::new(self.ops, max_stack(tree));
        log::debug!(
            "compiled {} instructions, {} function bodies, main stack {}",
            program.len(),
            program.function_entries().len(),
            program.main_stack_size
        );

        Ok(program)
    }

    fn emit(&mut self, op: Op) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    fn next_address(&self) -> usize {
        self.ops.len()
    }

    /// Point the jump emitted at `at` to the next instruction to be emitted.
    fn patch_jump(&mut self, at: usize) -> Result<(), CompileError> {
        let here = self.next_address();
        match &mut self.ops[at] {
            Op::JumpOnFalse(target) | Op::Goto(target) if *target == UNPATCHED => {
                *target = here;
                Ok(())
            }
            other => Err(CompileError::internal(format!(
                "cannot patch {:?} at {}",
                other, at
            ))),
        }
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    /// Compile `body` in a fresh scope holding its declared names.
    fn compile_scope(&mut self, body: &Node, env: &CompileEnv) -> Result<(), CompileError> {
        let bindings = scan_declarations(body)?;

        self.emit(Op::EnterScope(bindings.len()));
        let inner = env.extend(bindings);
        self.compile_body(body, &inner)?;
        self.emit(Op::ExitScope);

        Ok(())
    }

    /// Compile the statements of a scope body, where declarations are
    /// allowed because `scan_declarations` has already given them slots.
    fn compile_body(&mut self, body: &Node, env: &CompileEnv) -> Result<(), CompileError> {
        match body {
            Node::Sequence(statements) => self.compile_sequence(statements, env, true),

            Node::Declaration { name, value, .. } => self.compile_declaration(name, value, env),

            Node::FunctionDeclaration {
                name,
                parameters,
                body,
            } => {
                self.compile_lambda(parameters, body, env)?;
                self.emit_declared(name, env)
            }

            other => self.compile_node(other, env),
        }
    }

    fn compile_sequence(
        &mut self,
        statements: &[Node],
        env: &CompileEnv,
        in_scope_body: bool,
    ) -> Result<(), CompileError> {
        if statements.is_empty() {
            self.emit(Op::LoadConstant(Value::Undefined));
            return Ok(());
        }

        for (i, statement) in statements.iter().enumerate() {
            if i > 0 {
                self.emit(Op::Pop);
            }
            if in_scope_body {
                self.compile_body(statement, env)?;
            } else {
                self.compile_node(statement, env)?;
            }
        }

        Ok(())
    }

    fn compile_declaration(
        &mut self,
        name: &str,
        value: &Node,
        env: &CompileEnv,
    ) -> Result<(), CompileError> {
        self.compile_node(value, env)?;
        self.emit_declared(name, env)
    }

    /// Emit the store for a pre-scanned declaration of the innermost scope.
    fn emit_declared(&mut self, name: &str, env: &CompileEnv) -> Result<(), CompileError> {
        match env.resolve(name) {
            Some(address) if address.frame == 0 => {
                self.emit(Op::AssignLexical {
                    frame: address.frame,
                    slot: address.slot,
                });
                Ok(())
            }
            _ => Err(CompileError::internal(format!(
                "declaration of '{}' was not pre-scanned",
                name
            ))),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn compile_node(&mut self, node: &Node, env: &CompileEnv) -> Result<(), CompileError> {
        match node {
            Node::Literal(value) => {
                self.emit(Op::LoadConstant(value.clone()));
            }

            Node::Name(name) => self.emit_load_name(name, env)?,

            Node::Binary {
                operator,
                left,
                right,
            } => {
                self.emit_load_name(operator, env)?;
                self.compile_node(left, env)?;
                self.compile_node(right, env)?;
                self.emit(Op::Call(2));
            }

            Node::Unary { operator, operand } => {
                let primitive = match operator.as_str() {
                    "-" => "-unary",
                    other => other,
                };
                self.emit_load_name(primitive, env)?;
                self.compile_node(operand, env)?;
                self.emit(Op::Call(1));
            }

            Node::Logical {
                operator,
                left,
                right,
            } => match operator.as_str() {
                "&&" => self.compile_conditional(
                    left,
                    right,
                    &Node::Literal(Value::Bool(false)),
                    env,
                )?,
                "||" => self.compile_conditional(
                    left,
                    &Node::Literal(Value::Bool(true)),
                    right,
                    env,
                )?,
                _ => {
                    return Err(CompileError::unhandled_with_hint(
                        node,
                        format!("unknown logical operator '{}'", operator),
                    ));
                }
            },

            Node::Conditional {
                predicate,
                consequent,
                alternative,
            } => self.compile_conditional(predicate, consequent, alternative, env)?,

            Node::Lambda { parameters, body } => self.compile_lambda(parameters, body, env)?,

            Node::Application {
                function,
                arguments,
            } => {
                self.compile_operands(function, arguments, env)?;
                self.emit(Op::Call(arguments.len()));
            }

            Node::Sequence(statements) => self.compile_sequence(statements, env, false)?,

            Node::Block(body) => self.compile_scope(body, env)?,

            Node::Assignment { name, value } => {
                let (address, binding) = env
                    .lookup(name)
                    .ok_or_else(|| CompileError::unresolved(name))?;
                if binding.constant {
                    return Err(CompileError::assign_to_constant(name));
                }
                self.compile_node(value, env)?;
                self.emit(Op::AssignLexical {
                    frame: address.frame,
                    slot: address.slot,
                });
            }

            Node::Return(expression) => {
                if self.function_depth == 0 {
                    return Err(CompileError::return_outside_function());
                }
                self.compile_return(expression, env)?;
            }

            Node::Declaration { name, .. } | Node::FunctionDeclaration { name, .. } => {
                return Err(CompileError::InvalidPosition {
                    node_type: node.type_name().to_string(),
                    name: Some(name.clone()),
                    reason: "declarations must appear directly in a block, function body or program"
                        .to_string(),
                    hint: Some("wrap the declaration in braces".to_string()),
                });
            }
        }

        Ok(())
    }

    fn emit_load_name(&mut self, name: &str, env: &CompileEnv) -> Result<(), CompileError> {
        let address = env
            .resolve(name)
            .ok_or_else(|| CompileError::unresolved(name))?;
        self.emit(Op::LoadLexical {
            frame: address.frame,
            slot: address.slot,
        });
        Ok(())
    }

    fn compile_operands(
        &mut self,
        function: &Node,
        arguments: &[Node],
        env: &CompileEnv,
    ) -> Result<(), CompileError> {
        self.compile_node(function, env)?;
        for argument in arguments {
            self.compile_node(argument, env)?;
        }
        Ok(())
    }

    /// Emits:
    /// ```text
    ///   <predicate>
    ///   JOF  else
    ///   <consequent>
    ///   GOTO end
    /// else:
    ///   <alternative>
    /// end:
    /// ```
    fn compile_conditional(
        &mut self,
        predicate: &Node,
        consequent: &Node,
        alternative: &Node,
        env: &CompileEnv,
    ) -> Result<(), CompileError> {
        self.compile_node(predicate, env)?;
        let jump_on_false = self.emit(Op::JumpOnFalse(UNPATCHED));
        self.compile_node(consequent, env)?;
        let goto_end = self.emit(Op::Goto(UNPATCHED));
        self.patch_jump(jump_on_false)?;
        self.compile_node(alternative, env)?;
        self.patch_jump(goto_end)
    }

    /// Emits:
    /// ```text
    ///   LDF  arity, body, max_stack
    ///   GOTO after
    /// body:
    ///   <body>
    ///   POP
    ///   LDC  undefined
    ///   RTN
    /// after:
    /// ```
    fn compile_lambda(
        &mut self,
        parameters: &[String],
        body: &Node,
        env: &CompileEnv,
    ) -> Result<(), CompileError> {
        let mut seen = HashSet::new();
        for parameter in parameters {
            if !seen.insert(parameter.as_str()) {
                return Err(CompileError::duplicate(parameter));
            }
        }

        let load = self.emit(Op::LoadFunction {
            arity: parameters.len(),
            address: UNPATCHED,
            max_stack: function_max_stack(body),
        });
        let skip_body = self.emit(Op::Goto(UNPATCHED));

        let entry = self.next_address();
        if let Op::LoadFunction { address, .. } = &mut self.ops[load] {
            *address = entry;
        }

        let inner = env.extend(parameters.iter().map(Binding::variable).collect());
        self.function_depth += 1;
        let compiled = if scan_declarations(body)?.is_empty() {
            self.compile_body(body, &inner)
        } else {
            self.compile_scope(body, &inner)
        };
        self.function_depth -= 1;
        compiled?;

        self.emit(Op::Pop);
        self.emit(Op::LoadConstant(Value::Undefined));
        self.emit(Op::Return);

        self.patch_jump(skip_body)
    }

    /// `return` with the expression in tail position: applications become
    /// `TailCall`, conditionals return from each branch.
    fn compile_return(&mut self, expression: &Node, env: &CompileEnv) -> Result<(), CompileError> {
        match expression {
            Node::Application {
                function,
                arguments,
            } => {
                self.compile_operands(function, arguments, env)?;
                self.emit(Op::TailCall(arguments.len()));
            }

            Node::Conditional {
                predicate,
                consequent,
                alternative,
            } => {
                self.compile_node(predicate, env)?;
                let jump_on_false = self.emit(Op::JumpOnFalse(UNPATCHED));
                self.compile_return(consequent, env)?;
                self.patch_jump(jump_on_false)?;
                self.compile_return(alternative, env)?;
            }

            other => {
                self.compile_node(other, env)?;
                self.emit(Op::Return);
            }
        }

        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Names declared directly in a scope body, in slot order.
///
/// Looks through nested sequences but not into blocks, conditionals or
/// lambdas, which get scopes of their own.
pub fn scan_declarations(body: &Node) -> Result<Vec<Binding>, CompileError> {
    let mut bindings = Vec::new();
    collect_declarations(body, &mut bindings)?;
    Ok(bindings)
}

fn collect_declarations(node: &Node, bindings: &mut Vec<Binding>) -> Result<(), CompileError> {
    let binding = match node {
        Node::Sequence(statements) => {
            for statement in statements {
                collect_declarations(statement, bindings)?;
            }
            return Ok(());
        }
        Node::Declaration { name, constant, .. } => Binding {
            name: name.clone(),
            constant: *constant,
        },
        Node::FunctionDeclaration { name, .. } => Binding::constant(name.clone()),
        _ => return Ok(()),
    };

    if bindings.iter().any(|b| b.name == binding.name) {
        return Err(CompileError::duplicate(&binding.name));
    }
    bindings.push(binding);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::build::*;
    use pretty_assertions::assert_eq;

    fn globals(names: &[&str]) -> CompileEnv {
        CompileEnv::empty().extend(names.iter().map(|n| Binding::constant(*n)).collect())
    }

    fn compile_with(names: &[&str], tree: &Node) -> Result<Program, CompileError> {
        Compiler::with_globals(globals(names)).compile_program(tree)
    }

    #[test]
    fn test_literal_program() {
        let program = compile_with(&[], &num(7.0)).unwrap();

        assert_eq!(
            program.ops,
            vec![
                Op::EnterScope(0),
                Op::LoadConstant(Value::Number(7.0)),
                Op::ExitScope,
                Op::Done,
            ]
        );
        assert_eq!(program.main_stack_size, 1);
    }

    #[test]
    fn test_binary_loads_primitive_then_operands() {
        let program = compile_with(&["+"], &binary("+", num(1.0), num(2.0))).unwrap();

        assert_eq!(
            &program.ops[1..5],
            [
                Op::LoadLexical { frame: 1, slot: 0 },
                Op::LoadConstant(Value::Number(1.0)),
                Op::LoadConstant(Value::Number(2.0)),
                Op::Call(2),
            ]
        );
        assert_eq!(program.main_stack_size, 3);
    }

    #[test]
    fn test_declarations_get_slots_in_order() {
        let tree = seq(vec![
            constant("a", num(1.0)),
            constant("b", num(2.0)),
            name("a"),
        ]);
        let program = compile_with(&[], &tree).unwrap();

        assert_eq!(
            program.ops,
            vec![
                Op::EnterScope(2),
                Op::LoadConstant(Value::Number(1.0)),
                Op::AssignLexical { frame: 0, slot: 0 },
                Op::Pop,
                Op::LoadConstant(Value::Number(2.0)),
                Op::AssignLexical { frame: 0, slot: 1 },
                Op::Pop,
                Op::LoadLexical { frame: 0, slot: 0 },
                Op::ExitScope,
                Op::Done,
            ]
        );
    }

    #[test]
    fn test_shadowing_resolves_to_inner_then_outer() {
        // const x = 1; { const x = 2; x; } x;
        let tree = seq(vec![
            constant("x", num(1.0)),
            block(vec![constant("x", num(2.0)), name("x")]),
            name("x"),
        ]);
        let program = compile_with(&[], &tree).unwrap();

        let loads: Vec<_> = program
            .ops
            .iter()
            .filter(|op| matches!(op, Op::LoadLexical { .. }))
            .collect();
        assert_eq!(
            loads,
            vec![
                &Op::LoadLexical { frame: 0, slot: 0 },
                &Op::LoadLexical { frame: 0, slot: 0 },
            ]
        );
        assert_eq!(
            program.ops.iter().filter(|op| matches!(op, Op::EnterScope(1))).count(),
            2
        );
    }

    #[test]
    fn test_conditional_backpatching() {
        let program = compile_with(&[], &cond(boolean(true), num(1.0), num(2.0))).unwrap();

        // 0 ENTER, 1 LDC true, 2 JOF, 3 LDC 1, 4 GOTO, 5 LDC 2, 6 EXIT
        assert_eq!(program.ops[2], Op::JumpOnFalse(5));
        assert_eq!(program.ops[4], Op::Goto(6));
    }

    #[test]
    fn test_lambda_layout() {
        let program = compile_with(&["*"], &lambda(&["x"], binary("*", name("x"), name("x")))).unwrap();

        // 0 ENTER, 1 LDF, 2 GOTO, 3.. body
        assert_eq!(
            program.ops[1],
            Op::LoadFunction {
                arity: 1,
                address: 3,
                max_stack: 3
            }
        );
        let after = match program.ops[2] {
            Op::Goto(after) => after,
            ref other => panic!("expected GOTO, got {:?}", other),
        };
        assert_eq!(program.ops[after], Op::ExitScope);
        assert_eq!(
            &program.ops[after - 3..after],
            [Op::Pop, Op::LoadConstant(Value::Undefined), Op::Return]
        );
        // parameter x is frame 0 inside the body, the primitive is two scopes out
        assert_eq!(program.ops[3], Op::LoadLexical { frame: 2, slot: 0 });
        assert_eq!(program.ops[4], Op::LoadLexical { frame: 0, slot: 0 });
    }

    #[test]
    fn test_function_body_with_locals_gets_its_own_scope() {
        let tree = function("f", &["x"], vec![constant("y", name("x")), ret(name("y"))]);
        let program = compile_with(&[], &tree).unwrap();

        assert_eq!(program.ops[3], Op::EnterScope(1));
        assert!(program.ops.contains(&Op::LoadLexical { frame: 1, slot: 0 }));
    }

    #[test]
    fn test_return_of_application_is_tail_call() {
        let tree = function("f", &["n"], vec![ret(call("f", vec![name("n")]))]);
        let program = compile_with(&[], &tree).unwrap();

        assert!(program.ops.contains(&Op::TailCall(1)));
        assert!(!program.ops.contains(&Op::Call(1)));
    }

    #[test]
    fn test_return_of_conditional_returns_from_both_branches() {
        let tree = function(
            "f",
            &["p"],
            vec![ret(cond(name("p"), num(1.0), call("f", vec![boolean(true)])))],
        );
        let program = compile_with(&[], &tree).unwrap();

        let body: Vec<_> = program.ops[3..].to_vec();
        assert_eq!(body[0], Op::LoadLexical { frame: 0, slot: 0 });
        assert_eq!(body[1], Op::JumpOnFalse(7));
        assert_eq!(body[2], Op::LoadConstant(Value::Number(1.0)));
        assert_eq!(body[3], Op::Return);
        assert_eq!(body[6], Op::TailCall(1));
    }

    #[test]
    fn test_logical_and_desugars_to_conditional() {
        let program = compile_with(&[], &logical("&&", boolean(true), boolean(false))).unwrap();

        assert_eq!(
            &program.ops[1..6],
            [
                Op::LoadConstant(Value::Bool(true)),
                Op::JumpOnFalse(5),
                Op::LoadConstant(Value::Bool(false)),
                Op::Goto(6),
                Op::LoadConstant(Value::Bool(false)),
            ]
        );
    }

    #[test]
    fn test_empty_sequence_is_undefined() {
        let program = compile_with(&[], &seq(vec![])).unwrap();
        assert_eq!(program.ops[1], Op::LoadConstant(Value::Undefined));
    }

    #[test]
    fn test_done_is_last() {
        let program = compile(&seq(vec![function("f", &[], vec![]), call("f", vec![])])).unwrap();
        assert_eq!(program.ops.last(), Some(&Op::Done));
    }

    #[test]
    fn test_unary_minus_uses_dedicated_primitive() {
        let program = compile_with(&["-unary"], &unary("-", num(1.0))).unwrap();
        assert_eq!(program.ops[1], Op::LoadLexical { frame: 1, slot: 0 });
        assert_eq!(program.ops[3], Op::Call(1));
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_unresolved_name() {
        let err = compile_with(&[], &name("ghost")).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedName { ref name } if name == "ghost"));
    }

    #[test]
    fn test_unknown_operator_is_unresolved() {
        let err = compile_with(&[], &binary("**", num(1.0), num(2.0))).unwrap_err();
        assert!(err.to_string().contains("'**'"));
    }

    #[test]
    fn test_name_declared_in_sibling_block_is_not_visible() {
        let tree = seq(vec![block(vec![constant("x", num(1.0))]), name("x")]);
        assert!(matches!(
            compile_with(&[], &tree),
            Err(CompileError::UnresolvedName { .. })
        ));
    }

    #[test]
    fn test_return_at_top_level() {
        let err = compile_with(&[], &ret(num(1.0))).unwrap_err();
        assert!(matches!(err, CompileError::InvalidPosition { .. }));
    }

    #[test]
    fn test_duplicate_declaration() {
        let tree = seq(vec![constant("x", num(1.0)), variable("x", num(2.0))]);
        assert!(matches!(
            compile_with(&[], &tree),
            Err(CompileError::DuplicateDeclaration { .. })
        ));
    }

    #[test]
    fn test_duplicate_parameter() {
        assert!(matches!(
            compile_with(&[], &lambda(&["a", "a"], num(1.0))),
            Err(CompileError::DuplicateDeclaration { .. })
        ));
    }

    #[test]
    fn test_assignment_to_constant() {
        let tree = seq(vec![constant("x", num(1.0)), assign("x", num(2.0))]);
        assert!(matches!(
            compile_with(&[], &tree),
            Err(CompileError::ConstantAssignment { .. })
        ));
    }

    #[test]
    fn test_assignment_to_let_resolves_through_chain() {
        let tree = seq(vec![
            variable("x", num(1.0)),
            block(vec![assign("x", num(2.0))]),
        ]);
        let program = compile_with(&[], &tree).unwrap();
        assert!(program.ops.contains(&Op::AssignLexical { frame: 1, slot: 0 }));
    }

    #[test]
    fn test_declaration_in_expression_position() {
        let tree = cond(boolean(true), constant("x", num(1.0)), num(2.0));
        assert!(matches!(
            compile_with(&[], &tree),
            Err(CompileError::InvalidPosition { .. })
        ));
    }

    #[test]
    fn test_unknown_logical_operator() {
        let err = compile_with(&[], &logical("??", num(1.0), num(2.0))).unwrap_err();
        assert!(matches!(err, CompileError::UnhandledNode { .. }));
    }
}
