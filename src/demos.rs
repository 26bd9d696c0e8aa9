//! Built-in programs run when no input file is given.

use crate::lang::build::*;
use crate::lang::node::Node;
use crate::lang::value::Value;

pub struct Demo {
    pub name: &'static str,
    /// Source the tree stands for.
    pub source: &'static str,
    pub build: fn() -> Node,
    pub expected: Value,
}

pub fn all() -> Vec<Demo> {
    vec![
        Demo {
            name: "arithmetic",
            source: "1 + 2 * 3 - 4;",
            build: arithmetic,
            expected: Value::Number(3.0),
        },
        Demo {
            name: "block",
            source: "const y = 4; { const x = y + 7; x * 2; }",
            build: block_scope,
            expected: Value::Number(22.0),
        },
        Demo {
            name: "fact",
            source: "function fact(n) { return n === 1 ? 1 : n * fact(n - 1); } fact(4);",
            build: fact_recursive,
            expected: Value::Number(24.0),
        },
        Demo {
            name: "fact_iter",
            source: "function fact(n) { return fact_iter(n, 1, 1); } \
                     function fact_iter(n, i, acc) { return i > n ? acc : fact_iter(n, i + 1, acc * i); } \
                     fact(5);",
            build: fact_iterative,
            expected: Value::Number(120.0),
        },
        Demo {
            name: "return_in_block",
            source: "function f(x) { if (true) { const y = 2; return x + y; 44; } else { 55; } 66; } f(1);",
            build: return_in_block,
            expected: Value::Number(3.0),
        },
        Demo {
            name: "closures",
            source: "function make_adder(n) { return x => x + n; } \
                     const add5 = make_adder(5); add5(10);",
            build: closures,
            expected: Value::Number(15.0),
        },
        Demo {
            name: "countdown",
            source: "function count(n, s) { return n === 0 ? s : count(n - 1, s + 1); } count(10000, 0);",
            build: countdown,
            expected: Value::Number(10000.0),
        },
    ]
}

pub fn find(name: &str) -> Option<Demo> {
    all().into_iter().find(|demo| demo.name == name)
}

fn arithmetic() -> Node {
    binary(
        "-",
        binary("+", num(1.0), binary("*", num(2.0), num(3.0))),
        num(4.0),
    )
}

fn block_scope() -> Node {
    seq(vec![
        constant("y", num(4.0)),
        block(vec![
            constant("x", binary("+", name("y"), num(7.0))),
            binary("*", name("x"), num(2.0)),
        ]),
    ])
}

fn fact_recursive() -> Node {
    seq(vec![
        function(
            "fact",
            &["n"],
            vec![ret(cond(
                binary("===", name("n"), num(1.0)),
                num(1.0),
                binary(
                    "*",
                    name("n"),
                    call("fact", vec![binary("-", name("n"), num(1.0))]),
                ),
            ))],
        ),
        call("fact", vec![num(4.0)]),
    ])
}

fn fact_iterative() -> Node {
    seq(vec![
        function(
            "fact",
            &["n"],
            vec![ret(call("fact_iter", vec![name("n"), num(1.0), num(1.0)]))],
        ),
        function(
            "fact_iter",
            &["n", "i", "acc"],
            vec![ret(cond(
                binary(">", name("i"), name("n")),
                name("acc"),
                call(
                    "fact_iter",
                    vec![
                        name("n"),
                        binary("+", name("i"), num(1.0)),
                        binary("*", name("acc"), name("i")),
                    ],
                ),
            ))],
        ),
        call("fact", vec![num(5.0)]),
    ])
}

fn return_in_block() -> Node {
    seq(vec![
        function(
            "f",
            &["x"],
            vec![
                cond(
                    boolean(true),
                    block(vec![
                        constant("y", num(2.0)),
                        ret(binary("+", name("x"), name("y"))),
                        num(44.0),
                    ]),
                    block(vec![num(55.0)]),
                ),
                num(66.0),
            ],
        ),
        call("f", vec![num(1.0)]),
    ])
}

fn closures() -> Node {
    seq(vec![
        function(
            "make_adder",
            &["n"],
            vec![ret(lambda(&["x"], ret(binary("+", name("x"), name("n")))))],
        ),
        constant("add5", call("make_adder", vec![num(5.0)])),
        call("add5", vec![num(10.0)]),
    ])
}

fn countdown() -> Node {
    seq(vec![
        function(
            "count",
            &["n", "s"],
            vec![ret(cond(
                binary("===", name("n"), num(0.0)),
                name("s"),
                call(
                    "count",
                    vec![
                        binary("-", name("n"), num(1.0)),
                        binary("+", name("s"), num(1.0)),
                    ],
                ),
            ))],
        ),
        call("count", vec![num(10000.0), num(0.0)]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::compile;
    use crate::runtime::{config::MachineConfig, machine::execute, value::ResultValue};

    #[test]
    fn test_every_demo_produces_its_expected_value() {
        for demo in all() {
            let program = compile(&(demo.build)())
                .unwrap_or_else(|e| panic!("{}: {}", demo.name, e));
            let result = execute(&program, MachineConfig::default())
                .unwrap_or_else(|e| panic!("{}: {}", demo.name, e));
            assert_eq!(result, ResultValue::Value(demo.expected.clone()), "{}", demo.name);
        }
    }

    #[test]
    fn test_demo_names_are_unique() {
        let mut names: Vec<_> = all().iter().map(|demo| demo.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all().len());
    }

    #[test]
    fn test_find() {
        assert!(find("fact").is_some());
        assert!(find("nope").is_none());
    }
}
