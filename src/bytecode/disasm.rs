use crate::bytecode::{Op, Program};
use std::collections::{BTreeSet, HashMap};

/// Print disassembly of a compiled program
pub fn print_program(program: &Program) {
    println!("=== BYTECODE PROGRAM ===\n");
    println!("════════════════════════════════════════");
    println!(" {} instructions", program.len());
    println!(" {} function bodies", program.function_entries().len());
    println!(" main operand stack: {}", program.main_stack_size);
    println!("════════════════════════════════════════");
    print!("{}", disassemble_to_string(program));
    println!();
}

fn collect_jump_targets(ops: &[Op]) -> BTreeSet<usize> {
    ops.iter().filter_map(Op::jump_target).collect()
}

/// One instruction with its operands, as the disassembler and the
/// machine's trace log show it.
pub fn format_op(op: &Op) -> String {
    match op {
        Op::LoadConstant(v) => format!("{:<12}{}", op.name(), v),
        Op::LoadLexical { frame, slot } | Op::AssignLexical { frame, slot } => {
            format!("{:<12}({}, {})", op.name(), frame, slot)
        }
        Op::JumpOnFalse(target) | Op::Goto(target) => {
            format!("{:<12}→ {:04}", op.name(), target)
        }
        Op::EnterScope(count) => format!("{:<12}{}", op.name(), count),
        Op::LoadFunction {
            arity,
            address,
            max_stack,
        } => format!(
            "{:<12}arity={} → {:04} stack={}",
            op.name(),
            arity,
            address,
            max_stack
        ),
        Op::Call(n) | Op::TailCall(n) => format!("{:<12}{}", op.name(), n),
        Op::Pop | Op::ExitScope | Op::Return | Op::Done => op.name().to_string(),
    }
}

// =============================================================================
// String output (for testing/logging)
// =============================================================================

/// Return disassembly as a String. Jump targets get a `►` marker and a
/// rule above them; function bodies get a `fn` banner.
pub fn disassemble_to_string(program: &Program) -> String {
    let mut output = String::new();
    let jump_targets = collect_jump_targets(&program.ops);
    let entries: BTreeSet<usize> = program.function_entries().into_iter().collect();

    for (ip, op) in program.ops.iter().enumerate() {
        if entries.contains(&ip) {
            output.push_str(&format!("      ── fn @{:04} ──────────────────────────\n", ip));
        } else if jump_targets.contains(&ip) {
            output.push_str("      ┌──────────────────────────────────\n");
        }

        output.push_str(&format!("{:04} ", ip));

        if jump_targets.contains(&ip) {
            output.push_str("► ");
        } else {
            output.push_str("  ");
        }

        output.push_str(&format_op(op));
        output.push('\n');
    }

    output
}

// =============================================================================
// Statistics
// =============================================================================

/// Print bytecode statistics
pub fn print_stats(program: &Program) {
    println!("=== BYTECODE STATISTICS ===\n");

    let total_ops = program.len();
    println!("Instructions:     {}", total_ops);
    println!("Function bodies:  {}", program.function_entries().len());
    println!();

    let op_counts = count_ops(&program.ops);

    println!("Op frequency:");
    let mut counts: Vec<_> = op_counts.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    for (op, count) in counts.iter().take(10) {
        let pct = (**count as f64 / total_ops as f64) * 100.0;
        println!("  {:<14} {:>4} ({:>5.1}%)", op, count, pct);
    }
}

fn count_ops(ops: &[Op]) -> HashMap<&'static str, usize> {
    let mut counts = HashMap::new();
    for op in ops {
        *counts.entry(op.name()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::value::Value;

    fn sample() -> Program {
        Program::new(
            vec![
                Op::EnterScope(1),
                Op::LoadFunction {
                    arity: 1,
                    address: 3,
                    max_stack: 1,
                },
                Op::Goto(5),
                Op::LoadLexical { frame: 0, slot: 0 },
                Op::Return,
                Op::AssignLexical { frame: 0, slot: 0 },
                Op::ExitScope,
                Op::Done,
            ],
            1,
        )
    }

    #[test]
    fn test_format_op_operands() {
        assert_eq!(
            format_op(&Op::LoadConstant(Value::Number(4.0))),
            "LDC         4"
        );
        assert_eq!(
            format_op(&Op::LoadLexical { frame: 2, slot: 7 }),
            "LDL         (2, 7)"
        );
        assert_eq!(format_op(&Op::Goto(12)), "GOTO        → 0012");
        assert_eq!(format_op(&Op::Done), "DONE");
    }

    #[test]
    fn test_disassembly_marks_targets_and_entries() {
        let output = disassemble_to_string(&sample());

        assert!(output.contains("fn @0003"));
        assert!(output.contains("0005 ► ASSL"));
        assert!(output.contains("0002   GOTO        → 0005"));
        assert_eq!(output.lines().filter(|l| l.contains('┌')).count(), 1);
    }

    #[test]
    fn test_op_counts() {
        let counts = count_ops(&sample().ops);

        assert_eq!(counts.get("LDF"), Some(&1));
        assert_eq!(counts.get("RTN"), Some(&1));
        assert_eq!(counts.get("CALL"), None);
    }
}
