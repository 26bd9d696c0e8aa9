mod bytecode;
mod cli;
mod demos;
mod lang;
mod runtime;

use std::{fs, path::Path};

use clap::Parser;

use crate::bytecode::compile::compile;
use crate::bytecode::disasm::{print_program, print_stats};
use crate::cli::Config;
use crate::demos::Demo;
use crate::lang::{codec, node::Node};
use crate::runtime::machine::Machine;
use crate::runtime::value::ResultValue;

fn main() {
    env_logger::init();
    let config = Config::parse();

    if let Some(args) = &config.emit_demo {
        if let [name, path] = args.as_slice() {
            emit_demo(name, Path::new(path));
        }
        return;
    }

    if let Some(path) = &config.file {
        let tree = read_tree(path);
        let result = run_tree(&tree, &config);
        println!("{}", result);
        return;
    }

    match &config.demo {
        Some(name) => match demos::find(name) {
            Some(demo) => run_demo(&demo, &config),
            None => {
                eprintln!("Unknown demo '{}'. Available demos:", name);
                for demo in demos::all() {
                    eprintln!("  {}", demo.name);
                }
                std::process::exit(1);
            }
        },
        None => {
            for demo in demos::all() {
                run_demo(&demo, &config);
            }
        }
    }
}

fn read_tree(path: &Path) -> Node {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    };

    match codec::decode(&bytes) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Failed to decode '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn emit_demo(name: &str, path: &Path) {
    let Some(demo) = demos::find(name) else {
        eprintln!("Unknown demo '{}'", name);
        std::process::exit(1);
    };

    let bytes = match codec::encode(&(demo.build)()) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to encode '{}': {}", name, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = fs::write(path, bytes) {
        eprintln!("Failed to write '{}': {}", path.display(), e);
        std::process::exit(1);
    }
}

fn run_demo(demo: &Demo, config: &Config) {
    println!("── {} ──", demo.name);
    println!("{}", demo.source);

    let result = run_tree(&(demo.build)(), config);
    let expected = ResultValue::Value(demo.expected.clone());
    if result == expected {
        println!("=> {}\n", result);
    } else {
        eprintln!("=> {} (expected {})", result, expected);
        std::process::exit(1);
    }
}

fn run_tree(tree: &Node, config: &Config) -> ResultValue {
    let program = match compile(tree) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if config.bytecode {
        print_program(&program);
        print_stats(&program);
        println!();
    }

    let outcome =
        Machine::boot(&program, config.machine_config()).and_then(|mut machine| {
            let result = machine.run();
            let stats = machine.stats();
            log::info!(
                "{} steps, peak control depth {}, {} collections ({} words copied)",
                stats.steps,
                stats.peak_control_depth,
                stats.heap.collections,
                stats.heap.words_copied
            );
            result
        });

    match outcome {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
