use std::path::PathBuf;

use clap::Parser;

use crate::runtime::config::{DEFAULT_HEAP_SIZE, MachineConfig};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Postcard-encoded syntax tree to run (runs the built-in demos when omitted)
    pub file: Option<PathBuf>,

    /// Heap capacity in words, both semispaces together
    #[clap(long, default_value_t = DEFAULT_HEAP_SIZE)]
    pub heap_size: usize,

    /// Abort after this many instructions
    #[clap(long)]
    pub max_steps: Option<usize>,

    /// Print the disassembly and op statistics before running
    #[clap(long = "bc")]
    pub bytecode: bool,

    /// Run a single built-in demo by name
    #[clap(long, conflicts_with = "file")]
    pub demo: Option<String>,

    /// Write the syntax tree of a built-in demo to a file and exit
    #[clap(
        long,
        num_args = 2,
        value_names = ["NAME", "PATH"],
        conflicts_with_all = ["file", "demo"]
    )]
    pub emit_demo: Option<Vec<String>>,
}

impl Config {
    pub fn machine_config(&self) -> MachineConfig {
        MachineConfig {
            max_steps: self.max_steps,
            ..MachineConfig::with_heap_size(self.heap_size)
        }
    }
}

impl TryFrom<Vec<&str>> for Config {
    type Error = String;
    fn try_from(args: Vec<&str>) -> Result<Self, Self::Error> {
        Config::try_parse_from(args).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_from(vec!["cinder"]).unwrap();

        assert!(config.file.is_none());
        assert!(!config.bytecode);
        assert_eq!(config.machine_config().heap_size, DEFAULT_HEAP_SIZE);
        assert_eq!(config.machine_config().max_steps, None);
    }

    #[test]
    fn test_machine_flags() {
        let config =
            Config::try_from(vec!["cinder", "prog.bin", "--heap-size", "512", "--max-steps", "99", "--bc"])
                .unwrap();

        assert_eq!(config.file, Some(PathBuf::from("prog.bin")));
        assert!(config.bytecode);
        assert_eq!(config.machine_config().heap_size, 512);
        assert_eq!(config.machine_config().max_steps, Some(99));
    }

    #[test]
    fn test_emit_demo_takes_name_and_path() {
        let config = Config::try_from(vec!["cinder", "--emit-demo", "fact", "fact.bin"]).unwrap();
        assert_eq!(
            config.emit_demo,
            Some(vec!["fact".to_string(), "fact.bin".to_string()])
        );
    }

    #[test]
    fn test_demo_conflicts_with_file() {
        assert!(Config::try_from(vec!["cinder", "prog.bin", "--demo", "fact"]).is_err());
    }
}
