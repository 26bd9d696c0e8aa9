/// Words of heap (both semispaces together) when nothing else is asked for.
pub const DEFAULT_HEAP_SIZE: usize = 1 << 16;

#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Total heap capacity in words, split evenly between the semispaces.
    pub heap_size: usize,
    /// Stop with an error after this many instructions.
    pub max_steps: Option<usize>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            heap_size: DEFAULT_HEAP_SIZE,
            max_steps: None,
        }
    }
}

impl MachineConfig {
    pub fn with_heap_size(heap_size: usize) -> Self {
        MachineConfig {
            heap_size,
            ..MachineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.heap_size, 65536);
        assert_eq!(config.max_steps, None);
    }

    #[test]
    fn test_with_heap_size_keeps_other_defaults() {
        let config = MachineConfig::with_heap_size(128);
        assert_eq!(config.heap_size, 128);
        assert_eq!(config.max_steps, None);
    }
}
