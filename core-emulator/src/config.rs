use crate::error::ConfigError;

/// Reference memory size, in cells.
pub const MEMORY_SIZE: usize = 1024 * 64 * 10;

/// Reference base address of the display command region.
pub const DISPLAY_BLOCK_START: usize = 0x2AD00;

pub const STACK_CAPACITY: usize = 1024;

/// Sizes of one machine's memory and stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    pub memory_size: usize,

    /// Everything from this address up to `memory_size` is the display command region.
    pub display_block_start: usize,

    /// Capacity of each of the working and return stacks.
    pub stack_capacity: usize,
}

impl MachineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display_block_start > self.memory_size {
            return Err(ConfigError::DisplayBlockOutOfRange {
                display_block_start: self.display_block_start,
                memory_size: self.memory_size,
            });
        }

        if self.stack_capacity == 0 {
            return Err(ConfigError::ZeroStackCapacity);
        }

        Ok(())
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: MEMORY_SIZE,
            display_block_start: DISPLAY_BLOCK_START,
            stack_capacity: STACK_CAPACITY,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::error::ConfigError;

    use super::MachineConfig;

    #[test]
    fn test_reference_layout() {
        let config = MachineConfig::default();
        assert_eq!(config.memory_size - config.display_block_start, 480_000);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_invalid() {
        let config = MachineConfig { display_block_start: 100, memory_size: 50, stack_capacity: 4 };
        assert!(matches!(config.validate(), Err(ConfigError::DisplayBlockOutOfRange { .. })));

        let config = MachineConfig { stack_capacity: 0, ..MachineConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroStackCapacity));
    }
}
