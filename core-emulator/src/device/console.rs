use std::io::{self, Write};

use crate::common::Cell;

/// `DVO` on this port prints to standard error.
pub const CONSOLE_ERROR_PORT: u8 = 24;

/// `DVO` on this port prints to standard output.
pub const CONSOLE_OUTPUT_PORT: u8 = 25;

pub fn is_console_port(port: u8) -> bool {
    port == CONSOLE_ERROR_PORT || port == CONSOLE_OUTPUT_PORT
}

/// The console device. Unlike other devices it isn't triggered by a bus scan; `DVO` writes
/// through it immediately.
pub struct Console {
    output: Box<dyn Write>,
    error: Box<dyn Write>,
}

impl Console {
    pub fn new() -> Self {
        Self::with_writers(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn with_writers(output: Box<dyn Write>, error: Box<dyn Write>) -> Self {
        Self { output, error }
    }

    /// Prints `value` as a decimal line if `port` is a console port. Other ports are ignored.
    pub fn write(&mut self, port: u8, value: Cell) {
        let sink = match port {
            CONSOLE_ERROR_PORT => &mut self.error,
            CONSOLE_OUTPUT_PORT => &mut self.output,
            _ => {
                log::debug!("DVO to non-console port {port} ignored");
                return;
            }
        };

        if let Err(e) = writeln!(sink, "{value}").and_then(|_| sink.flush()) {
            log::warn!("console write to port {port} failed: {e}");
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
