// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: `log` backend emitting single structured lines on the debug UART
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 2 unit tests
//! PUBLIC API: UartLogger, init(level), format_line()
//! INVARIANTS: one line per record; installing twice is a no-op

use core::fmt::Arguments;
use std::io::Write;

use log::{LevelFilter, Log, Metadata, Record};

/// Writes `[LEVEL target] message` lines to stderr, the host's UART.
pub struct UartLogger;

static LOGGER: UartLogger = UartLogger;

impl Log for UartLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), record.target(), *record.args());
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Renders one record, trailing newline included.
pub fn format_line(level: log::Level, target: &str, args: Arguments<'_>) -> String {
    format!("[{level} {target}] {args}\n")
}

/// Installs [`UartLogger`] and sets the global filter.
///
/// Returns `false` if a logger was already installed; the filter is updated
/// either way.
pub fn init(level: LevelFilter) -> bool {
    let installed = log::set_logger(&LOGGER).is_ok();
    log::set_max_level(level);
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_shape() {
        let line = format_line(log::Level::Warn, "gate", format_args!("script dropped, gate {}", "Busy"));
        assert_eq!(line, "[WARN gate] script dropped, gate Busy\n");
    }

    #[test]
    fn second_install_is_a_no_op() {
        init(LevelFilter::Info);
        assert!(!init(LevelFilter::Debug));
        assert_eq!(log::max_level(), LevelFilter::Debug);
    }
}
