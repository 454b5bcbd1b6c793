// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! User-visible console lines (fault reports, soft-reboot banner).
//!
//! Presentation is best effort: a console that cannot take a line never
//! changes the boot sequence.

use core::fmt;

use log::debug;

use crate::error::ConsoleError;

/// Line sink shown to the user.
pub trait Console {
    fn write_line(&mut self, line: &str) -> Result<(), ConsoleError>;
}

/// Writes `message` to `console`, dropping it if the console refuses.
pub fn present<C: Console + ?Sized>(console: &mut C, message: impl fmt::Display) {
    let line = message.to_string();
    if let Err(err) = console.write_line(&line) {
        debug!(target: "boot", "{err}, dropped: {line}");
    }
}

/// Collects lines in memory.
impl Console for Vec<String> {
    fn write_line(&mut self, line: &str) -> Result<(), ConsoleError> {
        self.push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Closed;

    impl Console for Closed {
        fn write_line(&mut self, _line: &str) -> Result<(), ConsoleError> {
            Err(ConsoleError)
        }
    }

    #[test]
    fn closed_console_is_ignored() {
        present(&mut Closed, "MPY: soft reboot");
    }

    #[test]
    fn lines_reach_an_open_console() {
        let mut lines: Vec<String> = Vec::new();
        present(&mut lines, format_args!("{} script aborted", "boot"));
        assert_eq!(lines, vec!["boot script aborted"]);
    }
}
