// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-power-on session flags.
//!
//! `first_boot` is the only flag that survives a soft reset; the other two
//! are reset at the top of every cycle.

/// Flags owned by the orchestrator for the lifetime of one power-on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub(crate) first_boot: bool,
    pub(crate) interrupted: bool,
    pub(crate) script_ready: bool,
}

impl Session {
    /// Session as it stands right after reset vector.
    pub fn power_on() -> Self {
        Self { first_boot: true, interrupted: false, script_ready: false }
    }

    /// True until the first soft reset.
    pub fn first_boot(&self) -> bool {
        self.first_boot
    }

    /// Boot script ended early or faulted this cycle.
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// Snapshot of the gate's ScriptQueued state, taken at the REPL.
    pub fn script_ready(&self) -> bool {
        self.script_ready
    }

    /// Main script may run: first boot, boot script not interrupted.
    pub fn main_script_allowed(&self) -> bool {
        self.first_boot && !self.interrupted
    }

    pub(crate) fn begin_cycle(&mut self) {
        self.interrupted = false;
        self.script_ready = false;
    }

    pub(crate) fn end_cycle(&mut self) {
        self.first_boot = false;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::power_on()
    }
}
