// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Ordered subsystem bring-up and reverse-order teardown
//! OWNERS: @init-team
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 6 unit tests (1 property test)
//!
//! INVARIANTS:
//!   - deinit runs only on entries whose init succeeded this cycle
//!   - teardown order is the exact reverse of successful init order
//!   - tear_down is idempotent

use log::{debug, error, info, warn};

use crate::error::{InitError, SubsystemError};

/// How the boot sequence reacts when an entry fails to initialise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Criticality {
    /// Failure is logged and bring-up continues with the next entry.
    Optional,
    /// Failure aborts bring-up; the device continues degraded.
    Required,
    /// Like `Required`, and eligible for the fatal-on-critical policy.
    Critical,
}

/// Hardware or software unit with a balanced init/deinit pair.
pub trait Subsystem {
    /// Stable name used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Claims the resources behind this subsystem.
    fn init(&mut self) -> Result<(), SubsystemError>;

    /// Releases what `init` claimed. Only called after a successful `init`.
    fn deinit(&mut self);
}

struct Entry {
    subsystem: Box<dyn Subsystem>,
    criticality: Criticality,
}

/// Declared bring-up order plus the record of what is currently live.
#[derive(Default)]
pub struct SubsystemRegistry {
    entries: Vec<Entry>,
    // Indices of live entries, in init order.
    live: Vec<usize>,
}

impl SubsystemRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `subsystem` to the bring-up order.
    pub fn register(&mut self, subsystem: Box<dyn Subsystem>, criticality: Criticality) -> &mut Self {
        self.entries.push(Entry { subsystem, criticality });
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, subsystem: impl Subsystem + 'static, criticality: Criticality) -> Self {
        self.register(Box::new(subsystem), criticality);
        self
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries currently initialised.
    pub fn initialized(&self) -> usize {
        self.live.len()
    }

    /// Whether the entry called `name` is currently initialised.
    pub fn is_initialized(&self, name: &str) -> bool {
        self.live.iter().any(|&index| self.entries[index].subsystem.name() == name)
    }

    /// Entry names in declared order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.subsystem.name())
    }

    /// Initialises entries in declared order.
    ///
    /// An `Optional` failure is logged and skipped. The first `Required` or
    /// `Critical` failure stops the sequence; whatever came up before it stays
    /// up until the next [`tear_down`](Self::tear_down). Entries already live
    /// are not initialised twice.
    pub fn bring_up(&mut self) -> Result<(), InitError> {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if self.live.contains(&index) {
                continue;
            }
            let name = entry.subsystem.name();
            match entry.subsystem.init() {
                Ok(()) => {
                    debug!(target: "registry", "up {name}");
                    self.live.push(index);
                }
                Err(source) if entry.criticality == Criticality::Optional => {
                    warn!(target: "registry", "{name} unavailable: {source}");
                }
                Err(source) => {
                    error!(target: "registry", "{name} init failed: {source}");
                    return Err(InitError::Subsystem {
                        name,
                        criticality: entry.criticality,
                        source,
                    });
                }
            }
        }
        info!(target: "registry", "{}/{} subsystems up", self.live.len(), self.entries.len());
        Ok(())
    }

    /// Deinitialises every live entry, newest first.
    pub fn tear_down(&mut self) {
        while let Some(index) = self.live.pop() {
            let entry = &mut self.entries[index];
            debug!(target: "registry", "down {}", entry.subsystem.name());
            entry.subsystem.deinit();
        }
    }
}

impl Drop for SubsystemRegistry {
    fn drop(&mut self) {
        self.tear_down();
    }
}
