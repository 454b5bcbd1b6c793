// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy shared by the boot components.
//!
//! `InitError` and `ScriptFault` (see [`crate::script`]) are recovered where
//! they are detected. `Timeout` is reported and treated as idle. Only
//! `FatalError` leaves a component boundary.

use thiserror::Error;

use crate::registry::Criticality;

/// Reason reported by a subsystem collaborator whose `init` failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct SubsystemError(pub String);

impl SubsystemError {
    /// Wraps a human readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Subsystem bring-up failure. Logged; the device continues degraded.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InitError {
    /// A registry entry refused to initialise.
    #[error("{name} init failed: {source}")]
    Subsystem {
        /// Registry name of the failing entry.
        name: &'static str,
        /// Class the entry was registered with.
        criticality: Criticality,
        /// Reason returned by the collaborator.
        source: SubsystemError,
    },
    /// The scripting runtime could not be brought up.
    #[error("script runtime init failed: {0}")]
    Runtime(SubsystemError),
}

impl InitError {
    /// Whether the failure concerns something the device cannot run without.
    pub fn is_critical(&self) -> bool {
        match self {
            Self::Subsystem { criticality, .. } => *criticality == Criticality::Critical,
            Self::Runtime(_) => true,
        }
    }
}

/// Bounded wait on the debug channel expired.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("debug channel still busy after {waited_ms} ms")]
pub struct Timeout {
    /// Time spent polling before giving up.
    pub waited_ms: u32,
}

/// Outbound write on the debug transport failed.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    /// Host is not attached.
    #[error("debug link disconnected")]
    Disconnected,
    /// Transmit FIFO cannot take the reply.
    #[error("debug link transmit buffer full")]
    Overflow,
}

/// Presentation collaborator could not accept a line.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("console unavailable")]
pub struct ConsoleError;

/// Unrecoverable condition. Routed to the fatal handler; no further progress.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FatalError {
    /// A runtime invariant did not hold.
    #[error("assertion failed: {0}")]
    Assertion(String),
    /// Bring-up of something the device cannot run without failed.
    #[error("critical init failure: {0}")]
    CriticalInit(InitError),
    /// The script runtime reported a trap its own recovery could not absorb.
    #[error("unrecoverable trap: {0}")]
    Trap(String),
    /// The fault boundary itself failed while restoring state.
    #[error("fault boundary corrupted: {0}")]
    Boundary(String),
}
