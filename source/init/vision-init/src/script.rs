// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Script buffers, fault records and the scripting runtime contract
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 4 unit tests
//!
//! PUBLIC API:
//!   - Script/ScriptSource: owned buffer moved into the execution guard
//!   - ScriptRuntime: init/eval/repl_step/deinit entry points
//!   - ScriptStore: device-resident script lookup
//!   - FaultRecord/ScriptFault/FaultKind: abnormal termination reports
//!   - CancelFlag: cooperative stop shared with the debug gate

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::error::SubsystemError;

/// Where a unit of script code came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptSource {
    /// Device-resident script run on every cycle.
    Boot,
    /// Device-resident script run once after power-on.
    Main,
    /// Script queued by the debug host.
    HostInjected,
    /// A line entered at the interactive prompt.
    Repl,
}

impl fmt::Display for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Boot => "boot",
            Self::Main => "main",
            Self::HostInjected => "host",
            Self::Repl => "repl",
        };
        f.write_str(label)
    }
}

/// Script bytes plus their source tag.
///
/// Not `Clone`: the buffer is handed to exactly one execution and dropped.
pub struct Script {
    source: ScriptSource,
    bytes: Vec<u8>,
}

impl Script {
    /// Takes ownership of `bytes` as a script from `source`.
    pub fn new(source: ScriptSource, bytes: impl Into<Vec<u8>>) -> Self {
        Self { source, bytes: bytes.into() }
    }

    /// Source tag.
    pub fn source(&self) -> ScriptSource {
        self.source
    }

    /// Raw script text.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Script text if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        core::str::from_utf8(&self.bytes).ok()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script").field("source", &self.source).field("len", &self.len()).finish()
    }
}

/// Class of abnormal termination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// Uncaught language-level exception.
    Exception,
    /// Division by zero, overflow and friends.
    Arithmetic,
    /// Bad memory access or allocation failure inside the script heap.
    Memory,
    /// Stopped on request from the debug host.
    Interrupted,
    /// Runtime code panicked while executing the script.
    Panic,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Exception => "exception",
            Self::Arithmetic => "arithmetic fault",
            Self::Memory => "memory fault",
            Self::Interrupted => "interrupted",
            Self::Panic => "panic",
        };
        f.write_str(label)
    }
}

/// Uncaught error raised while a script was running.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {description}")]
pub struct ScriptFault {
    /// Fault class.
    pub kind: FaultKind,
    /// Human readable description, typically the runtime's traceback.
    pub description: String,
}

impl ScriptFault {
    /// Builds a fault of `kind`.
    pub fn new(kind: FaultKind, description: impl Into<String>) -> Self {
        Self { kind, description: description.into() }
    }
}

/// Report produced by the execution guard for one aborted run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaultRecord {
    /// What was running.
    pub source: ScriptSource,
    /// What went wrong.
    pub fault: ScriptFault,
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} script aborted: {}", self.source, self.fault)
    }
}

/// How a script that did not fault finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Ran to the end.
    Completed,
    /// Asked to end the current boot phase.
    EarlyExit,
}

/// Result of one interactive step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplStatus {
    /// A line was handled; keep prompting.
    Continue,
    /// User asked for a soft reset.
    Exit,
    /// The link carrying the prompt went away.
    LinkLost,
}

/// Error surface of [`ScriptRuntime::eval`] and [`ScriptRuntime::repl_step`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    /// Script-level fault; recoverable at the guard.
    #[error(transparent)]
    Fault(#[from] ScriptFault),
    /// The runtime's own recovery state is gone. Never converted.
    #[error("unrecoverable: {0}")]
    Unrecoverable(String),
}

/// Scripting language runtime consumed by the orchestrator.
pub trait ScriptRuntime {
    /// Brings the interpreter and its heap up.
    fn init(&mut self) -> Result<(), SubsystemError>;

    /// Runs one script to completion.
    fn eval(&mut self, script: &Script) -> Result<Completion, EvalError>;

    /// Reads and executes one interactive line.
    fn repl_step(&mut self) -> Result<ReplStatus, EvalError>;

    /// Releases the interpreter and its heap.
    fn deinit(&mut self);

    /// Seeds the runtime's PRNG. Default ignores the seed.
    fn seed_random(&mut self, _seed: u32) {}
}

/// Device-resident script storage.
pub trait ScriptStore {
    /// Returns the script stored under `name`, if any. Absence is not an error.
    fn read_script(&mut self, name: &str) -> Option<Vec<u8>>;
}

/// Cooperative stop request shared between the debug gate and the runtime.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// New, lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the running script stop at its next check.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Lowers the flag.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
