// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(clippy::all)]

//! CONTEXT: Boot and soft-reset orchestrator for the vision sensor board
//! OWNERS: @init-team @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v0.1)
//! TEST_COVERAGE: unit tests per module + tests/lifecycle.rs
//!
//! PUBLIC API: Orchestrator, SubsystemRegistry, DebugGate, ExecutionGuard,
//! FatalHandler, BootConfig, logging::init()
//! DEPENDS_ON: vision-hal, rng-rosc
//! INVARIANTS: init/deinit balanced per cycle; main script at most once per
//! power-on; interrupt state symmetric across every guarded run
//!
//! The board image supplies real collaborators behind the traits in
//! [`script`], [`registry`], [`gate`] and [`console`]; [`sim`] supplies host
//! stand-ins used by the `vision-init` binary.

pub mod config;
pub mod console;
pub mod error;
pub mod fatal;
pub mod gate;
pub mod guard;
pub mod logging;
pub mod orchestrator;
pub mod registry;
pub mod script;
pub mod session;
pub mod sim;

pub use config::{BootConfig, ConfigError};
pub use console::Console;
pub use error::{ConsoleError, FatalError, InitError, LinkError, SubsystemError, Timeout};
pub use fatal::FatalHandler;
pub use gate::{DebugGate, DebugTransport, DeviceIdentity, GateState};
pub use guard::{ExecutionGuard, InterruptSource, Outcome};
pub use orchestrator::{Collaborators, Orchestrator, Platform, State};
pub use registry::{Criticality, Subsystem, SubsystemRegistry};
pub use script::{
    CancelFlag, Completion, EvalError, FaultKind, FaultRecord, ReplStatus, Script, ScriptFault,
    ScriptRuntime, ScriptSource, ScriptStore,
};
pub use session::Session;
