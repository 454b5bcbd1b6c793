// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Scoped fault boundary around one script execution
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 7 unit tests
//!
//! Every script fault and every panic raised below the boundary is turned
//! into an [`Outcome`]. Only an unrecoverable runtime trap, or a failure of
//! the boundary while restoring interrupt state, escapes as `FatalError`.
//!
//! INVARIANTS:
//!   - the interrupt state seen after `run_bracketed` equals the state seen
//!     before it, whatever the script did
//!   - one boundary is active at a time (`&mut self`)

use core::fmt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use log::{info, warn};

use crate::error::FatalError;
use crate::gate::{DebugGate, DebugTransport};
use crate::script::{
    Completion, EvalError, FaultKind, FaultRecord, Script, ScriptFault, ScriptRuntime, ScriptSource,
};

/// Interrupt line whose mask the guard brackets around a run.
pub trait InterruptSource {
    fn interrupt_enabled(&self) -> bool;
    fn set_interrupt_enabled(&self, enabled: bool);
}

impl<T: DebugTransport> InterruptSource for DebugGate<T> {
    fn interrupt_enabled(&self) -> bool {
        DebugGate::interrupt_enabled(self)
    }

    fn set_interrupt_enabled(&self, enabled: bool) {
        DebugGate::set_interrupt_enabled(self, enabled)
    }
}

/// How a guarded run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    EarlyExit,
    Faulted(FaultRecord),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::EarlyExit => f.write_str("early exit"),
            Self::Faulted(record) => fmt::Display::fmt(record, f),
        }
    }
}

/// Counters kept across runs, reset only at power-on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GuardStats {
    pub runs: u64,
    pub faults: u64,
    pub early_exits: u64,
}

/// The fault boundary.
#[derive(Debug, Default)]
pub struct ExecutionGuard {
    stats: GuardStats,
}

impl ExecutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> GuardStats {
        self.stats
    }

    /// Runs `step` below the boundary.
    ///
    /// The inner `Err` carries a script fault (including a caught panic); the
    /// outer `Err` is an unrecoverable trap.
    pub fn guard_step<T, F>(
        &mut self,
        source: ScriptSource,
        step: F,
    ) -> Result<Result<T, FaultRecord>, FatalError>
    where
        F: FnOnce() -> Result<T, EvalError>,
    {
        self.stats.runs += 1;
        let fault = match panic::catch_unwind(AssertUnwindSafe(step)) {
            Ok(Ok(value)) => return Ok(Ok(value)),
            Ok(Err(EvalError::Fault(fault))) => fault,
            Ok(Err(EvalError::Unrecoverable(reason))) => {
                return Err(FatalError::Trap(format!("{source}: {reason}")));
            }
            Err(payload) => ScriptFault::new(FaultKind::Panic, panic_message(payload.as_ref())),
        };
        self.stats.faults += 1;
        let record = FaultRecord { source, fault };
        warn!(target: "guard", "{record}");
        Ok(Err(record))
    }

    /// Evaluates `script` on `runtime`, consuming the buffer.
    pub fn run<R>(&mut self, runtime: &mut R, script: Script) -> Result<Outcome, FatalError>
    where
        R: ScriptRuntime + ?Sized,
    {
        let source = script.source();
        let outcome = match self.guard_step(source, || runtime.eval(&script))? {
            Ok(Completion::Completed) => Outcome::Completed,
            Ok(Completion::EarlyExit) => {
                self.stats.early_exits += 1;
                info!(target: "guard", "{source} script exited early");
                Outcome::EarlyExit
            }
            Err(record) => Outcome::Faulted(record),
        };
        Ok(outcome)
    }

    /// [`run`](Self::run) with `irq` forced to `enabled_during` for the
    /// duration, then restored to the state it had on entry.
    pub fn run_bracketed<R, I>(
        &mut self,
        runtime: &mut R,
        script: Script,
        irq: &I,
        enabled_during: bool,
    ) -> Result<Outcome, FatalError>
    where
        R: ScriptRuntime + ?Sized,
        I: InterruptSource + ?Sized,
    {
        let saved = irq.interrupt_enabled();
        irq.set_interrupt_enabled(enabled_during);
        let outcome = self.run(runtime, script);
        panic::catch_unwind(AssertUnwindSafe(|| irq.set_interrupt_enabled(saved)))
            .map_err(|payload| FatalError::Boundary(panic_message(payload.as_ref())))?;
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubsystemError;
    use crate::script::ReplStatus;
    use std::cell::Cell;

    enum Behaviour {
        Complete,
        Exit,
        Raise,
        Panic,
        Trap,
    }

    struct Runtime(Behaviour);

    impl ScriptRuntime for Runtime {
        fn init(&mut self) -> Result<(), SubsystemError> {
            Ok(())
        }

        fn eval(&mut self, _script: &Script) -> Result<Completion, EvalError> {
            match self.0 {
                Behaviour::Complete => Ok(Completion::Completed),
                Behaviour::Exit => Ok(Completion::EarlyExit),
                Behaviour::Raise => Err(ScriptFault::new(FaultKind::Exception, "NameError").into()),
                Behaviour::Panic => panic!("heap walked off the end"),
                Behaviour::Trap => Err(EvalError::Unrecoverable("nlr stack empty".into())),
            }
        }

        fn repl_step(&mut self) -> Result<ReplStatus, EvalError> {
            Ok(ReplStatus::Exit)
        }

        fn deinit(&mut self) {}
    }

    struct Irq(Cell<bool>);

    impl InterruptSource for Irq {
        fn interrupt_enabled(&self) -> bool {
            self.0.get()
        }

        fn set_interrupt_enabled(&self, enabled: bool) {
            self.0.set(enabled);
        }
    }

    fn script() -> Script {
        Script::new(ScriptSource::HostInjected, b"x = 1".to_vec())
    }

    #[test]
    fn completed_and_early_exit() {
        let mut guard = ExecutionGuard::new();
        let outcome = guard.run(&mut Runtime(Behaviour::Complete), script()).unwrap();
        assert_eq!(outcome, Outcome::Completed);
        let outcome = guard.run(&mut Runtime(Behaviour::Exit), script()).unwrap();
        assert_eq!(outcome, Outcome::EarlyExit);
        assert_eq!(guard.stats(), GuardStats { runs: 2, faults: 0, early_exits: 1 });
    }

    #[test]
    fn script_fault_is_recorded() {
        let mut guard = ExecutionGuard::new();
        let outcome = guard.run(&mut Runtime(Behaviour::Raise), script()).unwrap();
        let Outcome::Faulted(record) = outcome else { panic!("expected fault") };
        assert_eq!(record.source, ScriptSource::HostInjected);
        assert_eq!(record.fault.kind, FaultKind::Exception);
        assert_eq!(guard.stats().faults, 1);
    }

    #[test]
    fn panic_below_boundary_becomes_fault() {
        let mut guard = ExecutionGuard::new();
        let outcome = guard.run(&mut Runtime(Behaviour::Panic), script()).unwrap();
        assert_eq!(
            outcome,
            Outcome::Faulted(FaultRecord {
                source: ScriptSource::HostInjected,
                fault: ScriptFault::new(FaultKind::Panic, "heap walked off the end"),
            })
        );
    }

    #[test]
    fn unrecoverable_trap_escapes() {
        let mut guard = ExecutionGuard::new();
        let err = guard.run(&mut Runtime(Behaviour::Trap), script()).unwrap_err();
        assert_eq!(err, FatalError::Trap("host: nlr stack empty".into()));
    }

    #[test]
    fn bracket_restores_interrupt_state_on_every_outcome() {
        for saved in [false, true] {
            for behaviour in [Behaviour::Complete, Behaviour::Exit, Behaviour::Raise, Behaviour::Panic] {
                let irq = Irq(Cell::new(saved));
                let mut guard = ExecutionGuard::new();
                guard.run_bracketed(&mut Runtime(behaviour), script(), &irq, !saved).unwrap();
                assert_eq!(irq.interrupt_enabled(), saved);
            }
        }
    }

    #[test]
    fn bracket_applies_requested_state_during_run() {
        struct Spy<'a>(&'a Irq, Cell<Option<bool>>);

        impl ScriptRuntime for Spy<'_> {
            fn init(&mut self) -> Result<(), SubsystemError> {
                Ok(())
            }
            fn eval(&mut self, _script: &Script) -> Result<Completion, EvalError> {
                self.1.set(Some(self.0.interrupt_enabled()));
                Ok(Completion::Completed)
            }
            fn repl_step(&mut self) -> Result<ReplStatus, EvalError> {
                Ok(ReplStatus::Exit)
            }
            fn deinit(&mut self) {}
        }

        let irq = Irq(Cell::new(false));
        let mut spy = Spy(&irq, Cell::new(None));
        ExecutionGuard::new().run_bracketed(&mut spy, script(), &irq, true).unwrap();
        assert_eq!(spy.1.get(), Some(true));
        assert!(!irq.interrupt_enabled());
    }

    #[test]
    fn failed_restore_is_fatal() {
        struct Brittle(Cell<u32>);

        impl InterruptSource for Brittle {
            fn interrupt_enabled(&self) -> bool {
                false
            }
            fn set_interrupt_enabled(&self, _enabled: bool) {
                let calls = self.0.get() + 1;
                self.0.set(calls);
                if calls == 2 {
                    panic!("interrupt controller wedged");
                }
            }
        }

        let irq = Brittle(Cell::new(0));
        let err = ExecutionGuard::new()
            .run_bracketed(&mut Runtime(Behaviour::Complete), script(), &irq, true)
            .unwrap_err();
        assert_eq!(err, FatalError::Boundary("interrupt controller wedged".into()));
    }
}
