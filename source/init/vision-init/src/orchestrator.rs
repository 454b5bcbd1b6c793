// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Boot and soft-reset lifecycle state machine
//! OWNERS: @init-team @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: tests/lifecycle.rs
//!
//! PUBLIC API:
//!   - Orchestrator: owns the Session and every collaborator
//!   - State: lifecycle states
//!   - Collaborators/Platform: wiring handed to `Orchestrator::new`
//!
//! Transition table:
//!
//! | from          | to                                                   |
//! |---------------|------------------------------------------------------|
//! | Boot          | Init (once per power-on)                             |
//! | Init          | RunBootScript                                        |
//! | RunBootScript | RunMainScript if first boot and not interrupted,     |
//! |               | else Interactive                                     |
//! | RunMainScript | Teardown; Interactive if absent or faulted           |
//! | Interactive   | Interactive, RunHostScript, Teardown (REPL ended     |
//! |               | and no script queued)                                |
//! | RunHostScript | Teardown; Interactive if faulted                     |
//! | Teardown      | Init                                                 |
//!
//! INVARIANTS:
//!   - Teardown is the only state that tears subsystems down
//!   - no host frame crosses Teardown; the gate is reset there
//!   - RunMainScript runs at most once per power-on
//!   - `Session` is mutated here and nowhere else

use std::rc::Rc;

use log::{debug, info, warn};
use rng_rosc::RoscRng;
use vision_hal::{Clock, Delay, RingOscillator, StatusLed};

use crate::config::BootConfig;
use crate::console::{self, Console};
use crate::error::{FatalError, InitError};
use crate::fatal::{self, FatalHandler};
use crate::gate::{DebugGate, DebugTransport};
use crate::guard::{ExecutionGuard, GuardStats, Outcome};
use crate::registry::SubsystemRegistry;
use crate::script::{ReplStatus, Script, ScriptRuntime, ScriptSource, ScriptStore};
use crate::session::Session;

/// Banner shown on every soft reset.
pub const SOFT_REBOOT_BANNER: &str = "soft reboot";

/// Lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Boot,
    Init,
    RunBootScript,
    RunMainScript,
    Interactive,
    RunHostScript,
    Teardown,
}

/// Board primitives the orchestrator drives directly.
pub struct Platform {
    pub clock: Box<dyn Clock>,
    pub delay: Box<dyn Delay>,
    pub led: Box<dyn StatusLed>,
    pub osc: Box<dyn RingOscillator>,
}

/// Everything the orchestrator needs, handed over at construction.
pub struct Collaborators<T: DebugTransport> {
    pub registry: SubsystemRegistry,
    pub gate: Rc<DebugGate<T>>,
    pub runtime: Box<dyn ScriptRuntime>,
    pub store: Box<dyn ScriptStore>,
    pub console: Box<dyn Console>,
    pub platform: Platform,
}

/// Drives Boot → Init → scripts → Teardown → Init ...
pub struct Orchestrator<T: DebugTransport> {
    config: BootConfig,
    state: State,
    session: Session,
    guard: ExecutionGuard,
    registry: SubsystemRegistry,
    gate: Rc<DebugGate<T>>,
    runtime: Box<dyn ScriptRuntime>,
    store: Box<dyn ScriptStore>,
    console: Box<dyn Console>,
    platform: Platform,
    cycles: u64,
    main_script_runs: u64,
}

impl<T: DebugTransport> Orchestrator<T> {
    /// Creates an orchestrator sitting in [`State::Boot`].
    pub fn new(config: BootConfig, parts: Collaborators<T>) -> Self {
        Self {
            config,
            state: State::Boot,
            session: Session::power_on(),
            guard: ExecutionGuard::new(),
            registry: parts.registry,
            gate: parts.gate,
            runtime: parts.runtime,
            store: parts.store,
            console: parts.console,
            platform: parts.platform,
            cycles: 0,
            main_script_runs: 0,
        }
    }

    /// State the next [`step`](Self::step) will execute.
    pub fn state(&self) -> State {
        self.state
    }

    /// Flags of the current session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Subsystems brought up each cycle.
    pub fn registry(&self) -> &SubsystemRegistry {
        &self.registry
    }

    /// Debug gate shared with the script runtime.
    pub fn gate(&self) -> &Rc<DebugGate<T>> {
        &self.gate
    }

    /// Configuration fixed at power-on.
    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Fault boundary counters since power-on.
    pub fn guard_stats(&self) -> GuardStats {
        self.guard.stats()
    }

    /// Completed soft-reset cycles since power-on.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Times the main script was started since power-on.
    pub fn main_script_runs(&self) -> u64 {
        self.main_script_runs
    }

    /// Executes the current state and moves to the next one.
    ///
    /// On `Err` the state is left unchanged; the caller is expected to hand
    /// the error to [`halt`](Self::halt).
    pub fn step(&mut self) -> Result<State, FatalError> {
        let next = match self.state {
            State::Boot => {
                info!(target: "boot", "power on");
                self.session = Session::power_on();
                State::Init
            }
            State::Init => self.init()?,
            State::RunBootScript => self.run_boot_script()?,
            State::RunMainScript => self.run_main_script()?,
            State::Interactive => self.interactive()?,
            State::RunHostScript => self.run_host_script()?,
            State::Teardown => self.teardown()?,
        };
        if next != self.state {
            debug!(target: "boot", "{:?} -> {:?}", self.state, next);
        }
        self.state = next;
        Ok(next)
    }

    /// Steps until the next Teardown → Init transition.
    pub fn run_cycle(&mut self) -> Result<(), FatalError> {
        loop {
            let from = self.state;
            let to = self.step()?;
            if from == State::Teardown && to == State::Init {
                return Ok(());
            }
        }
    }

    /// Runs soft-reset cycles forever; a fatal error ends in [`halt`](Self::halt).
    pub fn run(mut self) -> ! {
        let err = loop {
            if let Err(err) = self.step() {
                break err;
            }
        };
        self.halt(err)
    }

    /// Hands `err` to the fatal handler.
    pub fn halt(&self, err: FatalError) -> ! {
        let handler = FatalHandler::new(
            &*self.platform.led,
            &*self.platform.delay,
            self.config.fatal.blink_half_period_ms,
        );
        handler.enter(err)
    }

    fn init(&mut self) -> Result<State, FatalError> {
        self.session.begin_cycle();
        self.gate.set_interrupt_enabled(false);

        self.runtime
            .init()
            .map_err(|source| FatalError::CriticalInit(InitError::Runtime(source)))?;
        let seed = RoscRng::new(&*self.platform.osc, &*self.platform.delay).next_word();
        self.runtime.seed_random(seed);
        debug!(target: "boot", "runtime up, seeded");

        if let Err(err) = self.registry.bring_up() {
            console::present(&mut *self.console, &err);
            if err.is_critical() && self.config.fatal.on_critical_init {
                return Err(FatalError::CriticalInit(err));
            }
            warn!(target: "boot", "continuing degraded");
        }
        Ok(State::RunBootScript)
    }

    fn run_boot_script(&mut self) -> Result<State, FatalError> {
        if let Some(bytes) = self.store.read_script(&self.config.scripts.boot) {
            let script = Script::new(ScriptSource::Boot, bytes);
            match self.guard.run_bracketed(&mut *self.runtime, script, &*self.gate, false)? {
                Outcome::Completed => {}
                Outcome::EarlyExit => self.session.interrupted = true,
                Outcome::Faulted(record) => {
                    console::present(&mut *self.console, &record);
                    self.session.interrupted = true;
                }
            }
        } else {
            debug!(target: "boot", "no {}", self.config.scripts.boot);
        }
        if self.session.main_script_allowed() {
            Ok(State::RunMainScript)
        } else {
            Ok(State::Interactive)
        }
    }

    fn run_main_script(&mut self) -> Result<State, FatalError> {
        fatal::check(self.session.main_script_allowed(), "main script outside first boot")?;
        let Some(bytes) = self.store.read_script(&self.config.scripts.main) else {
            debug!(target: "boot", "no {}", self.config.scripts.main);
            return Ok(State::Interactive);
        };
        self.main_script_runs += 1;
        let script = Script::new(ScriptSource::Main, bytes);
        let outcome = self.guard.run_bracketed(&mut *self.runtime, script, &*self.gate, false)?;
        Ok(self.after_script(outcome))
    }

    fn interactive(&mut self) -> Result<State, FatalError> {
        self.gate.set_interrupt_enabled(true);
        self.session.script_ready = self.gate.is_script_ready();
        if self.session.script_ready {
            return Ok(State::RunHostScript);
        }

        let runtime = &mut self.runtime;
        let link_lost = match self.guard.guard_step(ScriptSource::Repl, || runtime.repl_step())? {
            Ok(ReplStatus::Continue) => return Ok(State::Interactive),
            Ok(ReplStatus::Exit) => false,
            Ok(ReplStatus::LinkLost) => true,
            Err(record) => {
                console::present(&mut *self.console, &record);
                return Ok(State::Interactive);
            }
        };

        // A script queued while the REPL was ending still belongs to this session.
        self.session.script_ready = self.gate.is_script_ready();
        if self.session.script_ready {
            return Ok(State::RunHostScript);
        }
        if link_lost {
            warn!(target: "boot", "console link lost");
        }
        Ok(State::Teardown)
    }

    fn run_host_script(&mut self) -> Result<State, FatalError> {
        self.gate.set_interrupt_enabled(false);
        let script = self
            .gate
            .take_script()
            .ok_or_else(|| FatalError::Assertion("script ready but nothing queued".into()))?;
        self.session.script_ready = false;

        // Interrupt stays live during the run so the host can stop the script.
        let outcome = self.guard.run_bracketed(&mut *self.runtime, script, &*self.gate, true)?;
        self.gate.finish_script();
        self.gate.set_interrupt_enabled(true);

        let timeout_ms = self.config.debug.host_wait_timeout_ms;
        if let Err(timeout) =
            self.gate.wait_for_idle(&*self.platform.clock, &*self.platform.delay, timeout_ms)
        {
            warn!(target: "boot", "{timeout}, proceeding");
        }
        Ok(self.after_script(outcome))
    }

    fn teardown(&mut self) -> Result<State, FatalError> {
        self.gate.reset();
        console::present(&mut *self.console, SOFT_REBOOT_BANNER);
        self.registry.tear_down();
        self.runtime.deinit();
        fatal::check(self.registry.initialized() == 0, "subsystem live after teardown")?;
        self.session.end_cycle();
        self.cycles += 1;
        info!(target: "boot", "soft reset #{}", self.cycles);
        Ok(State::Init)
    }

    fn after_script(&mut self, outcome: Outcome) -> State {
        match outcome {
            Outcome::Completed | Outcome::EarlyExit => State::Teardown,
            Outcome::Faulted(record) => {
                console::present(&mut *self.console, &record);
                State::Interactive
            }
        }
    }
}
