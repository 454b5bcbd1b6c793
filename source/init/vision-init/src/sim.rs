// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Host-side stand-ins for the board collaborators
//! OWNERS: @init-team
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 3 unit tests
//!
//! Lets the orchestrator run as a normal process: scripts come from a
//! directory, the prompt reads stdin, the status LED and debug replies go to
//! the log. The toy runtime understands just enough to drive every branch of
//! the lifecycle:
//!
//! - a line containing `raise` faults with an exception
//! - a line containing `1/0` faults with an arithmetic error
//! - `sys.exit()` ends the script early
//! - at the prompt, `!exec <file>` queues `<file>` as a host script,
//!   `!reset` requests a soft reset and end of input drops the link

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, info};
use vision_hal::{Clock, Delay, RingOscillator, StatusLed};

use crate::config::BootConfig;
use crate::console::Console;
use crate::error::{ConsoleError, LinkError, SubsystemError};
use crate::gate::{protocol, DebugGate, DebugTransport};
use crate::orchestrator::{Collaborators, Orchestrator, Platform};
use crate::registry::{Criticality, Subsystem, SubsystemRegistry};
use crate::script::{
    CancelFlag, Completion, EvalError, FaultKind, ReplStatus, Script, ScriptFault, ScriptRuntime,
    ScriptSource, ScriptStore,
};

/// Monotonic clock and sleeping delay on `std::time`.
pub struct HostClock {
    origin: Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for HostClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Delay for HostClock {
    fn delay_us(&self, us: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(us)));
    }
}

/// Low bit of the monotonic clock's nanoseconds, sampled on demand.
pub struct JitterOscillator {
    origin: Instant,
}

impl JitterOscillator {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for JitterOscillator {
    fn default() -> Self {
        Self::new()
    }
}

impl RingOscillator for JitterOscillator {
    fn random_bit(&self) -> u8 {
        (self.origin.elapsed().subsec_nanos() & 1) as u8
    }
}

/// Status LED reported through the log.
pub struct LogLed;

impl StatusLed for LogLed {
    fn set(&self, on: bool) {
        debug!(target: "fatal", "led {}", if on { "on" } else { "off" });
    }
}

/// Scripts stored as files under one directory.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ScriptStore for DirStore {
    fn read_script(&mut self, name: &str) -> Option<Vec<u8>> {
        fs::read(self.root.join(name)).ok()
    }
}

/// Console on stdout.
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn write_line(&mut self, line: &str) -> Result<(), ConsoleError> {
        writeln!(io::stdout().lock(), "{line}").map_err(|_| ConsoleError)
    }
}

/// Debug transport whose replies are only logged.
#[derive(Default)]
pub struct LoopbackTransport {
    irq: Cell<bool>,
    replies: Cell<usize>,
}

impl LoopbackTransport {
    /// Replies written so far.
    pub fn replies(&self) -> usize {
        self.replies.get()
    }
}

impl DebugTransport for LoopbackTransport {
    fn set_irq_enabled(&self, enabled: bool) {
        self.irq.set(enabled);
    }

    fn write(&self, bytes: &[u8]) -> Result<(), LinkError> {
        if !self.irq.get() {
            return Err(LinkError::Disconnected);
        }
        self.replies.set(self.replies.get() + 1);
        debug!(target: "gate", "reply {} bytes", bytes.len());
        Ok(())
    }

    fn tx_pending(&self) -> bool {
        false
    }
}

/// Peripheral placeholder; `present = false` fails its init.
pub struct SimSubsystem {
    name: &'static str,
    present: bool,
}

impl SimSubsystem {
    pub fn new(name: &'static str, present: bool) -> Self {
        Self { name, present }
    }
}

impl Subsystem for SimSubsystem {
    fn name(&self) -> &'static str {
        self.name
    }

    fn init(&mut self) -> Result<(), SubsystemError> {
        if self.present {
            Ok(())
        } else {
            Err(SubsystemError::new("not present on host"))
        }
    }

    fn deinit(&mut self) {}
}

/// Line-oriented toy interpreter.
pub struct EchoRuntime {
    gate: Rc<DebugGate<LoopbackTransport>>,
    cancel: CancelFlag,
    input: Box<dyn BufRead>,
    output: Rc<RefCell<dyn Write>>,
    link_closed: Rc<Cell<bool>>,
    up: bool,
}

impl EchoRuntime {
    pub fn new(
        gate: Rc<DebugGate<LoopbackTransport>>,
        input: Box<dyn BufRead>,
        output: Rc<RefCell<dyn Write>>,
    ) -> Self {
        let cancel = gate.cancel_flag();
        Self { gate, cancel, input, output, link_closed: Rc::new(Cell::new(false)), up: false }
    }

    /// Set once the prompt's input reaches end of file.
    pub fn link_closed(&self) -> Rc<Cell<bool>> {
        self.link_closed.clone()
    }

    fn echo(&self, line: &str) -> Result<(), EvalError> {
        writeln!(self.output.borrow_mut(), "{line}")
            .map_err(|err| EvalError::Unrecoverable(format!("stdout: {err}")))
    }

    fn queue_host_script(&self, path: &str) -> Result<(), EvalError> {
        match fs::read(path) {
            Ok(bytes) => {
                self.gate.on_host_frame(&protocol::encode(protocol::CMD_SCRIPT_EXEC, &bytes));
                Ok(())
            }
            Err(err) => Err(ScriptFault::new(FaultKind::Exception, format!("OSError: {path}: {err}")).into()),
        }
    }
}

impl ScriptRuntime for EchoRuntime {
    fn init(&mut self) -> Result<(), SubsystemError> {
        self.up = true;
        Ok(())
    }

    fn eval(&mut self, script: &Script) -> Result<Completion, EvalError> {
        if !self.up {
            return Err(EvalError::Unrecoverable("runtime not initialised".into()));
        }
        let text = script
            .text()
            .ok_or_else(|| ScriptFault::new(FaultKind::Exception, "SyntaxError: invalid utf-8"))?;
        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            if self.cancel.is_raised() {
                return Err(ScriptFault::new(FaultKind::Interrupted, "KeyboardInterrupt").into());
            }
            if line.contains("raise") {
                return Err(ScriptFault::new(FaultKind::Exception, line).into());
            }
            if line.contains("1/0") {
                return Err(ScriptFault::new(FaultKind::Arithmetic, "ZeroDivisionError").into());
            }
            if line.starts_with("sys.exit") {
                return Ok(Completion::EarlyExit);
            }
            if script.source() != ScriptSource::Repl {
                self.echo(line)?;
            }
        }
        Ok(Completion::Completed)
    }

    fn repl_step(&mut self) -> Result<ReplStatus, EvalError> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => {
                self.link_closed.set(true);
                return Ok(ReplStatus::LinkLost);
            }
            Ok(_) => {}
            Err(err) => {
                info!(target: "boot", "prompt input failed: {err}");
                self.link_closed.set(true);
                return Ok(ReplStatus::LinkLost);
            }
        }
        let line = line.trim();
        if line == "!reset" {
            return Ok(ReplStatus::Exit);
        }
        if let Some(path) = line.strip_prefix("!exec ") {
            self.queue_host_script(path.trim())?;
            return Ok(ReplStatus::Continue);
        }
        match self.eval(&Script::new(ScriptSource::Repl, line))? {
            Completion::Completed => {
                self.echo(line)?;
                Ok(ReplStatus::Continue)
            }
            Completion::EarlyExit => Ok(ReplStatus::Exit),
        }
    }

    fn deinit(&mut self) {
        self.up = false;
    }
}

/// Host bring-up order, mirroring the board's.
pub fn board_registry() -> SubsystemRegistry {
    SubsystemRegistry::new()
        .with(SimSubsystem::new("pin", true), Criticality::Required)
        .with(SimSubsystem::new("pio", true), Criticality::Required)
        .with(SimSubsystem::new("dma", true), Criticality::Required)
        .with(SimSubsystem::new("i2s", true), Criticality::Optional)
        .with(SimSubsystem::new("usbdbg", true), Criticality::Critical)
        .with(SimSubsystem::new("framebuffer", true), Criticality::Required)
        .with(SimSubsystem::new("sensor", false), Criticality::Optional)
        .with(SimSubsystem::new("filesystem", true), Criticality::Required)
}

/// Wires a host orchestrator. The returned flag is raised when `input`
/// reaches end of file.
pub fn build(
    config: BootConfig,
    script_dir: PathBuf,
    input: Box<dyn BufRead>,
    output: Rc<RefCell<dyn Write>>,
) -> (Orchestrator<LoopbackTransport>, Rc<Cell<bool>>) {
    let gate = Rc::new(DebugGate::new(LoopbackTransport::default(), config.identity()));
    let runtime = EchoRuntime::new(gate.clone(), input, output);
    let link_closed = runtime.link_closed();
    let parts = Collaborators {
        registry: board_registry(),
        gate,
        runtime: Box::new(runtime),
        store: Box::new(DirStore::new(script_dir)),
        console: Box::new(StdoutConsole),
        platform: Platform {
            clock: Box::new(HostClock::new()),
            delay: Box::new(HostClock::new()),
            led: Box::new(LogLed),
            osc: Box::new(JitterOscillator::new()),
        },
    };
    (Orchestrator::new(config, parts), link_closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::State;
    use std::io::Cursor;

    fn sink() -> (Rc<RefCell<Vec<u8>>>, Rc<RefCell<dyn Write>>) {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let output: Rc<RefCell<dyn Write>> = buffer.clone();
        (buffer, output)
    }

    fn text(buffer: &Rc<RefCell<Vec<u8>>>) -> String {
        String::from_utf8(buffer.borrow().clone()).unwrap()
    }

    #[test]
    fn first_cycle_runs_boot_and_main_then_resets() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("boot.py"), "print('boot')\n").unwrap();
        fs::write(dir.path().join("main.py"), "print('main')\n").unwrap();
        let (buffer, output) = sink();
        let (mut orchestrator, closed) = build(
            BootConfig::default(),
            dir.path().to_path_buf(),
            Box::new(Cursor::new(Vec::new())),
            output,
        );
        orchestrator.run_cycle().unwrap();
        assert_eq!(text(&buffer), "print('boot')\nprint('main')\n");
        assert_eq!(orchestrator.main_script_runs(), 1);
        assert!(!closed.get());
        assert!(!orchestrator.registry().is_initialized("sensor"));
    }

    #[test]
    fn prompt_queues_host_script_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = dir.path().join("host.py");
        fs::write(&host, "print('from host')\n").unwrap();
        let input = format!("x = 1\n!exec {}\n", host.display());
        let (buffer, output) = sink();
        let (mut orchestrator, closed) = build(
            BootConfig::default(),
            dir.path().to_path_buf(),
            Box::new(Cursor::new(input.into_bytes())),
            output,
        );
        orchestrator.run_cycle().unwrap();
        assert_eq!(text(&buffer), "x = 1\nprint('from host')\n");
        assert!(!closed.get());

        orchestrator.run_cycle().unwrap();
        assert!(closed.get());
        assert_eq!(orchestrator.state(), State::Init);
        assert_eq!(orchestrator.cycles(), 2);
    }

    #[test]
    fn runtime_faults_are_classified() {
        let gate = Rc::new(DebugGate::new(LoopbackTransport::default(), BootConfig::default().identity()));
        let (_buffer, output) = sink();
        let mut runtime = EchoRuntime::new(gate, Box::new(Cursor::new(Vec::new())), output);
        runtime.init().unwrap();
        let mut kind_of = |source: ScriptSource, text: &str| match runtime.eval(&Script::new(source, text)) {
            Err(EvalError::Fault(fault)) => Some(fault.kind),
            _ => None,
        };
        assert_eq!(kind_of(ScriptSource::Boot, "raise ValueError"), Some(FaultKind::Exception));
        assert_eq!(kind_of(ScriptSource::Boot, "y = 1/0"), Some(FaultKind::Arithmetic));
        assert_eq!(kind_of(ScriptSource::Boot, "sys.exit()"), None);

        assert_eq!(runtime.eval(&Script::new(ScriptSource::Boot, "sys.exit()")), Ok(Completion::EarlyExit));
        runtime.cancel.raise();
        assert_eq!(
            runtime.eval(&Script::new(ScriptSource::HostInjected, "loop()")),
            Err(EvalError::Fault(ScriptFault::new(FaultKind::Interrupted, "KeyboardInterrupt")))
        );
    }
}
