// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Interrupt-driven handshake with the external debug host
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 14 unit tests
//!
//! PUBLIC API:
//!   - DebugGate: script mailbox between interrupt and mainline context
//!   - DebugTransport: outbound half of the USB byte pump
//!   - GateState: Idle / Armed / ScriptQueued / Busy
//!   - protocol: host frame layout and command codes
//!
//! INVARIANTS:
//!   - `on_host_frame` is the only path into ScriptQueued
//!   - a queued script is handed out exactly once (`take_script`)
//!   - frames arriving while the interrupt is masked are latched, not lost
//!   - malformed frames never change state
//!   - `reset` discards queued and latched frames
//!
//! `on_host_frame` runs in interrupt context. Everything else runs on the
//! mainline, which never holds the slot lock while the interrupt is live.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use log::{debug, info, warn};
use spin::Mutex;
use vision_hal::{Clock, Delay};

use crate::error::{LinkError, Timeout};
use crate::script::{CancelFlag, Script, ScriptSource};

/// Poll spacing used by [`DebugGate::wait_for_idle`].
pub const IDLE_POLL_INTERVAL_US: u32 = 1_000;

/// Host frame layout: `[MAGIC, cmd, len:u32le, payload...]`.
pub mod protocol {
    /// First byte of every host frame.
    pub const MAGIC: u8 = 0x30;
    /// Magic + command + little-endian payload length.
    pub const HEADER_LEN: usize = 6;

    pub const CMD_SCRIPT_EXEC: u8 = 0x05;
    pub const CMD_SCRIPT_STOP: u8 = 0x06;
    pub const CMD_FW_VERSION: u8 = 0x80;
    pub const CMD_ARCH_STR: u8 = 0x83;
    pub const CMD_SCRIPT_RUNNING: u8 = 0x87;

    /// Size of the ARCH_STR reply, NUL padded.
    pub const ARCH_REPLY_LEN: usize = 64;

    /// Decoded host command borrowing its payload from the frame.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Command<'a> {
        ScriptExec(&'a [u8]),
        ScriptStop,
        FwVersion,
        ArchStr,
        ScriptRunning,
    }

    /// Decodes `frame`. Returns `None` for anything malformed or unknown.
    pub fn parse(frame: &[u8]) -> Option<Command<'_>> {
        if frame.len() < HEADER_LEN || frame[0] != MAGIC {
            return None;
        }
        let len = u32::from_le_bytes([frame[2], frame[3], frame[4], frame[5]]) as usize;
        let payload = &frame[HEADER_LEN..];
        if payload.len() != len {
            return None;
        }
        match (frame[1], payload.is_empty()) {
            (CMD_SCRIPT_EXEC, false) => Some(Command::ScriptExec(payload)),
            (CMD_SCRIPT_STOP, true) => Some(Command::ScriptStop),
            (CMD_FW_VERSION, true) => Some(Command::FwVersion),
            (CMD_ARCH_STR, true) => Some(Command::ArchStr),
            (CMD_SCRIPT_RUNNING, true) => Some(Command::ScriptRunning),
            _ => None,
        }
    }

    /// Builds a host frame; used by host-side tooling and tests.
    pub fn encode(cmd: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.push(MAGIC);
        frame.push(cmd);
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);
        frame
    }
}

/// Outbound side of the debug link plus its interrupt line.
pub trait DebugTransport {
    /// Masks or unmasks the link's interrupt at the controller.
    fn set_irq_enabled(&self, enabled: bool);

    /// Queues `bytes` for transmission to the host.
    fn write(&self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Whether queued bytes are still draining.
    fn tx_pending(&self) -> bool;
}

/// Handshake state. Idle and Armed differ only by the interrupt mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum GateState {
    Idle,
    Armed,
    ScriptQueued,
    Busy,
}

/// Identity reported to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Major, minor, patch.
    pub firmware: [u32; 3],
    /// Board architecture string.
    pub arch: String,
}

struct Slots {
    script: Option<Vec<u8>>,
    latched: Option<Vec<u8>>,
}

/// Mailbox between the debug host's interrupt and the mainline.
///
/// State and mask flag are atomics so both contexts can read them without
/// locking. The slot lock is only taken by the interrupt when the state is
/// Armed or the line is masked, and only by the mainline when the state is
/// Busy or the line is masked; mainline never holds it while the interrupt
/// can preempt and contend for it.
pub struct DebugGate<T: DebugTransport> {
    transport: T,
    identity: DeviceIdentity,
    cancel: CancelFlag,
    state: AtomicU8,
    irq_enabled: AtomicBool,
    slots: Mutex<Slots>,
}

impl GateState {
    const fn encode(self) -> u8 {
        self as u8
    }

    const fn decode(raw: u8) -> Self {
        match raw {
            1 => Self::Armed,
            2 => Self::ScriptQueued,
            3 => Self::Busy,
            _ => Self::Idle,
        }
    }
}

impl<T: DebugTransport> DebugGate<T> {
    /// Creates a gate in `Idle` with its interrupt masked.
    pub fn new(transport: T, identity: DeviceIdentity) -> Self {
        Self {
            transport,
            identity,
            cancel: CancelFlag::new(),
            state: AtomicU8::new(GateState::Idle.encode()),
            irq_enabled: AtomicBool::new(false),
            slots: Mutex::new(Slots { script: None, latched: None }),
        }
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Stop flag raised by `SCRIPT_STOP`; share it with the runtime.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Current handshake state.
    pub fn state(&self) -> GateState {
        GateState::decode(self.state.load(Ordering::Acquire))
    }

    /// Whether the gate's interrupt is unmasked.
    pub fn interrupt_enabled(&self) -> bool {
        self.irq_enabled.load(Ordering::Acquire)
    }

    /// Masks or unmasks the gate's interrupt.
    ///
    /// Unmasking moves Idle to Armed and replays a latched frame; masking
    /// moves Armed back to Idle. Queued and Busy are left alone. No lock is
    /// held across the transport call, so an interrupt that fires the moment
    /// the line is unmasked can run straight through `on_host_frame`.
    pub fn set_interrupt_enabled(&self, enabled: bool) {
        if !enabled {
            self.irq_enabled.store(false, Ordering::Release);
            self.transport.set_irq_enabled(false);
            self.transition(GateState::Armed, GateState::Idle);
            return;
        }
        // Still masked here, so the interrupt cannot contend for the slots.
        let replay = if self.interrupt_enabled() { None } else { self.slots.lock().latched.take() };
        self.transition(GateState::Idle, GateState::Armed);
        self.irq_enabled.store(true, Ordering::Release);
        self.transport.set_irq_enabled(true);
        if let Some(frame) = replay {
            debug!(target: "gate", "replaying latched frame");
            self.dispatch(&frame);
        }
    }

    /// Interrupt entry point for one inbound host frame.
    pub fn on_host_frame(&self, frame: &[u8]) {
        if !self.interrupt_enabled() {
            self.slots.lock().latched = Some(frame.to_vec());
            return;
        }
        self.dispatch(frame);
    }

    /// Back to power-on state: masked, Idle, nothing queued or latched.
    ///
    /// Host frames that arrived before a soft reset belong to the old
    /// session and are discarded here.
    pub fn reset(&self) {
        self.irq_enabled.store(false, Ordering::Release);
        self.transport.set_irq_enabled(false);
        let mut slots = self.slots.lock();
        let dropped = slots.script.take().is_some() | slots.latched.take().is_some();
        drop(slots);
        self.state.store(GateState::Idle.encode(), Ordering::Release);
        self.cancel.clear();
        if dropped {
            info!(target: "gate", "discarded pending host frame on reset");
        }
    }

    /// Whether a host script is waiting.
    pub fn is_script_ready(&self) -> bool {
        self.state() == GateState::ScriptQueued
    }

    /// Hands the queued script to the caller, ScriptQueued -> Busy.
    ///
    /// Returns `None` when nothing is queued.
    pub fn take_script(&self) -> Option<Script> {
        if !self.transition(GateState::ScriptQueued, GateState::Busy) {
            return None;
        }
        // Busy: the interrupt no longer touches the script slot.
        let bytes = self.slots.lock().script.take()?;
        self.cancel.clear();
        Some(Script::new(ScriptSource::HostInjected, bytes))
    }

    /// Marks the taken script as finished, Busy -> Armed (Idle if masked).
    pub fn finish_script(&self) {
        let next = if self.interrupt_enabled() { GateState::Armed } else { GateState::Idle };
        self.transition(GateState::Busy, next);
    }

    /// Busy with a script or still draining a reply.
    pub fn is_busy(&self) -> bool {
        self.state() == GateState::Busy || self.transport.tx_pending()
    }

    /// Polls [`is_busy`](Self::is_busy) for at most `timeout_ms`.
    ///
    /// Mainline only. Returns as soon as a poll sees the gate idle.
    pub fn wait_for_idle<C, D>(&self, clock: &C, delay: &D, timeout_ms: u32) -> Result<(), Timeout>
    where
        C: Clock + ?Sized,
        D: Delay + ?Sized,
    {
        let start = clock.now_ms();
        loop {
            if !self.is_busy() {
                return Ok(());
            }
            let waited = clock.now_ms().saturating_sub(start);
            if waited >= u64::from(timeout_ms) {
                let waited_ms = u32::try_from(waited).unwrap_or(u32::MAX);
                warn!(target: "gate", "host command still in flight after {waited_ms} ms");
                return Err(Timeout { waited_ms });
            }
            delay.delay_us(IDLE_POLL_INTERVAL_US);
        }
    }

    fn dispatch(&self, frame: &[u8]) {
        use protocol::Command;

        let Some(command) = protocol::parse(frame) else {
            debug!(target: "gate", "ignoring malformed frame ({} bytes)", frame.len());
            return;
        };
        match command {
            Command::ScriptExec(payload) => {
                let state = self.state();
                if state != GateState::Armed {
                    warn!(target: "gate", "script dropped, gate {state:?}");
                    return;
                }
                self.slots.lock().script = Some(payload.to_vec());
                if self.transition(GateState::Armed, GateState::ScriptQueued) {
                    debug!(target: "gate", "script queued ({} bytes)", payload.len());
                } else {
                    self.slots.lock().script = None;
                }
            }
            Command::ScriptStop => {
                if self.state() == GateState::Busy {
                    info!(target: "gate", "host requested stop");
                    self.cancel.raise();
                }
            }
            Command::ScriptRunning => {
                let running = u32::from(self.state() == GateState::Busy);
                self.reply(&running.to_le_bytes());
            }
            Command::FwVersion => {
                let mut reply = [0u8; 12];
                for (chunk, part) in reply.chunks_exact_mut(4).zip(self.identity.firmware) {
                    chunk.copy_from_slice(&part.to_le_bytes());
                }
                self.reply(&reply);
            }
            Command::ArchStr => {
                let mut reply = [0u8; protocol::ARCH_REPLY_LEN];
                let arch = self.identity.arch.as_bytes();
                let len = arch.len().min(protocol::ARCH_REPLY_LEN - 1);
                reply[..len].copy_from_slice(&arch[..len]);
                self.reply(&reply);
            }
        }
    }

    fn transition(&self, from: GateState, to: GateState) -> bool {
        self.state
            .compare_exchange(from.encode(), to.encode(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn reply(&self, bytes: &[u8]) {
        if let Err(err) = self.transport.write(bytes) {
            warn!(target: "gate", "reply dropped: {err}");
        }
    }
}
