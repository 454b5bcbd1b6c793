// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Board-level hardware traits consumed by the boot orchestrator
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 3 unit tests + tests/board.rs
//!
//! PUBLIC API: Clock, Delay, RingOscillator, StatusLed
//!
//! Every method takes `&self`: implementations sit on memory-mapped
//! registers and may be touched from interrupt context.

#![cfg_attr(not(test), no_std)]

/// Monotonic millisecond clock.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;
}

/// Busy-wait delays.
pub trait Delay {
    /// Spins for at least `us` microseconds.
    fn delay_us(&self, us: u32);

    /// Spins for at least `ms` milliseconds.
    fn delay_ms(&self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1_000);
        }
    }
}

/// Free-running ring oscillator whose low bit carries phase jitter.
pub trait RingOscillator {
    /// Samples the jittered bit. Only bit 0 of the result is meaningful.
    fn random_bit(&self) -> u8;
}

/// Single status LED used for terminal fault signalling.
pub trait StatusLed {
    /// Drives the LED pin high (`true`) or low (`false`).
    fn set(&self, on: bool);
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

impl<T: Delay + ?Sized> Delay for &T {
    fn delay_us(&self, us: u32) {
        (**self).delay_us(us)
    }

    fn delay_ms(&self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

impl<T: RingOscillator + ?Sized> RingOscillator for &T {
    fn random_bit(&self) -> u8 {
        (**self).random_bit()
    }
}

impl<T: StatusLed + ?Sized> StatusLed for &T {
    fn set(&self, on: bool) {
        (**self).set(on)
    }
}
