// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal error state: report once, then blink the status LED forever.

use core::fmt;

use log::error;
use vision_hal::{Delay, StatusLed};

use crate::error::FatalError;

/// Owns the status LED once the device has given up.
pub struct FatalHandler<L: StatusLed, D: Delay> {
    led: L,
    delay: D,
    half_period_ms: u32,
}

impl<L: StatusLed, D: Delay> FatalHandler<L, D> {
    /// `half_period_ms` is the on time and the off time of one blink.
    pub fn new(led: L, delay: D, half_period_ms: u32) -> Self {
        Self { led, delay, half_period_ms }
    }

    /// Logs `reason` and blinks until power is removed.
    pub fn enter(&self, reason: impl fmt::Display) -> ! {
        error!(target: "fatal", "{reason}");
        loop {
            self.led.set(true);
            self.delay.delay_ms(self.half_period_ms);
            self.led.set(false);
            self.delay.delay_ms(self.half_period_ms);
        }
    }
}

/// Invariant check that routes to the fatal handler instead of panicking.
pub fn check(condition: bool, what: &str) -> Result<(), FatalError> {
    if condition {
        Ok(())
    } else {
        Err(FatalError::Assertion(what.to_string()))
    }
}
