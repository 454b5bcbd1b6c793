//! CONTEXT: Tests for HAL traits: Clock/Delay/RingOscillator/StatusLed mocks
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 3 integration tests
//!
//! TEST_SCENARIOS:
//!   - delay_drives_clock(): a delay that advances a shared clock
//!   - led_records_levels(): StatusLed level history
//!   - trait_objects(): traits remain object safe
use std::cell::{Cell, RefCell};

use vision_hal::{Clock, Delay, RingOscillator, StatusLed};

struct SimTime(Cell<u64>);

impl Clock for SimTime {
    fn now_ms(&self) -> u64 {
        self.0.get() / 1_000
    }
}

impl Delay for SimTime {
    fn delay_us(&self, us: u32) {
        self.0.set(self.0.get() + u64::from(us));
    }
}

struct RecordingLed(RefCell<Vec<bool>>);

impl StatusLed for RecordingLed {
    fn set(&self, on: bool) {
        self.0.borrow_mut().push(on);
    }
}

struct Alternating(Cell<u32>);

impl RingOscillator for Alternating {
    fn random_bit(&self) -> u8 {
        let n = self.0.get();
        self.0.set(n + 1);
        (n & 1) as u8
    }
}

#[test]
fn delay_drives_clock() {
    let time = SimTime(Cell::new(0));
    time.delay_ms(5);
    time.delay_us(999);
    assert_eq!(time.now_ms(), 5);
    time.delay_us(1);
    assert_eq!(time.now_ms(), 6);
}

#[test]
fn led_records_levels() {
    let led = RecordingLed(RefCell::new(Vec::new()));
    led.set(true);
    led.set(false);
    assert_eq!(*led.0.borrow(), vec![true, false]);
}

#[test]
fn trait_objects() {
    let osc = Alternating(Cell::new(0));
    let dyn_osc: &dyn RingOscillator = &osc;
    let bits: Vec<u8> = (0..4).map(|_| dyn_osc.random_bit()).collect();
    assert_eq!(bits, vec![0, 1, 0, 1]);
}
