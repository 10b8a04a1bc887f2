//! Raw GPIO output: one line per canonical button, driven from the
//! router's tap path so a press reaches the wires inside the submitting
//! driver's call, with no polling latency.

use joypad_core::{Buttons, InputEvent, ProfileOutput, TapSink, BUTTON_COUNT};

/// Output line collaborator. Line index == canonical button bit index.
pub trait GpioPins {
    /// Drive one line. `active` follows the canonical active-high bitmap;
    /// the implementation inverts for open-drain wiring as needed.
    fn set_line(&mut self, line: usize, active: bool);
}

/// Tap-exclusive GPIO sink.
pub struct GpioOutput<P: GpioPins> {
    pins: P,
    last: Buttons,
}

impl<P: GpioPins> GpioOutput<P> {
    pub fn new(pins: P) -> Self {
        Self {
            pins,
            last: Buttons::NONE,
        }
    }

    /// Force every line inactive (startup, shutdown).
    pub fn clear(&mut self) {
        for line in 0..BUTTON_COUNT {
            self.pins.set_line(line, false);
        }
        self.last = Buttons::NONE;
    }

    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    fn apply(&mut self, buttons: Buttons) {
        let changed = Buttons(buttons.raw() ^ self.last.raw());
        if changed.is_empty() {
            return;
        }
        for line in 0..BUTTON_COUNT {
            let bit = Buttons(1 << line);
            if changed.contains(bit) {
                self.pins.set_line(line, buttons.contains(bit));
            }
        }
        self.last = buttons;
    }
}

impl<P: GpioPins> TapSink for GpioOutput<P> {
    fn tap(&mut self, _output: u8, _port: usize, out: &ProfileOutput, _event: &InputEvent) {
        self.apply(out.buttons);
    }
}
