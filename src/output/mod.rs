//! Output modes: one file per target console protocol.
//!
//! Every mode turns the post-profile state into its byte-exact report and
//! parses host OUT reports (rumble, LEDs) into per-player feedback. The
//! transport below only moves bytes.

pub mod dinput;
pub mod ds3;
pub mod gamecube;
pub mod gpio;
pub mod pcengine;
pub mod switch;
pub mod xinput;

pub use dinput::DInputMode;
pub use ds3::Ds3Mode;
pub use gamecube::GameCubeMode;
pub use gpio::{GpioOutput, GpioPins};
pub use pcengine::PcEngineMode;
pub use switch::SwitchMode;
pub use xinput::XInputMode;

use joypad_core::Buttons;

/// D-pad bits to the 4-bit HID hat encoding (0 = north, clockwise,
/// 0x0F = released).
#[must_use]
pub fn dpad_to_hat(buttons: Buttons) -> u8 {
    let up = buttons.contains(Buttons::DU);
    let down = buttons.contains(Buttons::DD);
    let left = buttons.contains(Buttons::DL);
    let right = buttons.contains(Buttons::DR);
    match (up, right, down, left) {
        (true, false, false, false) => 0,
        (true, true, false, false) => 1,
        (false, true, false, false) => 2,
        (false, true, true, false) => 3,
        (false, false, true, false) => 4,
        (false, false, true, true) => 5,
        (false, false, false, true) => 6,
        (true, false, false, true) => 7,
        _ => 0x0F,
    }
}

/// Center-128 byte onto a signed 16-bit stick value.
#[must_use]
pub fn axis_to_i16(v: u8) -> i16 {
    (i16::from(v) - 128).saturating_mul(256)
}

/// Same, but with the positive direction flipped (HID Y down vs XInput
/// Y up).
#[must_use]
pub fn axis_to_i16_inverted(v: u8) -> i16 {
    (128 - i16::from(v)).saturating_mul(256)
}
