//! Simultaneous Opposite Cardinal Direction resolution for the D-pad.

use crate::types::Buttons;

/// Resolution strategy when opposing directions are held together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocdMode {
    /// Both directions cancel.
    #[default]
    Neutral,
    /// The most recently pressed direction wins.
    LastWins,
    /// The second press wins; releasing it restores the first.
    SecondPriority,
    /// Up beats down; left+right cancel.
    UpPriority,
    /// Left+right cancel; up+down pass through.
    LeftRightNeutral,
}

/// Per-player memory for order-dependent strategies.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocdState {
    prev: Buttons,
    /// Direction that won the horizontal pair last time both were held.
    lr_winner: Buttons,
    ud_winner: Buttons,
}

/// Resolve the D-pad bits of `buttons` under `mode`, updating the
/// per-player order memory. Non-directional bits pass through untouched.
pub fn resolve(mode: SocdMode, buttons: Buttons, state: &mut SocdState) -> Buttons {
    let out = Buttons(
        (buttons.raw() & !Buttons::DPAD.raw())
            | resolve_pair(
                mode,
                buttons,
                state.prev,
                Buttons::DL,
                Buttons::DR,
                &mut state.lr_winner,
            )
            | resolve_pair(
                mode,
                buttons,
                state.prev,
                Buttons::DU,
                Buttons::DD,
                &mut state.ud_winner,
            ),
    );
    state.prev = buttons;
    out
}

fn resolve_pair(
    mode: SocdMode,
    buttons: Buttons,
    prev: Buttons,
    a: Buttons,
    b: Buttons,
    winner: &mut Buttons,
) -> u32 {
    let a_held = buttons.contains(a);
    let b_held = buttons.contains(b);

    // Track the newest press while no conflict exists.
    if a_held != b_held {
        *winner = if a_held { a } else { b };
        return if a_held { a.raw() } else { b.raw() };
    }
    if !a_held {
        return 0;
    }

    // Both held: pick per strategy.
    let vertical = a == Buttons::DU || b == Buttons::DU;
    match mode {
        SocdMode::Neutral => 0,
        SocdMode::LeftRightNeutral => {
            if vertical {
                a.raw() | b.raw()
            } else {
                0
            }
        }
        SocdMode::UpPriority => {
            if vertical {
                Buttons::DU.raw()
            } else {
                0
            }
        }
        SocdMode::LastWins | SocdMode::SecondPriority => {
            // The direction that was NOT already held is the newer press.
            let newcomer = if prev.contains(a) && !prev.contains(b) {
                b
            } else if prev.contains(b) && !prev.contains(a) {
                a
            } else {
                // Pressed in the same tick (or conflict persists): keep
                // the remembered winner, defaulting to the second listed.
                if winner.is_empty() { b } else { *winner }
            };
            *winner = newcomer;
            newcomer.raw()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_cancels_both_pairs() {
        let mut s = SocdState::default();
        let out = resolve(SocdMode::Neutral, Buttons::DL | Buttons::DR | Buttons::B1, &mut s);
        assert_eq!(out, Buttons::B1);
        let out = resolve(SocdMode::Neutral, Buttons::DU | Buttons::DD, &mut s);
        assert!(out.is_empty());
    }

    #[test]
    fn test_last_wins_sequence() {
        let mut s = SocdState::default();
        assert_eq!(resolve(SocdMode::LastWins, Buttons::DU, &mut s), Buttons::DU);
        // Down arrives while up is held: down wins.
        assert_eq!(
            resolve(SocdMode::LastWins, Buttons::DU | Buttons::DD, &mut s),
            Buttons::DD
        );
        // Winner sticks while the conflict persists.
        assert_eq!(
            resolve(SocdMode::LastWins, Buttons::DU | Buttons::DD, &mut s),
            Buttons::DD
        );
        assert_eq!(resolve(SocdMode::LastWins, Buttons::DD, &mut s), Buttons::DD);
    }

    #[test]
    fn test_up_priority() {
        let mut s = SocdState::default();
        assert_eq!(
            resolve(SocdMode::UpPriority, Buttons::DU | Buttons::DD, &mut s),
            Buttons::DU
        );
        assert!(resolve(SocdMode::UpPriority, Buttons::DL | Buttons::DR, &mut s).is_empty());
    }

    #[test]
    fn test_left_right_neutral_passes_vertical() {
        let mut s = SocdState::default();
        let out = resolve(
            SocdMode::LeftRightNeutral,
            Buttons::DL | Buttons::DR | Buttons::DU | Buttons::DD,
            &mut s,
        );
        assert_eq!(out, Buttons::DU | Buttons::DD);
    }

    #[test]
    fn test_single_direction_untouched() {
        let mut s = SocdState::default();
        for mode in [
            SocdMode::Neutral,
            SocdMode::LastWins,
            SocdMode::SecondPriority,
            SocdMode::UpPriority,
            SocdMode::LeftRightNeutral,
        ] {
            assert_eq!(resolve(mode, Buttons::DL, &mut s), Buttons::DL);
        }
    }
}
