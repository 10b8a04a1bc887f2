//! Output mode trait: normalized state in, target-protocol bytes out.

use crate::event::InputEvent;
use crate::feedback::Feedback;
use crate::profile::ProfileOutput;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputError {
    /// Transport refused the report.
    Io,
    /// Endpoint not ready (host not polling / not enumerated).
    NotReady,
}

/// Raw report bytes toward the console/host (transport collaborator).
pub trait HostTx {
    fn send_report(&mut self, port: u8, data: &[u8]) -> Result<(), OutputError>;
}

/// One output target (XInput, DS3, GameCube adapter, ...).
///
/// The router/scheduler pushes post-profile state in; the mode builds the
/// byte-exact report for its protocol and parses host OUT reports into
/// per-player feedback.
pub trait OutputMode {
    /// Short name for logs and the control plane.
    fn name(&self) -> &'static str;

    fn init(&mut self);

    fn is_ready(&self) -> bool;

    /// Output ports this mode drives (GC adapter: 4, most others: 1).
    fn max_players(&self) -> usize {
        1
    }

    /// Build and send the report for one player port. Returns false when
    /// the report was not sent (not ready, transport refused).
    fn send_report(
        &mut self,
        player: usize,
        event: &InputEvent,
        out: &ProfileOutput,
        tx: &mut dyn HostTx,
    ) -> bool;

    /// Host-to-device OUT report (rumble, LEDs).
    fn handle_output(&mut self, report_id: u8, data: &[u8]);

    /// Pending feedback for a player port, if the host changed it.
    fn get_feedback(&mut self, player: usize) -> Option<Feedback>;
}
