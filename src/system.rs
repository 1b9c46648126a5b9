//! Process lifecycle collaborator.

use std::time::Duration;

/// Restart and low-power suspension seam.
///
/// On hardware, `restart` reboots into the freshly written image and
/// `deep_sleep` suspends the whole process until the wake timer fires; both
/// re-enter the startup sequence from the top with no in-memory state carried
/// over. Neither returns on a real device. They are modeled as returning so
/// hosts and tests can observe that they were requested.
pub trait SystemPower {
    fn restart(&mut self);
    fn deep_sleep(&mut self, duration: Duration);
}
