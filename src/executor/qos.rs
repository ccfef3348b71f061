//! Quality-of-service tiers.

use super::specific;
use std::fmt;

/// Quality-of-service tier of a queue or of a single submission.
///
/// Ordered by importance: `Background < Utility < Default < UserInitiated <
/// UserInteractive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Qos {
    Background = 0,
    Utility = 1,
    #[default]
    Default = 2,
    UserInitiated = 3,
    UserInteractive = 4,
}

impl Qos {
    pub const ALL: [Qos; 5] = [
        Qos::Background,
        Qos::Utility,
        Qos::Default,
        Qos::UserInitiated,
        Qos::UserInteractive,
    ];

    /// Effective tier of the unit of work running on the calling thread.
    ///
    /// `None` when the caller is not inside work run by this crate's
    /// platform threads (or the main loop).
    pub fn current() -> Option<Qos> {
        specific::current_qos()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Qos::Background => "background",
            Qos::Utility => "utility",
            Qos::Default => "default",
            Qos::UserInitiated => "user-initiated",
            Qos::UserInteractive => "user-interactive",
        }
    }

    /// OS niceness applied to threads of this tier when background
    /// deprioritisation is enabled.
    pub(crate) fn niceness(self) -> i32 {
        match self {
            Qos::Background => 10,
            Qos::Utility => 5,
            _ => 0,
        }
    }
}

impl fmt::Display for Qos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(target_os = "linux")]
pub(crate) fn apply_thread_niceness(qos: Qos) {
    let nice = qos.niceness();
    if nice == 0 {
        return;
    }
    // who = 0 targets the calling thread on Linux.
    let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
    if result != 0 {
        tracing::warn!(
            thread = std::thread::current().name().unwrap_or("unknown"),
            %qos,
            "failed to lower thread priority"
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn apply_thread_niceness(_qos: Qos) {}
