use std::fmt;

use crate::commands::FirmwareVersion;

/// Stage of a firmware update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePhase {
    Idle,
    EnterMode,
    Start,
    Transfer,
    End,
    Done,
    Failed,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdatePhase::Idle => "idle",
            UpdatePhase::EnterMode => "enter-mode",
            UpdatePhase::Start => "start",
            UpdatePhase::Transfer => "transfer",
            UpdatePhase::End => "end",
            UpdatePhase::Done => "done",
            UpdatePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Progress notification from a firmware update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent {
    PhaseEntered(UpdatePhase),
    ChunkAttemptFailed {
        chunk: u16,
        attempt: u32,
        max_attempts: u32,
        reason: String,
    },
    ChunkAcknowledged {
        chunk: u16,
        total: u16,
        attempts: u32,
    },
    Finished {
        success: bool,
    },
    VersionQueried(Option<FirmwareVersion>),
}

/// Receives progress of a firmware update.
///
/// Called on the updating thread between bus exchanges; keep it quick.
pub trait UpdateObserver {
    fn on_event(&mut self, event: UpdateEvent);
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl UpdateObserver for NoopObserver {
    fn on_event(&mut self, _event: UpdateEvent) {}
}

impl<F> UpdateObserver for F
where
    F: FnMut(UpdateEvent),
{
    fn on_event(&mut self, event: UpdateEvent) {
        self(event)
    }
}
