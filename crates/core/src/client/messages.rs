//! Messages exchanged between the host context and the transport worker.

use tracelane_domain::{ClientConfig, LaneItem, PriorityLane, SalvageSnapshot};

/// Host → worker.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Create the transport. Must be the first message; repeats are ignored.
    Init(ClientConfig),
    /// Buffer one item on a lane.
    PreLoadRequest { lane: PriorityLane, item: LaneItem },
    /// Salvage from the previous session, restored ahead of new items.
    Replay(SalvageSnapshot),
    /// Raw key material for the payload cipher.
    SendEncryptionConfig(Vec<u8>),
    /// Stop sending and report everything unsent.
    SaveBeforeUnload,
    Shutdown,
}

impl WorkerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::PreLoadRequest { .. } => "preLoadRequest",
            Self::Replay(_) => "replay",
            Self::SendEncryptionConfig(_) => "sendEncryptionConfig",
            Self::SaveBeforeUnload => "saveBeforeUnload",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Worker → host.
#[derive(Debug, Clone, PartialEq)]
pub enum MainMessage {
    /// A send failed; carries a human-readable description.
    ReportAjaxError(String),
    /// Reply to [`WorkerMessage::SaveBeforeUnload`].
    SaveBeforeUnload(SalvageSnapshot),
}
