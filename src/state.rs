//! Per-asset lifecycle state

use serde::{Deserialize, Serialize};

/// Lifecycle state of one tracked asset
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetState {
    /// Created, fetch job queued
    Requested = 0,
    /// A disk thread is obtaining the bytes
    Fetching = 1,
    /// Waiting for (or running) the scheme's load callback on its role thread
    Finalizing = 2,
    /// Payload published
    Ready = 3,
    /// Provider, decode or load error; terminal until the next reload
    Failed = 4,
    /// Reference count reached zero, payload being released
    Disposing = 5,
}

impl AssetState {
    /// Still moving through the pipeline
    pub fn is_processing(self) -> bool {
        !matches!(self, AssetState::Ready | AssetState::Failed)
    }

    /// Whether the manager ever moves an asset from `self` to `next`
    pub fn can_transition_to(self, next: AssetState) -> bool {
        use AssetState::*;
        matches!(
            (self, next),
            (Requested, Fetching)
                | (Requested, Ready)
                | (Requested, Failed)
                | (Requested, Disposing)
                | (Fetching, Finalizing)
                | (Fetching, Ready)
                | (Fetching, Failed)
                | (Fetching, Disposing)
                | (Finalizing, Ready)
                | (Finalizing, Failed)
                | (Finalizing, Disposing)
                | (Ready, Ready)
                | (Ready, Failed)
                | (Ready, Disposing)
                | (Failed, Requested)
                | (Failed, Disposing)
                | (Disposing, Requested)
        )
    }
}
