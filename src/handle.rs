use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::id::AssetId;
use crate::manager::AssetManager;
use crate::state::AssetState;

/// Owned reference to an asset, released when dropped
pub struct AssetHandle {
    manager: Option<AssetManager>,
    id: AssetId,
}

impl AssetHandle {
    /// Wrap a reference the caller already took with `load`
    pub(crate) fn new(manager: AssetManager, id: AssetId) -> Self {
        Self {
            manager: Some(manager),
            id,
        }
    }

    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn ready(&self) -> bool {
        self.manager.as_ref().is_some_and(|m| m.ready(self.id))
    }

    pub fn state(&self) -> Option<AssetState> {
        self.manager.as_ref().and_then(|m| m.state(self.id))
    }

    /// Published payload, empty until ready
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.manager.as_ref().and_then(|m| m.get::<T>(self.id))
    }

    /// Give up the guard; the reference must now be released with `unload`
    pub fn into_raw(mut self) -> AssetId {
        self.manager = None;
        self.id
    }
}

impl Clone for AssetHandle {
    /// Takes another reference
    fn clone(&self) -> Self {
        if let Some(manager) = &self.manager {
            manager.load(self.id);
        }
        Self {
            manager: self.manager.clone(),
            id: self.id,
        }
    }
}

impl Drop for AssetHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.take() {
            manager.unload(self.id);
        }
    }
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
