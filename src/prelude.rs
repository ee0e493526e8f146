//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use archetype_assets::prelude::*;
//! ```

pub use crate::config::{AssetManagerConfig, OnDemandConfig};
pub use crate::error::{AssetError, Result};
pub use crate::handle::AssetHandle;
pub use crate::id::{AssetId, RoleId};
pub use crate::manager::AssetManager;
pub use crate::on_demand::OnDemandCache;
pub use crate::provider::{ByteProvider, MemoryProvider, RawAsset};
pub use crate::scheme::{LoadContext, SchemeDescriptor};
pub use crate::state::AssetState;
pub use crate::workers::WorkerPool;
