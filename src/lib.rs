// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Archetype Assets - concurrent, reference-counted asset manager
//!
//! Assets are requested by id from any thread, fetched on a disk role,
//! finalized on whichever role owns the target resource, and published to
//! readers once ready. An on-demand cache layers tick-based idle eviction on
//! top.

pub mod config;
pub mod error;
pub mod handle;
pub mod hot_reload;
pub mod id;
mod job;
pub mod manager;
pub mod on_demand;
pub mod prelude;
pub mod profiling;
pub mod provider;
pub mod queue;
pub mod scheme;
pub mod state;
pub mod workers;

pub use config::*;
pub use error::*;
pub use handle::*;
pub use hot_reload::{apply_change_notifications, ChangeWatcher, SystemTimeProvider, TimeProvider};
pub use id::*;
pub use manager::*;
pub use on_demand::*;
pub use provider::*;
pub use queue::*;
pub use scheme::*;
pub use state::*;
pub use workers::*;
