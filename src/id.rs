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

//! Asset and worker-role identifiers

use std::fmt;
use std::num::NonZeroU32;

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use crate::error::{AssetError, Result};

// Fixed seeds so a name maps to the same id in every process.
const NAME_SEEDS: (u64, u64, u64, u64) = (
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
);

/// Stable 32-bit asset identifier. Zero is reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct AssetId(NonZeroU32);

impl AssetId {
    /// Wrap a raw id, `None` for zero
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Hash a textual name (usually a path inside the asset tree) into an id
    pub fn from_name(name: &str) -> Self {
        let (k0, k1, k2, k3) = NAME_SEEDS;
        let hash = RandomState::with_seeds(k0, k1, k2, k3).hash_one(name);
        let folded = (hash ^ (hash >> 32)) as u32;
        Self(NonZeroU32::new(folded).unwrap_or(NonZeroU32::MIN))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for AssetId {
    type Error = AssetError;

    fn try_from(raw: u32) -> Result<Self> {
        Self::new(raw).ok_or(AssetError::InvalidAssetId)
    }
}

impl From<AssetId> for u32 {
    fn from(id: AssetId) -> u32 {
        id.get()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical worker-thread category a job must execute on.
///
/// Roles are dense indices `0..config.roles`, fixed for the manager's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub u32);

impl RoleId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "role#{}", self.0)
    }
}
