//! Manager and cache configuration

use serde::{Deserialize, Serialize};

use crate::error::{AssetError, Result};
use crate::id::RoleId;

/// Static shape of an [`AssetManager`](crate::manager::AssetManager)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManagerConfig {
    /// Number of worker roles; role ids are `0..roles`
    pub roles: u32,
    /// Role whose threads run fetch jobs (disk/IO)
    pub fetch_role: RoleId,
    /// Capacity of every role queue and of the control queue
    pub queue_capacity: usize,
    /// Scheme indices are `0..schemes_max_count`
    pub schemes_max_count: u32,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self {
            roles: 3,
            fetch_role: RoleId(0),
            queue_capacity: 1024,
            schemes_max_count: 50,
        }
    }
}

impl AssetManagerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.roles == 0 {
            return Err(AssetError::Config("at least one worker role is required".into()));
        }
        if self.queue_capacity == 0 {
            return Err(AssetError::Config("queue_capacity must be non-zero".into()));
        }
        if self.schemes_max_count == 0 {
            return Err(AssetError::Config("schemes_max_count must be non-zero".into()));
        }
        if self.fetch_role.0 >= self.roles {
            return Err(AssetError::UnknownRole(self.fetch_role));
        }
        Ok(())
    }

    /// Iterate over every valid role id
    pub fn role_ids(&self) -> impl Iterator<Item = RoleId> {
        (0..self.roles).map(RoleId)
    }
}

/// Settings of an [`OnDemandCache`](crate::on_demand::OnDemandCache)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnDemandConfig {
    /// Ticks an entry may go unused before it is unloaded
    pub eviction_threshold: u32,
}

impl Default for OnDemandConfig {
    fn default() -> Self {
        Self {
            eviction_threshold: 20,
        }
    }
}

impl OnDemandConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
