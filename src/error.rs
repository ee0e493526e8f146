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

//! Error types

use std::fmt;

use crate::id::{AssetId, RoleId};

/// Asset pipeline error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// Byte provider had nothing for this id
    NotFound(AssetId),

    /// Byte provider failed (possibly transiently)
    Io(String),

    /// Decompression or parse failure
    Decode(String),

    /// Scheme-specific construction failure
    Load(String),

    /// Payload requested with a type that does not match the asset's scheme
    TypeMismatch {
        asset: AssetId,
        expected: &'static str,
    },

    /// Queue shut down under the caller
    Terminated,

    /// Zero is reserved and never names an asset
    InvalidAssetId,

    /// Scheme index outside the configured range
    SchemeOutOfRange(u32),

    /// Scheme index registered twice
    SchemeAlreadyDefined(u32),

    /// Asset refers to a scheme nobody registered
    UnknownScheme(u32),

    /// A reload reported a different scheme than the published generation
    SchemeChanged { asset: AssetId, from: u32, to: u32 },

    /// Role id outside the configured range
    UnknownRole(RoleId),

    /// Fabricating an id that is already tracked
    AssetAlreadyExists(AssetId),

    /// Invalid configuration
    Config(String),
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound(id) => write!(f, "Asset not found: {id}"),
            AssetError::Io(msg) => write!(f, "IO error: {msg}"),
            AssetError::Decode(msg) => write!(f, "Decode error: {msg}"),
            AssetError::Load(msg) => write!(f, "Asset load error: {msg}"),
            AssetError::TypeMismatch { asset, expected } => {
                write!(f, "Type mismatch for asset {asset}: requested {expected}")
            }
            AssetError::Terminated => write!(f, "Queue terminated"),
            AssetError::InvalidAssetId => write!(f, "Invalid asset id (zero is reserved)"),
            AssetError::SchemeOutOfRange(index) => write!(f, "Scheme index out of range: {index}"),
            AssetError::SchemeAlreadyDefined(index) => {
                write!(f, "Scheme already defined: {index}")
            }
            AssetError::UnknownScheme(index) => write!(f, "Unknown scheme: {index}"),
            AssetError::SchemeChanged { asset, from, to } => {
                write!(f, "Scheme of asset {asset} cannot change from {from} to {to}")
            }
            AssetError::UnknownRole(role) => write!(f, "Unknown worker role: {role}"),
            AssetError::AssetAlreadyExists(id) => write!(f, "Asset already exists: {id}"),
            AssetError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for AssetError {}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(err: serde_json::Error) -> Self {
        AssetError::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AssetError>;
