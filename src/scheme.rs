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

//! Scheme descriptors and the scheme registry
//!
//! A scheme is a registered loader kind (texture, mesh, sound, ...). The
//! payload type is fixed when the descriptor is built, so the type-erased
//! callbacks stored in the registry can only ever produce that type.

use smallvec::SmallVec;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::{AssetError, Result};
use crate::id::{AssetId, RoleId};

/// Type-erased, immutable payload of a ready asset
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Dependency list collected while loading one generation
pub type Dependencies = SmallVec<[AssetId; 4]>;

/// Context handed to a scheme's load callback
pub struct LoadContext<'a, T> {
    id: AssetId,
    bytes: &'a [u8],
    previous: Option<&'a T>,
    label: Option<&'a str>,
    dependencies: &'a mut Dependencies,
}

impl<'a, T> LoadContext<'a, T> {
    pub fn id(&self) -> AssetId {
        self.id
    }

    /// Raw (already decompressed) bytes
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Payload of the generation being replaced, on reload
    pub fn previous(&self) -> Option<&'a T> {
        self.previous
    }

    pub fn label(&self) -> Option<&'a str> {
        self.label
    }

    /// Declare that the payload references another asset.
    ///
    /// The manager keeps the dependency loaded for as long as this
    /// generation stays published.
    pub fn depend_on(&mut self, id: AssetId) {
        if id != self.id && !self.dependencies.contains(&id) {
            self.dependencies.push(id);
        }
    }

    pub fn dependencies(&self) -> &[AssetId] {
        &self.dependencies[..]
    }
}

type ErasedLoadFn = dyn Fn(AssetId, &[u8], Option<&Payload>, Option<&str>, &mut Dependencies) -> Result<Payload>
    + Send
    + Sync;

type DecompressFn = dyn Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync;

/// Loader descriptor for one scheme index
pub struct SchemeDescriptor {
    payload_type: TypeId,
    payload_type_name: &'static str,
    worker_role: Option<RoleId>,
    load: Box<ErasedLoadFn>,
    decompress: Option<Box<DecompressFn>>,
}

impl SchemeDescriptor {
    /// Build a descriptor whose payload type is `T`
    pub fn new<T, F>(load: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut LoadContext<'_, T>) -> Result<T> + Send + Sync + 'static,
    {
        let erased: Box<ErasedLoadFn> = Box::new(move |id, bytes, previous, label, dependencies| {
            let previous = previous.and_then(|p| (**p).downcast_ref::<T>());
            let mut context = LoadContext {
                id,
                bytes,
                previous,
                label,
                dependencies,
            };
            let value = load(&mut context)?;
            Ok(Arc::new(value) as Payload)
        });

        Self {
            payload_type: TypeId::of::<T>(),
            payload_type_name: type_name::<T>(),
            worker_role: None,
            load: erased,
            decompress: None,
        }
    }

    /// Finalize on `role`'s thread instead of inline on the fetching thread
    pub fn on_role(mut self, role: RoleId) -> Self {
        self.worker_role = Some(role);
        self
    }

    /// Decompression step for providers that report compressed bytes
    pub fn with_decompress<F>(mut self, decompress: F) -> Self
    where
        F: Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.decompress = Some(Box::new(decompress));
        self
    }

    pub fn payload_type(&self) -> TypeId {
        self.payload_type
    }

    pub fn payload_type_name(&self) -> &'static str {
        self.payload_type_name
    }

    pub fn worker_role(&self) -> Option<RoleId> {
        self.worker_role
    }

    /// Whether payloads of this scheme are `T`
    pub fn is<T: Any>(&self) -> bool {
        self.payload_type == TypeId::of::<T>()
    }

    pub(crate) fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        match &self.decompress {
            Some(decompress) => decompress(bytes),
            None => Err(AssetError::Decode(
                "compressed asset but the scheme has no decompressor".to_string(),
            )),
        }
    }

    pub(crate) fn load(
        &self,
        id: AssetId,
        bytes: &[u8],
        previous: Option<&Payload>,
        label: Option<&str>,
        dependencies: &mut Dependencies,
    ) -> Result<Payload> {
        (self.load)(id, bytes, previous, label, dependencies)
    }
}

impl fmt::Debug for SchemeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeDescriptor")
            .field("payload_type", &self.payload_type_name)
            .field("worker_role", &self.worker_role)
            .field("decompress", &self.decompress.is_some())
            .finish()
    }
}

/// Index-addressed table of registered schemes
#[derive(Debug)]
pub struct SchemeRegistry {
    slots: Vec<Option<Arc<SchemeDescriptor>>>,
    roles: u32,
}

impl SchemeRegistry {
    pub fn new(max_schemes: u32, roles: u32) -> Self {
        Self {
            slots: (0..max_schemes).map(|_| None).collect(),
            roles,
        }
    }

    /// Register `descriptor` under `index`. Re-registration is rejected.
    pub fn define(&mut self, index: u32, descriptor: SchemeDescriptor) -> Result<()> {
        if let Some(role) = descriptor.worker_role {
            if role.0 >= self.roles {
                return Err(AssetError::UnknownRole(role));
            }
        }
        let slot = self
            .slots
            .get_mut(index as usize)
            .ok_or(AssetError::SchemeOutOfRange(index))?;
        if slot.is_some() {
            return Err(AssetError::SchemeAlreadyDefined(index));
        }
        *slot = Some(Arc::new(descriptor));
        Ok(())
    }

    pub fn get(&self, index: u32) -> Option<Arc<SchemeDescriptor>> {
        self.slots.get(index as usize).and_then(Clone::clone)
    }

    /// Like [`get`](Self::get) but reports the missing scheme
    pub fn require(&self, index: u32) -> Result<Arc<SchemeDescriptor>> {
        if index as usize >= self.slots.len() {
            return Err(AssetError::SchemeOutOfRange(index));
        }
        self.get(index).ok_or(AssetError::UnknownScheme(index))
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn defined_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Text(String);

    fn text_scheme() -> SchemeDescriptor {
        SchemeDescriptor::new(|ctx: &mut LoadContext<'_, Text>| {
            let content = std::str::from_utf8(ctx.bytes())
                .map_err(|e| AssetError::Decode(format!("UTF-8 decode error: {e}")))?;
            Ok(Text(content.to_string()))
        })
    }

    #[test]
    fn test_descriptor_records_payload_type() {
        let scheme = text_scheme();
        assert!(scheme.is::<Text>());
        assert!(!scheme.is::<String>());
        assert!(scheme.payload_type_name().ends_with("Text"));
        assert_eq!(scheme.worker_role(), None);
    }

    #[test]
    fn test_erased_load_produces_typed_payload() {
        let scheme = text_scheme();
        let id = AssetId::new(3).unwrap();
        let mut deps = Dependencies::new();
        let payload = scheme.load(id, b"hello", None, None, &mut deps).unwrap();
        assert_eq!((*payload).downcast_ref::<Text>(), Some(&Text("hello".into())));

        let err = scheme.load(id, &[0xff, 0xfe], None, None, &mut deps);
        assert!(matches!(err, Err(AssetError::Decode(_))));
    }

    #[test]
    fn test_depend_on_skips_self_and_duplicates() {
        let scheme = SchemeDescriptor::new(|ctx: &mut LoadContext<'_, u32>| {
            let own = ctx.id();
            ctx.depend_on(own);
            ctx.depend_on(AssetId::new(10).unwrap());
            ctx.depend_on(AssetId::new(10).unwrap());
            Ok(ctx.dependencies().len() as u32)
        });
        let mut deps = Dependencies::new();
        let payload = scheme
            .load(AssetId::new(1).unwrap(), b"", None, None, &mut deps)
            .unwrap();
        assert_eq!((*payload).downcast_ref::<u32>(), Some(&1));
        assert_eq!(deps.as_slice(), &[AssetId::new(10).unwrap()]);
    }

    #[test]
    fn test_previous_payload_is_visible_on_reload() {
        let scheme = SchemeDescriptor::new(|ctx: &mut LoadContext<'_, u32>| {
            Ok(ctx.previous().copied().unwrap_or(0) + 1)
        });
        let id = AssetId::new(1).unwrap();
        let mut deps = Dependencies::new();
        let first = scheme.load(id, b"", None, None, &mut deps).unwrap();
        let second = scheme.load(id, b"", Some(&first), None, &mut deps).unwrap();
        assert_eq!((*second).downcast_ref::<u32>(), Some(&2));
    }

    #[test]
    fn test_missing_decompressor_is_decode_error() {
        let scheme = text_scheme();
        assert!(matches!(scheme.decompress(b"x"), Err(AssetError::Decode(_))));

        let scheme = text_scheme().with_decompress(|bytes| Ok(bytes.iter().rev().copied().collect()));
        assert_eq!(scheme.decompress(b"abc").unwrap(), b"cba".to_vec());
    }

    #[test]
    fn test_registry_rejects_redefinition() {
        let mut registry = SchemeRegistry::new(4, 2);
        registry.define(1, text_scheme()).unwrap();
        assert_eq!(
            registry.define(1, text_scheme()).unwrap_err(),
            AssetError::SchemeAlreadyDefined(1)
        );
        assert_eq!(
            registry.define(9, text_scheme()).unwrap_err(),
            AssetError::SchemeOutOfRange(9)
        );
        assert_eq!(
            registry
                .define(2, text_scheme().on_role(RoleId(5)))
                .unwrap_err(),
            AssetError::UnknownRole(RoleId(5))
        );
        assert_eq!(registry.defined_count(), 1);
        assert!(registry.get(1).is_some());
        assert_eq!(registry.require(0).unwrap_err(), AssetError::UnknownScheme(0));
    }
}
