//! Two-tier object cache.
//!
//! The persistent tier maps `(type, primary key)` to the live instance last
//! saved or read, together with a fingerprint of its mapped state. The
//! mapper compares fingerprints to skip writes for unchanged objects.
//!
//! The temporary tier is a scratch list that lives for one materialization
//! pass. An object is registered there as soon as it is allocated, before
//! its relationships are populated, so a cycle that leads back to it finds
//! the instance in progress instead of reading it again.

use relmap_core::{Entity, Member, ObjectRef, Result, Value, describe_type};
use sha2::{Digest, Sha256};
use std::any::TypeId;
use std::collections::HashMap;

/// Identity of a cached object: its entity type and its primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    type_id: TypeId,
    pk: Vec<u8>,
}

impl ObjectKey {
    /// Key of the object of `entity` whose primary key is `key`.
    ///
    /// The key is held in its canonical encoding, where integer keys compare
    /// by numeric value, so program and column forms of the same key match.
    pub fn new(entity: &Entity, key: &Value) -> Self {
        Self {
            type_id: entity.type_id(),
            pk: key.canonical(),
        }
    }

    /// Key of a live object viewed as `entity`.
    pub fn of(entity: &Entity, object: &ObjectRef) -> Result<Self> {
        Ok(Self::new(entity, &entity.key_of(object)?))
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Canonical encoding of the primary key.
    pub fn pk(&self) -> &[u8] {
        &self.pk
    }
}

/// Object cache used by a [`crate::Mapper`].
///
/// Every lookup is scoped by entity. An object saved through a derived type
/// is also stored under each ancestor entity, because each level of the
/// inheritance chain is written and change-checked separately.
pub trait Cache {
    /// Store `object` as the current state of its row in `entity`'s table.
    fn put(&mut self, entity: &Entity, object: &ObjectRef) -> Result<()>;

    /// The cached instance for `key`, if it is of the concrete type
    /// `entity` maps.
    fn get(&self, entity: &Entity, key: &Value) -> Option<ObjectRef>;

    fn contains(&self, entity: &Entity, key: &Value) -> bool;

    /// Is a version of `object` (same type and key) cached?
    fn contains_object(&self, entity: &Entity, object: &ObjectRef) -> Result<bool>;

    fn delete(&mut self, entity: &Entity, key: &Value);

    /// Has `object` changed since it was last put?
    ///
    /// Objects that were never cached count as changed.
    fn object_changed(&self, entity: &Entity, object: &ObjectRef) -> Result<bool>;

    fn put_temp(&mut self, entity: &Entity, key: &Value, object: ObjectRef);

    fn get_temp(&self, entity: &Entity, key: &Value) -> Option<ObjectRef>;

    fn clear_temp(&mut self);

    /// Drop every persistent entry.
    fn clear(&mut self);
}

#[derive(Debug)]
struct CacheEntry {
    object: ObjectRef,
    fingerprint: String,
}

/// Default [`Cache`]: a hash map of fingerprinted entries plus a
/// linear-scan temporary list.
#[derive(Debug, Default)]
pub struct ObjectCache {
    entries: HashMap<ObjectKey, CacheEntry>,
    temp: Vec<(ObjectKey, ObjectRef)>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persistent entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn temp_len(&self) -> usize {
        self.temp.len()
    }
}

impl Cache for ObjectCache {
    fn put(&mut self, entity: &Entity, object: &ObjectRef) -> Result<()> {
        let key = ObjectKey::of(entity, object)?;
        let fingerprint = fingerprint(entity, object)?;
        tracing::trace!(
            entity = entity.name(),
            fingerprint = %fingerprint,
            "Cached object"
        );
        self.entries.insert(
            key,
            CacheEntry {
                object: object.clone(),
                fingerprint,
            },
        );
        Ok(())
    }

    fn get(&self, entity: &Entity, key: &Value) -> Option<ObjectRef> {
        self.entries
            .get(&ObjectKey::new(entity, key))
            .filter(|entry| entry.object.type_id() == entity.type_id())
            .map(|entry| entry.object.clone())
    }

    fn contains(&self, entity: &Entity, key: &Value) -> bool {
        self.entries.contains_key(&ObjectKey::new(entity, key))
    }

    fn contains_object(&self, entity: &Entity, object: &ObjectRef) -> Result<bool> {
        Ok(self.entries.contains_key(&ObjectKey::of(entity, object)?))
    }

    fn delete(&mut self, entity: &Entity, key: &Value) {
        self.entries.remove(&ObjectKey::new(entity, key));
    }

    fn object_changed(&self, entity: &Entity, object: &ObjectRef) -> Result<bool> {
        let Some(entry) = self.entries.get(&ObjectKey::of(entity, object)?) else {
            return Ok(true);
        };
        let changed = entry.fingerprint != fingerprint(entity, object)?;
        tracing::trace!(entity = entity.name(), changed, "Checked object fingerprint");
        Ok(changed)
    }

    fn put_temp(&mut self, entity: &Entity, key: &Value, object: ObjectRef) {
        self.temp.push((ObjectKey::new(entity, key), object));
    }

    fn get_temp(&self, entity: &Entity, key: &Value) -> Option<ObjectRef> {
        let wanted = ObjectKey::new(entity, key);
        self.temp
            .iter()
            .find(|(key, object)| *key == wanted && object.type_id() == entity.type_id())
            .map(|(_, object)| object.clone())
    }

    fn clear_temp(&mut self) {
        self.temp.clear();
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// SHA-256 fingerprint of the mapped state of `object` seen as `entity`.
///
/// Every internal field contributes its position and the canonical encoding
/// of its column value, NULL included; references contribute their target's
/// key. Every relationship collection contributes its position, its length
/// and the keys of its members in order.
pub fn fingerprint(entity: &Entity, object: &ObjectRef) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = Vec::new();

    for (index, field) in entity.internals().enumerate() {
        buf.clear();
        buf.push(b'i');
        buf.extend_from_slice(&(index as u64).to_le_bytes());
        field.column_value(object)?.write_canonical(&mut buf);
        hasher.update(&buf);
    }

    for (index, field) in entity.externals().enumerate() {
        let Member::List(items) = field.read(object)? else {
            continue;
        };
        let Some(target) = field.target() else {
            continue;
        };
        let target = describe_type(target)?;
        buf.clear();
        buf.push(b'e');
        buf.extend_from_slice(&(index as u64).to_le_bytes());
        buf.extend_from_slice(&(items.len() as u64).to_le_bytes());
        for item in &items {
            target.key_of(item)?.write_canonical(&mut buf);
        }
        hasher.update(&buf);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}
