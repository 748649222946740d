//! Map and set interception.
//!
//! Collections track structural reads under the iteration sentinels:
//! `size`, `entries`, and `members` read the whole shape, so they subscribe
//! to [`DepKey::Iterate`]; a map's `map_keys` subscribes to
//! [`DepKey::MapKeyIterate`], which add/delete invalidates but plain value
//! sets do not. `clear` dispatches the clear event, invalidating every
//! subscriber of the container.

use crate::container::{ContainerData, ContainerKind};
use crate::error::{AccessError, AccessResult};
use crate::observe::{AccessMode, Observed};
use crate::track::{self, DepKey, TrackOp, TriggerOp};
use crate::value::{same_value, MapKey, Value};

impl Observed {
    fn expect_collection(&self) -> AccessResult<()> {
        match self.kind() {
            ContainerKind::Map | ContainerKind::Set => Ok(()),
            found => Err(AccessError::KindMismatch {
                expected: ContainerKind::Map,
                found,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Maps
// ---------------------------------------------------------------------------

impl Observed {
    /// Read the value stored under `key`. Missing entries read as `Null`.
    pub fn entry(&self, key: &MapKey) -> AccessResult<Value> {
        self.expect_kind(ContainerKind::Map)?;
        let raw = {
            let data = self.raw_data();
            match &*data {
                ContainerData::Map(map) => map.get(key).cloned().unwrap_or(Value::Null),
                _ => unreachable!(),
            }
        };
        Ok(self.read_value(DepKey::Entry(key.clone()), raw))
    }

    /// Store a value under `key`. Adding a new key notifies both iteration
    /// sentinels; overwriting notifies the entry and the generic sentinel.
    pub fn insert(&self, key: MapKey, value: impl Into<Value>) -> AccessResult<()> {
        self.expect_kind(ContainerKind::Map)?;
        if self.mode().is_readonly() {
            tracing::warn!(target_id = self.id().raw(), %key, "insert on read-only view ignored");
            return Ok(());
        }
        let mut value = value.into();
        if self.mode() != AccessMode::Raw && !self.mode().is_shallow() {
            value = value.into_raw();
        }
        let old = {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Map(map) => map.insert(key.clone(), value.clone()),
                _ => unreachable!(),
            }
        };
        if self.mode() == AccessMode::Raw {
            return Ok(());
        }
        match &old {
            None => track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Add,
                Some(DepKey::Entry(key)),
                Some(&value),
                None,
            ),
            Some(old) if !same_value(&value, old) => track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Set,
                Some(DepKey::Entry(key)),
                Some(&value),
                Some(old),
            ),
            Some(_) => {}
        }
        Ok(())
    }

    /// Remove the entry under `key`, returning the removed raw value.
    pub fn remove_entry(&self, key: &MapKey) -> AccessResult<Option<Value>> {
        self.expect_kind(ContainerKind::Map)?;
        if self.mode().is_readonly() {
            tracing::warn!(target_id = self.id().raw(), %key, "remove on read-only view ignored");
            return Ok(None);
        }
        let removed = {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Map(map) => map.shift_remove(key),
                _ => unreachable!(),
            }
        };
        if self.mode() == AccessMode::Raw {
            return Ok(removed);
        }
        if let Some(old) = &removed {
            track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Delete,
                Some(DepKey::Entry(key.clone())),
                None,
                Some(old),
            );
        }
        Ok(removed)
    }

    /// Existence check for a map key. Tracks on every observed view.
    pub fn has_entry(&self, key: &MapKey) -> AccessResult<bool> {
        self.expect_kind(ContainerKind::Map)?;
        if self.mode() != AccessMode::Raw {
            track::track(self.id(), TrackOp::Has, DepKey::Entry(key.clone()));
        }
        let data = self.raw_data();
        match &*data {
            ContainerData::Map(map) => Ok(map.contains_key(key)),
            _ => unreachable!(),
        }
    }

    /// Enumerate the map's keys. Subscribes to the map-key sentinel, which
    /// only add/delete invalidates.
    pub fn map_keys(&self) -> AccessResult<Vec<MapKey>> {
        self.expect_kind(ContainerKind::Map)?;
        if self.mode().tracks() {
            track::track(self.id(), TrackOp::Iterate, DepKey::MapKeyIterate);
        }
        let data = self.raw_data();
        match &*data {
            ContainerData::Map(map) => Ok(map.keys().cloned().collect()),
            _ => unreachable!(),
        }
    }

    /// Snapshot the map's entries, values converted per the handle's mode.
    pub fn entries(&self) -> AccessResult<Vec<(MapKey, Value)>> {
        self.expect_kind(ContainerKind::Map)?;
        if self.mode().tracks() {
            track::track(self.id(), TrackOp::Iterate, DepKey::Iterate);
        }
        let raws: Vec<(MapKey, Value)> = {
            let data = self.raw_data();
            match &*data {
                ContainerData::Map(map) => {
                    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
                }
                _ => unreachable!(),
            }
        };
        Ok(raws
            .into_iter()
            .map(|(k, raw)| (k, self.convert_stored(raw)))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Sets
// ---------------------------------------------------------------------------

impl Observed {
    /// Add a member to the set.
    pub fn add(&self, member: MapKey) -> AccessResult<()> {
        self.expect_kind(ContainerKind::Set)?;
        if self.mode().is_readonly() {
            tracing::warn!(target_id = self.id().raw(), %member, "add on read-only view ignored");
            return Ok(());
        }
        let inserted = {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Set(set) => set.insert(member.clone()),
                _ => unreachable!(),
            }
        };
        if inserted && self.mode() != AccessMode::Raw {
            let as_value = Value::from(member.clone());
            track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Add,
                Some(DepKey::Entry(member)),
                Some(&as_value),
                None,
            );
        }
        Ok(())
    }

    /// Existence check for a set member. Tracks on every observed view.
    pub fn has_member(&self, member: &MapKey) -> AccessResult<bool> {
        self.expect_kind(ContainerKind::Set)?;
        if self.mode() != AccessMode::Raw {
            track::track(self.id(), TrackOp::Has, DepKey::Entry(member.clone()));
        }
        let data = self.raw_data();
        match &*data {
            ContainerData::Set(set) => Ok(set.contains(member)),
            _ => unreachable!(),
        }
    }

    /// Remove a member, reporting whether it was present.
    pub fn remove_member(&self, member: &MapKey) -> AccessResult<bool> {
        self.expect_kind(ContainerKind::Set)?;
        if self.mode().is_readonly() {
            tracing::warn!(target_id = self.id().raw(), %member, "remove on read-only view ignored");
            return Ok(false);
        }
        let removed = {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Set(set) => set.shift_remove(member),
                _ => unreachable!(),
            }
        };
        if removed && self.mode() != AccessMode::Raw {
            let old = Value::from(member.clone());
            track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Delete,
                Some(DepKey::Entry(member.clone())),
                None,
                Some(&old),
            );
        }
        Ok(removed)
    }

    /// Snapshot the set's members.
    pub fn members(&self) -> AccessResult<Vec<MapKey>> {
        self.expect_kind(ContainerKind::Set)?;
        if self.mode().tracks() {
            track::track(self.id(), TrackOp::Iterate, DepKey::Iterate);
        }
        let data = self.raw_data();
        match &*data {
            ContainerData::Set(set) => Ok(set.iter().cloned().collect()),
            _ => unreachable!(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared (maps and sets)
// ---------------------------------------------------------------------------

impl Observed {
    /// The number of entries or members. Subscribes to the iteration
    /// sentinel on reactive views.
    pub fn size(&self) -> AccessResult<usize> {
        self.expect_collection()?;
        if self.mode().tracks() {
            track::track(self.id(), TrackOp::Iterate, DepKey::Iterate);
        }
        let data = self.raw_data();
        match &*data {
            ContainerData::Map(map) => Ok(map.len()),
            ContainerData::Set(set) => Ok(set.len()),
            _ => unreachable!(),
        }
    }

    /// Empty the collection, invalidating every subscriber of the target.
    pub fn clear(&self) -> AccessResult<()> {
        self.expect_collection()?;
        if self.mode().is_readonly() {
            tracing::warn!(target_id = self.id().raw(), "clear on read-only view ignored");
            return Ok(());
        }
        let had_items = {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Map(map) => {
                    let had = !map.is_empty();
                    map.clear();
                    had
                }
                ContainerData::Set(set) => {
                    let had = !set.is_empty();
                    set.clear();
                    had
                }
                _ => unreachable!(),
            }
        };
        if had_items && self.mode() != AccessMode::Raw {
            track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Clear,
                None,
                None,
                None,
            );
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
