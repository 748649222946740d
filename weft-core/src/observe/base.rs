//! Object and array interception.
//!
//! Every read funnels through [`Observed::read_value`], which implements
//! the read contract once for all modes: shallow modes track and return the
//! raw nested value; deep modes track, unwrap stored cells (arrays keep the
//! cell itself, index access does not auto-unwrap), and lazily wrap nested
//! containers in the parent's mode. Writes unwrap incoming values to raw in
//! deep mode, route cell-in-place updates through the cell's own setter,
//! detect add-vs-set, and suppress notification for `same_value`-equal
//! stores.

use crate::container::{ContainerData, ContainerKind};
use crate::error::AccessResult;
use crate::observe::{AccessMode, Observed};
use crate::track::{self, DepKey, TrackOp, TriggerOp};
use crate::value::{same_value, Value};

impl Observed {
    /// Convert a stored raw value into what a read through this handle
    /// returns, tracking `key` as appropriate for the mode.
    pub(super) fn read_value(&self, key: DepKey, raw: Value) -> Value {
        match self.mode() {
            AccessMode::Raw => raw,
            AccessMode::ShallowReactive => {
                track::track(self.id(), TrackOp::Get, key);
                raw
            }
            AccessMode::ShallowReadonly => raw,
            AccessMode::Reactive | AccessMode::Readonly => {
                if let Value::Cell(cell) = &raw {
                    if self.kind() == ContainerKind::Array {
                        // index access hands back the cell itself
                        if self.mode().tracks() {
                            track::track(self.id(), TrackOp::Get, key);
                        }
                        return raw;
                    }
                    // the cell's own getter performs the tracking
                    return cell.get();
                }
                if self.mode().tracks() {
                    track::track(self.id(), TrackOp::Get, key);
                }
                match raw {
                    Value::Container(nested) => {
                        Value::Container(nested.wrap_as(self.mode().child_mode()))
                    }
                    other => other,
                }
            }
        }
    }

    /// Like [`read_value`](Observed::read_value) but without per-key
    /// tracking, for iteration results already covered by a sentinel.
    pub(super) fn convert_stored(&self, raw: Value) -> Value {
        match self.mode() {
            AccessMode::Reactive | AccessMode::Readonly => match raw {
                Value::Container(nested) => {
                    Value::Container(nested.wrap_as(self.mode().child_mode()))
                }
                other => other,
            },
            _ => raw,
        }
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

impl Observed {
    /// Read a property. Missing keys read as `Null`.
    pub fn get(&self, key: &str) -> AccessResult<Value> {
        self.expect_kind(ContainerKind::Object)?;
        let raw = {
            let data = self.raw_data();
            match &*data {
                ContainerData::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
                _ => unreachable!(),
            }
        };
        Ok(self.read_value(DepKey::Prop(key.to_string()), raw))
    }

    /// Write a property, notifying subscribers of the key and, for newly
    /// added keys, of the iteration sentinel.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> AccessResult<()> {
        self.expect_kind(ContainerKind::Object)?;
        if self.mode().is_readonly() {
            tracing::warn!(target_id = self.id().raw(), key, "set on read-only view ignored");
            return Ok(());
        }
        let mut value = value.into();

        if self.mode() == AccessMode::Raw {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Object(map) => {
                    map.insert(key.to_string(), value);
                }
                _ => unreachable!(),
            }
            return Ok(());
        }

        let deep = !self.mode().is_shallow();
        if deep {
            value = value.into_raw();
        }

        let old = {
            let data = self.raw_data();
            match &*data {
                ContainerData::Object(map) => map.get(key).cloned(),
                _ => unreachable!(),
            }
        };

        // An existing cell absorbs a non-cell write in place, preserving the
        // cell's identity for other holders; its setter notifies.
        if deep {
            if let Some(Value::Cell(cell)) = &old {
                if !matches!(value, Value::Cell(_)) {
                    cell.set(value);
                    return Ok(());
                }
            }
        }

        {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Object(map) => {
                    map.insert(key.to_string(), value.clone());
                }
                _ => unreachable!(),
            }
        }

        match &old {
            None => track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Add,
                Some(DepKey::Prop(key.to_string())),
                Some(&value),
                None,
            ),
            Some(old) if !same_value(&value, old) => track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Set,
                Some(DepKey::Prop(key.to_string())),
                Some(&value),
                Some(old),
            ),
            Some(_) => {}
        }
        Ok(())
    }

    /// Delete a property, returning the removed raw value.
    pub fn remove(&self, key: &str) -> AccessResult<Option<Value>> {
        self.expect_kind(ContainerKind::Object)?;
        if self.mode().is_readonly() {
            tracing::warn!(target_id = self.id().raw(), key, "remove on read-only view ignored");
            return Ok(None);
        }
        let removed = {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Object(map) => map.shift_remove(key),
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
                Some(DepKey::Prop(key.to_string())),
                None,
                Some(old),
            );
        }
        Ok(removed)
    }

    /// Existence check. Tracks on every observed view, including read-only.
    pub fn has(&self, key: &str) -> AccessResult<bool> {
        self.expect_kind(ContainerKind::Object)?;
        if self.mode() != AccessMode::Raw {
            track::track(self.id(), TrackOp::Has, DepKey::Prop(key.to_string()));
        }
        let data = self.raw_data();
        match &*data {
            ContainerData::Object(map) => Ok(map.contains_key(key)),
            _ => unreachable!(),
        }
    }

    /// Enumerate property names. Tracks the iteration sentinel on every
    /// observed view, including read-only.
    pub fn keys(&self) -> AccessResult<Vec<String>> {
        self.expect_kind(ContainerKind::Object)?;
        if self.mode() != AccessMode::Raw {
            track::track(self.id(), TrackOp::Iterate, DepKey::Iterate);
        }
        let data = self.raw_data();
        match &*data {
            ContainerData::Object(map) => Ok(map.keys().cloned().collect()),
            _ => unreachable!(),
        }
    }
}

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

impl Observed {
    /// Read an element. Out-of-bounds indices read as `Null`.
    pub fn index(&self, index: usize) -> AccessResult<Value> {
        self.expect_kind(ContainerKind::Array)?;
        let raw = {
            let data = self.raw_data();
            match &*data {
                ContainerData::Array(items) => items.get(index).cloned().unwrap_or(Value::Null),
                _ => unreachable!(),
            }
        };
        Ok(self.read_value(DepKey::Index(index), raw))
    }

    /// Write an element. Writing at or past the current length grows the
    /// array (gaps fill with `Null`) and counts as an add, which also
    /// notifies `length` subscribers.
    pub fn set_index(&self, index: usize, value: impl Into<Value>) -> AccessResult<()> {
        self.expect_kind(ContainerKind::Array)?;
        if self.mode().is_readonly() {
            tracing::warn!(target_id = self.id().raw(), index, "set on read-only view ignored");
            return Ok(());
        }
        let mut value = value.into();
        if self.mode() != AccessMode::Raw && !self.mode().is_shallow() {
            value = value.into_raw();
        }

        let old = {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Array(items) => {
                    if index < items.len() {
                        let old = items[index].clone();
                        items[index] = value.clone();
                        Some(old)
                    } else {
                        items.resize(index, Value::Null);
                        items.push(value.clone());
                        None
                    }
                }
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
                Some(DepKey::Index(index)),
                Some(&value),
                None,
            ),
            Some(old) if !same_value(&value, old) => track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Set,
                Some(DepKey::Index(index)),
                Some(&value),
                Some(old),
            ),
            Some(_) => {}
        }
        Ok(())
    }

    /// Append an element.
    pub fn push(&self, value: impl Into<Value>) -> AccessResult<()> {
        self.expect_kind(ContainerKind::Array)?;
        if self.mode().is_readonly() {
            tracing::warn!(target_id = self.id().raw(), "push on read-only view ignored");
            return Ok(());
        }
        let mut value = value.into();
        if self.mode() != AccessMode::Raw && !self.mode().is_shallow() {
            value = value.into_raw();
        }
        let index = {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Array(items) => {
                    items.push(value.clone());
                    items.len() - 1
                }
                _ => unreachable!(),
            }
        };
        if self.mode() != AccessMode::Raw {
            track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Add,
                Some(DepKey::Index(index)),
                Some(&value),
                None,
            );
        }
        Ok(())
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> AccessResult<Option<Value>> {
        self.expect_kind(ContainerKind::Array)?;
        if self.mode().is_readonly() {
            tracing::warn!(target_id = self.id().raw(), "pop on read-only view ignored");
            return Ok(None);
        }
        let popped = {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Array(items) => {
                    let old = items.pop();
                    old.map(|old| (items.len(), old))
                }
                _ => unreachable!(),
            }
        };
        let Some((index, old)) = popped else {
            return Ok(None);
        };
        if self.mode() != AccessMode::Raw {
            track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Delete,
                Some(DepKey::Index(index)),
                None,
                Some(&old),
            );
        }
        Ok(Some(old))
    }

    /// The current length. Tracks the `length` key on reactive views.
    pub fn len(&self) -> AccessResult<usize> {
        self.expect_kind(ContainerKind::Array)?;
        if self.mode().tracks() {
            track::track(self.id(), TrackOp::Get, DepKey::Length);
        }
        let data = self.raw_data();
        match &*data {
            ContainerData::Array(items) => Ok(items.len()),
            _ => unreachable!(),
        }
    }

    /// Whether the array is empty. Tracks like [`len`](Observed::len).
    pub fn is_empty(&self) -> AccessResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Resize the array, filling with `Null` on growth. Shrinking notifies
    /// `length` subscribers and every index at or beyond the new length.
    pub fn set_len(&self, new_len: usize) -> AccessResult<()> {
        self.expect_kind(ContainerKind::Array)?;
        if self.mode().is_readonly() {
            tracing::warn!(target_id = self.id().raw(), "set_len on read-only view ignored");
            return Ok(());
        }
        let old_len = {
            let mut data = self.target().data_mut();
            match &mut *data {
                ContainerData::Array(items) => {
                    let old_len = items.len();
                    if new_len != old_len {
                        items.resize(new_len, Value::Null);
                    }
                    old_len
                }
                _ => unreachable!(),
            }
        };
        if new_len != old_len && self.mode() != AccessMode::Raw {
            track::trigger(
                self.id(),
                self.kind().into(),
                TriggerOp::Set,
                Some(DepKey::Length),
                Some(&Value::Int(new_len as i64)),
                Some(&Value::Int(old_len as i64)),
            );
        }
        Ok(())
    }

    /// Snapshot the elements, converted per the handle's mode. Tracks the
    /// `length` key and every index on reactive views.
    pub fn to_vec(&self) -> AccessResult<Vec<Value>> {
        self.expect_kind(ContainerKind::Array)?;
        if self.mode().tracks() {
            track::track(self.id(), TrackOp::Get, DepKey::Length);
        }
        let raws: Vec<Value> = {
            let data = self.raw_data();
            match &*data {
                ContainerData::Array(items) => items.clone(),
                _ => unreachable!(),
            }
        };
        Ok(raws
            .into_iter()
            .enumerate()
            .map(|(i, raw)| self.read_value(DepKey::Index(i), raw))
            .collect())
    }

    /// Whether the array contains `needle`. See
    /// [`index_of`](Observed::index_of) for the lookup rules.
    pub fn includes(&self, needle: &Value) -> AccessResult<bool> {
        Ok(self.search(needle, false)?.is_some())
    }

    /// Position of the first element equal to `needle`.
    ///
    /// Tracks a read on every index up to the current length. The search
    /// runs with the caller's value first; on a miss it retries with the
    /// value unwrapped to raw, because callers may hold an observed view of
    /// an element while the array stores the raw form.
    pub fn index_of(&self, needle: &Value) -> AccessResult<Option<usize>> {
        self.search(needle, false)
    }

    /// Position of the last element equal to `needle`. Same lookup rules as
    /// [`index_of`](Observed::index_of).
    pub fn last_index_of(&self, needle: &Value) -> AccessResult<Option<usize>> {
        self.search(needle, true)
    }

    fn search(&self, needle: &Value, from_end: bool) -> AccessResult<Option<usize>> {
        self.expect_kind(ContainerKind::Array)?;
        let raws: Vec<Value> = {
            let data = self.raw_data();
            match &*data {
                ContainerData::Array(items) => items.clone(),
                _ => unreachable!(),
            }
        };
        if self.mode() != AccessMode::Raw {
            for i in 0..raws.len() {
                track::track(self.id(), TrackOp::Get, DepKey::Index(i));
            }
        }
        let find = |wanted: &Value| {
            if from_end {
                raws.iter().rposition(|v| v == wanted)
            } else {
                raws.iter().position(|v| v == wanted)
            }
        };
        if let Some(found) = find(needle) {
            return Ok(Some(found));
        }
        let raw_needle = needle.clone().into_raw();
        if &raw_needle != needle {
            return Ok(find(&raw_needle));
        }
        Ok(None)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
