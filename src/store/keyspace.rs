//! Top-level keys and scalar values.
//!
//! Every live key, whatever it holds, is a member of the `Keys` set. Scalars live in the `Values`
//! map; structures register their key when first written and unregister it once emptied.

use bytes::Bytes;

use super::pattern;
use crate::db::{DbGuard, Name};
use crate::error::CommandError;
use crate::number;

pub fn contains(db: &DbGuard, key: &[u8]) -> Result<bool, CommandError> {
    Ok(db.contains(&Name::Keys, key)?)
}

pub fn register(db: &mut DbGuard, key: &Bytes) -> Result<(), CommandError> {
    db.insert(&Name::Keys, key.clone())?;
    Ok(())
}

pub fn unregister(db: &mut DbGuard, key: &Bytes) -> Result<(), CommandError> {
    db.remove(&Name::Keys, key)?;
    Ok(())
}

pub fn keys(db: &DbGuard, pattern: &[u8]) -> Result<Vec<Bytes>, CommandError> {
    let keys = match db.set(&Name::Keys)? {
        Some(keys) => keys
            .iter()
            .filter(|key| pattern::matches(key, pattern))
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    Ok(keys)
}

/// Fails with a wrong-type error when `key` holds a structure.
pub fn get(db: &DbGuard, key: &[u8]) -> Result<Option<Bytes>, CommandError> {
    if let Some(value) = db.map(&Name::Values)?.and_then(|values| values.get(key)) {
        return Ok(Some(value.clone()));
    }
    if contains(db, key)? {
        return Err(CommandError::WrongType);
    }
    Ok(None)
}

pub fn set(db: &mut DbGuard, key: Bytes, value: Bytes) -> Result<(), CommandError> {
    register(db, &key)?;
    db.put(&Name::Values, key, value)?;
    Ok(())
}

/// Deletes keys of any kind, returning how many existed.
pub fn del(db: &mut DbGuard, keys: &[Bytes]) -> Result<usize, CommandError> {
    let mut removed = 0;

    for key in keys {
        let mut existed = db.delete(&Name::Values, key)?.is_some();
        for name in structures(key) {
            existed |= db.drop_collection(&name)?;
        }
        unregister(db, key)?;

        if existed {
            removed += 1;
        }
    }

    Ok(removed)
}

pub fn incr_by(db: &mut DbGuard, key: Bytes, delta: i64) -> Result<i64, CommandError> {
    let current = match get(db, &key)? {
        Some(value) => number::parse_integer(&value)?,
        None => 0,
    };
    let value = current.checked_add(delta).ok_or(CommandError::Overflow)?;

    set(db, key, number::format_integer(value))?;
    Ok(value)
}

pub fn incr_by_float(db: &mut DbGuard, key: Bytes, delta: f64) -> Result<f64, CommandError> {
    let current = match get(db, &key)? {
        Some(value) => number::parse_float(&value)?,
        None => 0.0,
    };
    let value = current + delta;
    if !value.is_finite() {
        return Err(CommandError::NotFinite);
    }

    set(db, key, number::format_float(value))?;
    Ok(value)
}

fn structures(key: &Bytes) -> [Name; 4] {
    [
        Name::Hash(key.clone()),
        Name::Set(key.clone()),
        Name::ZMembers(key.clone()),
        Name::ZScores(key.clone()),
    ]
}
