use bytes::Bytes;

use super::keyspace;
use crate::db::{DbGuard, Name};
use crate::error::CommandError;
use crate::number;

/// A hash stored as one ordered map per key.
pub struct Hash {
    key: Bytes,
    name: Name,
}

impl Hash {
    pub fn new(key: Bytes) -> Hash {
        let name = Name::Hash(key.clone());
        Hash { key, name }
    }

    /// Returns whether `field` is new.
    pub fn set(&self, db: &mut DbGuard, field: Bytes, value: Bytes) -> Result<bool, CommandError> {
        keyspace::register(db, &self.key)?;
        Ok(db.put(&self.name, field, value)?.is_none())
    }

    pub fn set_if_absent(
        &self,
        db: &mut DbGuard,
        field: Bytes,
        value: Bytes,
    ) -> Result<bool, CommandError> {
        if self.get(db, &field)?.is_some() {
            return Ok(false);
        }
        self.set(db, field, value)
    }

    pub fn set_all(&self, db: &mut DbGuard, pairs: Vec<(Bytes, Bytes)>) -> Result<(), CommandError> {
        for (field, value) in pairs {
            self.set(db, field, value)?;
        }
        Ok(())
    }

    pub fn get(&self, db: &DbGuard, field: &[u8]) -> Result<Option<Bytes>, CommandError> {
        Ok(db
            .map(&self.name)?
            .and_then(|fields| fields.get(field))
            .cloned())
    }

    pub fn get_all(&self, db: &DbGuard, fields: &[Bytes]) -> Result<Vec<Option<Bytes>>, CommandError> {
        fields.iter().map(|field| self.get(db, field)).collect()
    }

    pub fn exists(&self, db: &DbGuard, field: &[u8]) -> Result<bool, CommandError> {
        Ok(self.get(db, field)?.is_some())
    }

    /// Returns how many of `fields` existed.
    pub fn delete(&self, db: &mut DbGuard, fields: &[Bytes]) -> Result<usize, CommandError> {
        let mut removed = 0;
        for field in fields {
            if db.delete(&self.name, field)?.is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.drop_if_empty(db)?;
        }
        Ok(removed)
    }

    pub fn len(&self, db: &DbGuard) -> usize {
        db.len(&self.name)
    }

    /// Field and value pairs in field order.
    pub fn entries(&self, db: &DbGuard) -> Result<Vec<(Bytes, Bytes)>, CommandError> {
        Ok(db
            .map(&self.name)?
            .map(|fields| {
                fields
                    .iter()
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn fields(&self, db: &DbGuard) -> Result<Vec<Bytes>, CommandError> {
        Ok(db
            .map(&self.name)?
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default())
    }

    pub fn values(&self, db: &DbGuard) -> Result<Vec<Bytes>, CommandError> {
        Ok(db
            .map(&self.name)?
            .map(|fields| fields.values().cloned().collect())
            .unwrap_or_default())
    }

    pub fn incr_by(&self, db: &mut DbGuard, field: Bytes, delta: i64) -> Result<i64, CommandError> {
        let current = match self.get(db, &field)? {
            Some(value) => number::parse_integer(&value)?,
            None => 0,
        };
        let value = current.checked_add(delta).ok_or(CommandError::Overflow)?;

        self.set(db, field, number::format_integer(value))?;
        Ok(value)
    }

    pub fn incr_by_float(&self, db: &mut DbGuard, field: Bytes, delta: f64) -> Result<f64, CommandError> {
        let current = match self.get(db, &field)? {
            Some(value) => number::parse_float(&value)?,
            None => 0.0,
        };
        let value = current + delta;
        if !value.is_finite() {
            return Err(CommandError::NotFinite);
        }

        self.set(db, field, number::format_float(value))?;
        Ok(value)
    }

    fn drop_if_empty(&self, db: &mut DbGuard) -> Result<(), CommandError> {
        if self.len(db) == 0 {
            db.drop_collection(&self.name)?;
            keyspace::unregister(db, &self.key)?;
        }
        Ok(())
    }
}
