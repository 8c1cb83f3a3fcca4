use bytes::Bytes;

use super::keyspace;
use crate::db::{DbGuard, Name};
use crate::error::CommandError;

/// An unordered set stored as one ordered set of members per key.
pub struct Set {
    key: Bytes,
    name: Name,
}

impl Set {
    pub fn new(key: Bytes) -> Set {
        let name = Name::Set(key.clone());
        Set { key, name }
    }

    /// Returns how many members were new.
    pub fn add(&self, db: &mut DbGuard, members: Vec<Bytes>) -> Result<usize, CommandError> {
        keyspace::register(db, &self.key)?;

        let mut added = 0;
        for member in members {
            if db.insert(&self.name, member)? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn contains(&self, db: &DbGuard, member: &[u8]) -> Result<bool, CommandError> {
        Ok(db.contains(&self.name, member)?)
    }

    pub fn len(&self, db: &DbGuard) -> usize {
        db.len(&self.name)
    }

    pub fn members(&self, db: &DbGuard) -> Result<Vec<Bytes>, CommandError> {
        Ok(db
            .set(&self.name)?
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Returns how many of `members` were present.
    pub fn remove(&self, db: &mut DbGuard, members: &[Bytes]) -> Result<usize, CommandError> {
        let mut removed = 0;
        for member in members {
            if db.remove(&self.name, member)? {
                removed += 1;
            }
        }

        if removed > 0 && self.len(db) == 0 {
            db.drop_collection(&self.name)?;
            keyspace::unregister(db, &self.key)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::Backend;
    use crate::store::Store;
    use bytes::Bytes;

    fn b(s: &'static str) -> Bytes {
        Bytes::from(s)
    }

    #[test]
    fn add_counts_new_members() {
        let store = Store::memory();

        assert_eq!(store.sadd(b("s"), vec![b("a"), b("b"), b("a")]).unwrap(), 2);
        assert_eq!(store.sadd(b("s"), vec![b("b"), b("c")]).unwrap(), 1);
        assert_eq!(store.scard(b("s")).unwrap(), 3);
        assert!(store.sismember(b("s"), b("c")).unwrap());
        assert!(!store.sismember(b("s"), b("x")).unwrap());
        assert!(!store.sismember(b("missing"), b("x")).unwrap());
    }

    #[test]
    fn members_are_listed_in_byte_order() {
        let store = Store::memory();

        store.sadd(b("s"), vec![b("c"), b("a"), b("b")]).unwrap();
        assert_eq!(store.smembers(b("s")).unwrap(), vec![b("a"), b("b"), b("c")]);
        assert!(store.smembers(b("missing")).unwrap().is_empty());
    }

    #[test]
    fn remove_counts_and_drops_the_key() {
        let store = Store::memory();

        store.sadd(b("s"), vec![b("a"), b("b")]).unwrap();
        assert_eq!(store.srem(b("s"), vec![b("a"), b("x")]).unwrap(), 1);
        assert!(store.exists(b("s")).unwrap());
        assert_eq!(store.srem(b("s"), vec![b("b")]).unwrap(), 1);
        assert!(!store.exists(b("s")).unwrap());
        assert_eq!(store.srem(b("s"), vec![b("b")]).unwrap(), 0);
    }
}
