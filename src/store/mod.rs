mod hash;
mod keyspace;
mod pattern;
mod set;
mod sorted_set;

use bytes::Bytes;

use crate::backend::{Backend, Limit, Result};
use crate::db::{Db, DbGuard, ScoreBound};
use hash::Hash;
use set::Set;
use sorted_set::SortedSet;

/// The [`Backend`] built on the ordered key-value substrate.
///
/// Every operation takes the database lock once. Writes commit when the operation succeeds and
/// roll back when it fails, so no partial update is ever observable. Cloning is cheap.
#[derive(Clone, Default)]
pub struct Store {
    db: Db,
}

impl Store {
    pub fn new(db: Db) -> Store {
        Store { db }
    }

    pub fn memory() -> Store {
        Store::new(Db::memory())
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    fn read<T>(&self, op: impl FnOnce(&DbGuard) -> Result<T>) -> Result<T> {
        let db = self.db.lock();
        op(&db)
    }

    fn write<T>(&self, op: impl FnOnce(&mut DbGuard) -> Result<T>) -> Result<T> {
        let mut db = self.db.lock();
        let result = op(&mut db)?;
        db.commit()?;
        Ok(result)
    }
}

impl Backend for Store {
    fn keys(&self, pattern: Bytes) -> Result<Vec<Bytes>> {
        self.read(|db| keyspace::keys(db, &pattern))
    }

    fn exists(&self, key: Bytes) -> Result<bool> {
        self.read(|db| keyspace::contains(db, &key))
    }

    fn get(&self, key: Bytes) -> Result<Option<Bytes>> {
        self.read(|db| keyspace::get(db, &key))
    }

    fn set(&self, key: Bytes, value: Bytes) -> Result<()> {
        self.write(|db| keyspace::set(db, key, value))
    }

    fn del(&self, keys: Vec<Bytes>) -> Result<usize> {
        self.write(|db| keyspace::del(db, &keys))
    }

    fn incr_by(&self, key: Bytes, delta: i64) -> Result<i64> {
        self.write(|db| keyspace::incr_by(db, key, delta))
    }

    fn incr_by_float(&self, key: Bytes, delta: f64) -> Result<f64> {
        self.write(|db| keyspace::incr_by_float(db, key, delta))
    }

    fn hset(&self, key: Bytes, field: Bytes, value: Bytes) -> Result<bool> {
        self.write(|db| Hash::new(key).set(db, field, value))
    }

    fn hget(&self, key: Bytes, field: Bytes) -> Result<Option<Bytes>> {
        self.read(|db| Hash::new(key).get(db, &field))
    }

    fn hdel(&self, key: Bytes, fields: Vec<Bytes>) -> Result<usize> {
        self.write(|db| Hash::new(key).delete(db, &fields))
    }

    fn hexists(&self, key: Bytes, field: Bytes) -> Result<bool> {
        self.read(|db| Hash::new(key).exists(db, &field))
    }

    fn hgetall(&self, key: Bytes) -> Result<Vec<(Bytes, Bytes)>> {
        self.read(|db| Hash::new(key).entries(db))
    }

    fn hkeys(&self, key: Bytes) -> Result<Vec<Bytes>> {
        self.read(|db| Hash::new(key).fields(db))
    }

    fn hvals(&self, key: Bytes) -> Result<Vec<Bytes>> {
        self.read(|db| Hash::new(key).values(db))
    }

    fn hlen(&self, key: Bytes) -> Result<usize> {
        self.read(|db| Ok(Hash::new(key).len(db)))
    }

    fn hmget(&self, key: Bytes, fields: Vec<Bytes>) -> Result<Vec<Option<Bytes>>> {
        self.read(|db| Hash::new(key).get_all(db, &fields))
    }

    fn hmset(&self, key: Bytes, pairs: Vec<(Bytes, Bytes)>) -> Result<()> {
        self.write(|db| Hash::new(key).set_all(db, pairs))
    }

    fn hsetnx(&self, key: Bytes, field: Bytes, value: Bytes) -> Result<bool> {
        self.write(|db| Hash::new(key).set_if_absent(db, field, value))
    }

    fn hincrby(&self, key: Bytes, field: Bytes, delta: i64) -> Result<i64> {
        self.write(|db| Hash::new(key).incr_by(db, field, delta))
    }

    fn hincrbyfloat(&self, key: Bytes, field: Bytes, delta: f64) -> Result<f64> {
        self.write(|db| Hash::new(key).incr_by_float(db, field, delta))
    }

    fn sadd(&self, key: Bytes, members: Vec<Bytes>) -> Result<usize> {
        self.write(|db| Set::new(key).add(db, members))
    }

    fn scard(&self, key: Bytes) -> Result<usize> {
        self.read(|db| Ok(Set::new(key).len(db)))
    }

    fn sismember(&self, key: Bytes, member: Bytes) -> Result<bool> {
        self.read(|db| Set::new(key).contains(db, &member))
    }

    fn smembers(&self, key: Bytes) -> Result<Vec<Bytes>> {
        self.read(|db| Set::new(key).members(db))
    }

    fn srem(&self, key: Bytes, members: Vec<Bytes>) -> Result<usize> {
        self.write(|db| Set::new(key).remove(db, &members))
    }

    fn zadd(&self, key: Bytes, entries: Vec<(f64, Bytes)>) -> Result<usize> {
        self.write(|db| {
            let set = SortedSet::new(key);
            let mut added = 0;
            for (score, member) in entries {
                if set.add(db, member, score)? {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    fn zcard(&self, key: Bytes) -> Result<usize> {
        self.read(|db| Ok(SortedSet::new(key).len(db)))
    }

    fn zscore(&self, key: Bytes, member: Bytes) -> Result<Option<f64>> {
        self.read(|db| SortedSet::new(key).score(db, &member))
    }

    fn zrank(&self, key: Bytes, member: Bytes, descending: bool) -> Result<Option<usize>> {
        self.read(|db| SortedSet::new(key).rank(db, &member, descending))
    }

    fn zrange(&self, key: Bytes, start: i64, stop: i64, descending: bool) -> Result<Vec<(Bytes, f64)>> {
        self.read(|db| SortedSet::new(key).range(db, start, stop, descending))
    }

    fn zrangebyscore(
        &self,
        key: Bytes,
        min: ScoreBound,
        max: ScoreBound,
        descending: bool,
        limit: Limit,
    ) -> Result<Vec<(Bytes, f64)>> {
        self.read(|db| SortedSet::new(key).range_by_score(db, &min, &max, descending, limit))
    }

    fn zcount(&self, key: Bytes, min: ScoreBound, max: ScoreBound) -> Result<usize> {
        self.read(|db| SortedSet::new(key).count(db, &min, &max))
    }

    fn zincrby(&self, key: Bytes, member: Bytes, delta: f64) -> Result<f64> {
        self.write(|db| SortedSet::new(key).incr_by(db, member, delta))
    }

    fn zrem(&self, key: Bytes, members: Vec<Bytes>) -> Result<usize> {
        self.write(|db| SortedSet::new(key).remove(db, &members))
    }

    fn zremrangebyscore(&self, key: Bytes, min: ScoreBound, max: ScoreBound) -> Result<usize> {
        self.write(|db| SortedSet::new(key).remove_range_by_score(db, &min, &max))
    }
}
