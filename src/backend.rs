//! The typed operation set behind the command table.
//!
//! A backend only has to provide the operations it supports: every method defaults to failing
//! with [`CommandError::NotImplemented`], which the dispatcher reports as `-ERR not yet
//! implemented`. Each call runs as one atomic operation.

use bytes::Bytes;

use crate::db::ScoreBound;
use crate::error::CommandError;

pub type Result<T> = std::result::Result<T, CommandError>;

/// `LIMIT offset count` of a score range query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Limit {
    pub offset: usize,
    /// `None` returns everything after `offset`.
    pub count: Option<usize>,
}

fn not_implemented<T>() -> Result<T> {
    Err(CommandError::NotImplemented)
}

pub trait Backend: Send + Sync {
    // Keys and scalars.

    fn keys(&self, pattern: Bytes) -> Result<Vec<Bytes>> {
        let _ = pattern;
        not_implemented()
    }

    fn exists(&self, key: Bytes) -> Result<bool> {
        let _ = key;
        not_implemented()
    }

    fn get(&self, key: Bytes) -> Result<Option<Bytes>> {
        let _ = key;
        not_implemented()
    }

    fn set(&self, key: Bytes, value: Bytes) -> Result<()> {
        let _ = (key, value);
        not_implemented()
    }

    /// Returns how many of `keys` existed.
    fn del(&self, keys: Vec<Bytes>) -> Result<usize> {
        let _ = keys;
        not_implemented()
    }

    fn incr_by(&self, key: Bytes, delta: i64) -> Result<i64> {
        let _ = (key, delta);
        not_implemented()
    }

    fn incr_by_float(&self, key: Bytes, delta: f64) -> Result<f64> {
        let _ = (key, delta);
        not_implemented()
    }

    // Hashes.

    /// Returns whether `field` is new.
    fn hset(&self, key: Bytes, field: Bytes, value: Bytes) -> Result<bool> {
        let _ = (key, field, value);
        not_implemented()
    }

    fn hget(&self, key: Bytes, field: Bytes) -> Result<Option<Bytes>> {
        let _ = (key, field);
        not_implemented()
    }

    fn hdel(&self, key: Bytes, fields: Vec<Bytes>) -> Result<usize> {
        let _ = (key, fields);
        not_implemented()
    }

    fn hexists(&self, key: Bytes, field: Bytes) -> Result<bool> {
        let _ = (key, field);
        not_implemented()
    }

    fn hgetall(&self, key: Bytes) -> Result<Vec<(Bytes, Bytes)>> {
        let _ = key;
        not_implemented()
    }

    fn hkeys(&self, key: Bytes) -> Result<Vec<Bytes>> {
        let _ = key;
        not_implemented()
    }

    fn hvals(&self, key: Bytes) -> Result<Vec<Bytes>> {
        let _ = key;
        not_implemented()
    }

    fn hlen(&self, key: Bytes) -> Result<usize> {
        let _ = key;
        not_implemented()
    }

    fn hmget(&self, key: Bytes, fields: Vec<Bytes>) -> Result<Vec<Option<Bytes>>> {
        let _ = (key, fields);
        not_implemented()
    }

    fn hmset(&self, key: Bytes, pairs: Vec<(Bytes, Bytes)>) -> Result<()> {
        let _ = (key, pairs);
        not_implemented()
    }

    fn hsetnx(&self, key: Bytes, field: Bytes, value: Bytes) -> Result<bool> {
        let _ = (key, field, value);
        not_implemented()
    }

    fn hincrby(&self, key: Bytes, field: Bytes, delta: i64) -> Result<i64> {
        let _ = (key, field, delta);
        not_implemented()
    }

    fn hincrbyfloat(&self, key: Bytes, field: Bytes, delta: f64) -> Result<f64> {
        let _ = (key, field, delta);
        not_implemented()
    }

    // Sets.

    /// Returns how many members were new.
    fn sadd(&self, key: Bytes, members: Vec<Bytes>) -> Result<usize> {
        let _ = (key, members);
        not_implemented()
    }

    fn scard(&self, key: Bytes) -> Result<usize> {
        let _ = key;
        not_implemented()
    }

    fn sismember(&self, key: Bytes, member: Bytes) -> Result<bool> {
        let _ = (key, member);
        not_implemented()
    }

    fn smembers(&self, key: Bytes) -> Result<Vec<Bytes>> {
        let _ = key;
        not_implemented()
    }

    fn srem(&self, key: Bytes, members: Vec<Bytes>) -> Result<usize> {
        let _ = (key, members);
        not_implemented()
    }

    fn sdiff(&self, keys: Vec<Bytes>) -> Result<Vec<Bytes>> {
        let _ = keys;
        not_implemented()
    }

    fn sinter(&self, keys: Vec<Bytes>) -> Result<Vec<Bytes>> {
        let _ = keys;
        not_implemented()
    }

    fn sunion(&self, keys: Vec<Bytes>) -> Result<Vec<Bytes>> {
        let _ = keys;
        not_implemented()
    }

    fn sdiffstore(&self, destination: Bytes, keys: Vec<Bytes>) -> Result<usize> {
        let _ = (destination, keys);
        not_implemented()
    }

    fn sinterstore(&self, destination: Bytes, keys: Vec<Bytes>) -> Result<usize> {
        let _ = (destination, keys);
        not_implemented()
    }

    fn sunionstore(&self, destination: Bytes, keys: Vec<Bytes>) -> Result<usize> {
        let _ = (destination, keys);
        not_implemented()
    }

    fn smove(&self, source: Bytes, destination: Bytes, member: Bytes) -> Result<bool> {
        let _ = (source, destination, member);
        not_implemented()
    }

    fn spop(&self, key: Bytes) -> Result<Option<Bytes>> {
        let _ = key;
        not_implemented()
    }

    fn srandmember(&self, key: Bytes, count: Option<i64>) -> Result<Vec<Bytes>> {
        let _ = (key, count);
        not_implemented()
    }

    // Sorted sets.

    /// Upserts `(score, member)` pairs, returning how many members were new.
    fn zadd(&self, key: Bytes, entries: Vec<(f64, Bytes)>) -> Result<usize> {
        let _ = (key, entries);
        not_implemented()
    }

    fn zcard(&self, key: Bytes) -> Result<usize> {
        let _ = key;
        not_implemented()
    }

    fn zscore(&self, key: Bytes, member: Bytes) -> Result<Option<f64>> {
        let _ = (key, member);
        not_implemented()
    }

    fn zrank(&self, key: Bytes, member: Bytes, descending: bool) -> Result<Option<usize>> {
        let _ = (key, member, descending);
        not_implemented()
    }

    /// Members with their scores at positions `start..=stop`.
    fn zrange(&self, key: Bytes, start: i64, stop: i64, descending: bool) -> Result<Vec<(Bytes, f64)>> {
        let _ = (key, start, stop, descending);
        not_implemented()
    }

    fn zrangebyscore(
        &self,
        key: Bytes,
        min: ScoreBound,
        max: ScoreBound,
        descending: bool,
        limit: Limit,
    ) -> Result<Vec<(Bytes, f64)>> {
        let _ = (key, min, max, descending, limit);
        not_implemented()
    }

    fn zcount(&self, key: Bytes, min: ScoreBound, max: ScoreBound) -> Result<usize> {
        let _ = (key, min, max);
        not_implemented()
    }

    fn zincrby(&self, key: Bytes, member: Bytes, delta: f64) -> Result<f64> {
        let _ = (key, member, delta);
        not_implemented()
    }

    fn zrem(&self, key: Bytes, members: Vec<Bytes>) -> Result<usize> {
        let _ = (key, members);
        not_implemented()
    }

    fn zremrangebyscore(&self, key: Bytes, min: ScoreBound, max: ScoreBound) -> Result<usize> {
        let _ = (key, min, max);
        not_implemented()
    }

    fn zremrangebyrank(&self, key: Bytes, start: i64, stop: i64) -> Result<usize> {
        let _ = (key, start, stop);
        not_implemented()
    }

    fn zunionstore(&self, destination: Bytes, keys: Vec<Bytes>) -> Result<usize> {
        let _ = (destination, keys);
        not_implemented()
    }

    fn zinterstore(&self, destination: Bytes, keys: Vec<Bytes>) -> Result<usize> {
        let _ = (destination, keys);
        not_implemented()
    }
}
