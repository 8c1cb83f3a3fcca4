//! Sorted sets.
//!
//! A sorted set is kept in two collections: a member to score map for point lookups and an index
//! of `(score, member)` entries ordered by score then member for ranks and ranges. Both are
//! updated under the same lock, so for every member `m` with score `s` the index holds exactly
//! one entry, `(s, m)`.

use bytes::Bytes;
use itertools::Either;
use std::collections::btree_set;
use std::ops::Bound;

use super::keyspace;
use crate::backend::Limit;
use crate::db::{DbGuard, Name, ScoreBound, ScoreKey};
use crate::error::CommandError;

pub struct SortedSet {
    key: Bytes,
    members: Name,
    scores: Name,
}

impl SortedSet {
    pub fn new(key: Bytes) -> SortedSet {
        SortedSet {
            members: Name::ZMembers(key.clone()),
            scores: Name::ZScores(key.clone()),
            key,
        }
    }

    /// Upserts `member` with `score`, returning whether the member is new.
    pub fn add(&self, db: &mut DbGuard, member: Bytes, score: f64) -> Result<bool, CommandError> {
        // -0 and 0 compare equal as numbers but not under a total order.
        let score = if score == 0.0 { 0.0 } else { score };

        keyspace::register(db, &self.key)?;
        let previous = db.put_score(&self.members, member.clone(), score)?;
        if let Some(previous) = previous {
            db.remove_entry(&self.scores, &ScoreKey::new(previous, member.clone()))?;
        }
        db.insert_entry(&self.scores, ScoreKey::new(score, member))?;

        Ok(previous.is_none())
    }

    pub fn score(&self, db: &DbGuard, member: &[u8]) -> Result<Option<f64>, CommandError> {
        Ok(db
            .scores(&self.members)?
            .and_then(|scores| scores.get(member))
            .copied())
    }

    pub fn len(&self, db: &DbGuard) -> usize {
        db.len(&self.members)
    }

    /// Zero-based position of `member`, counted from the lowest score or, if `descending`, the
    /// highest.
    pub fn rank(&self, db: &DbGuard, member: &[u8], descending: bool) -> Result<Option<usize>, CommandError> {
        let Some(score) = self.score(db, member)? else {
            return Ok(None);
        };
        let Some(index) = db.index(&self.scores)? else {
            return Ok(None);
        };

        let probe = ScoreKey::new(score, Bytes::copy_from_slice(member));
        let rank = if descending {
            index
                .range::<ScoreKey, _>((Bound::Excluded(&probe), Bound::Unbounded))
                .count()
        } else {
            index.range::<ScoreKey, _>(..&probe).count()
        };

        Ok(Some(rank))
    }

    /// Entries at positions `start..=stop` of the chosen order. Negative positions count from the
    /// end and positions past the end are pulled back to the last entry.
    pub fn range(
        &self,
        db: &DbGuard,
        start: i64,
        stop: i64,
        descending: bool,
    ) -> Result<Vec<(Bytes, f64)>, CommandError> {
        let Some(index) = db.index(&self.scores)? else {
            return Ok(Vec::new());
        };

        let len = index.len() as i64;
        let start = resolve(start, len).max(0);
        let stop = resolve(stop, len);
        if stop < start {
            return Ok(Vec::new());
        }

        Ok(ordered(index.iter(), descending)
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .map(ScoreKey::entry)
            .collect())
    }

    pub fn range_by_score(
        &self,
        db: &DbGuard,
        min: &ScoreBound,
        max: &ScoreBound,
        descending: bool,
        limit: Limit,
    ) -> Result<Vec<(Bytes, f64)>, CommandError> {
        let Some(window) = self.window(db, min, max)? else {
            return Ok(Vec::new());
        };

        Ok(ordered(window, descending)
            .skip(limit.offset)
            .take(limit.count.unwrap_or(usize::MAX))
            .map(ScoreKey::entry)
            .collect())
    }

    pub fn count(&self, db: &DbGuard, min: &ScoreBound, max: &ScoreBound) -> Result<usize, CommandError> {
        Ok(self
            .window(db, min, max)?
            .map_or(0, |window| window.count()))
    }

    /// Returns how many of `members` were present.
    pub fn remove(&self, db: &mut DbGuard, members: &[Bytes]) -> Result<usize, CommandError> {
        let mut removed = 0;
        for member in members {
            if let Some(score) = db.delete_score(&self.members, member)? {
                db.remove_entry(&self.scores, &ScoreKey::new(score, member.clone()))?;
                removed += 1;
            }
        }

        if removed > 0 {
            self.drop_if_empty(db)?;
        }
        Ok(removed)
    }

    pub fn remove_range_by_score(
        &self,
        db: &mut DbGuard,
        min: &ScoreBound,
        max: &ScoreBound,
    ) -> Result<usize, CommandError> {
        let doomed: Vec<ScoreKey> = match self.window(db, min, max)? {
            Some(window) => window.cloned().collect(),
            None => return Ok(0),
        };

        for entry in &doomed {
            db.remove_entry(&self.scores, entry)?;
            if let Some(member) = &entry.member {
                db.delete_score(&self.members, member)?;
            }
        }

        if !doomed.is_empty() {
            self.drop_if_empty(db)?;
        }
        Ok(doomed.len())
    }

    /// Adds `delta` to the member's score (a missing member counts as 0) and returns the result.
    pub fn incr_by(&self, db: &mut DbGuard, member: Bytes, delta: f64) -> Result<f64, CommandError> {
        let score = self.score(db, &member)?.unwrap_or(0.0) + delta;
        if score.is_nan() {
            return Err(CommandError::NanScore);
        }

        self.add(db, member, score)?;
        Ok(score)
    }

    fn window<'a>(
        &self,
        db: &'a DbGuard,
        min: &ScoreBound,
        max: &ScoreBound,
    ) -> Result<Option<btree_set::Range<'a, ScoreKey>>, CommandError> {
        let index = db.index(&self.scores)?;
        Ok(index.zip(ScoreBound::range(min, max)).map(|(index, range)| index.range(range)))
    }

    fn drop_if_empty(&self, db: &mut DbGuard) -> Result<(), CommandError> {
        if self.len(db) == 0 {
            db.drop_collection(&self.members)?;
            db.drop_collection(&self.scores)?;
            keyspace::unregister(db, &self.key)?;
        }
        Ok(())
    }
}

fn resolve(position: i64, len: i64) -> i64 {
    let position = if position < 0 { len + position } else { position };
    if position >= len {
        len - 1
    } else {
        position
    }
}

fn ordered<'a, I>(entries: I, descending: bool) -> impl Iterator<Item = &'a ScoreKey>
where
    I: DoubleEndedIterator<Item = &'a ScoreKey>,
{
    if descending {
        Either::Left(entries.rev())
    } else {
        Either::Right(entries)
    }
}

#[cfg(test)]
pub(crate) fn assert_consistent(db: &DbGuard, key: &Bytes) {
    let members = db
        .scores(&Name::ZMembers(key.clone()))
        .unwrap()
        .cloned()
        .unwrap_or_default();
    let index: std::collections::BTreeSet<ScoreKey> = db
        .index(&Name::ZScores(key.clone()))
        .unwrap()
        .cloned()
        .unwrap_or_default();

    assert_eq!(members.len(), index.len(), "member map and index sizes differ");
    for (member, score) in &members {
        assert!(
            index.contains(&ScoreKey::new(*score, member.clone())),
            "index is missing {member:?} at {score}"
        );
    }
}
