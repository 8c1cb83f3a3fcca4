//! The ordered key-value substrate.
//!
//! A [`Db`] holds named collections: ordered maps, ordered sets, member-to-score maps and score
//! indexes. Collections spring into existence on first write and read as absent until then.
//!
//! All access goes through [`Db::lock`], which hands out a [`DbGuard`]. Every write made through
//! the guard is recorded; [`DbGuard::commit`] makes the batch durable (appending it to the journal
//! when the database is file backed) while dropping a guard with uncommitted writes undoes them.

mod journal;
mod score;

pub use score::{ScoreBound, ScoreKey};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

use journal::Journal;

/// Journal size, in bytes, past which it is rewritten as a snapshot.
pub const DEFAULT_COMPACT_AFTER: u64 = 64 * 1024 * 1024;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("journal I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("journal record could not be encoded: {0}")]
    Codec(#[from] bincode::Error),
    #[error("collection {0:?} is not a {1}")]
    KindMismatch(Name, &'static str),
}

/// Identifies a collection. The variant decides the collection's kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Name {
    /// Every live top-level key.
    Keys,
    /// Scalar values by key.
    Values,
    Hash(Bytes),
    Set(Bytes),
    /// Member to score map of a sorted set.
    ZMembers(Bytes),
    /// `(score, member)` index of a sorted set.
    ZScores(Bytes),
}

impl Name {
    fn empty(&self) -> Collection {
        match self {
            Name::Values | Name::Hash(_) => Collection::Map(BTreeMap::new()),
            Name::Keys | Name::Set(_) => Collection::Set(BTreeSet::new()),
            Name::ZMembers(_) => Collection::Scores(BTreeMap::new()),
            Name::ZScores(_) => Collection::Index(BTreeSet::new()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Collection {
    Map(BTreeMap<Bytes, Bytes>),
    Set(BTreeSet<Bytes>),
    Scores(BTreeMap<Bytes, f64>),
    Index(BTreeSet<ScoreKey>),
}

impl Collection {
    fn len(&self) -> usize {
        match self {
            Collection::Map(map) => map.len(),
            Collection::Set(set) => set.len(),
            Collection::Scores(scores) => scores.len(),
            Collection::Index(index) => index.len(),
        }
    }

    fn as_map(&self, name: &Name) -> Result<&BTreeMap<Bytes, Bytes>, Error> {
        match self {
            Collection::Map(map) => Ok(map),
            _ => Err(Error::KindMismatch(name.clone(), "map")),
        }
    }

    fn as_map_mut(&mut self, name: &Name) -> Result<&mut BTreeMap<Bytes, Bytes>, Error> {
        match self {
            Collection::Map(map) => Ok(map),
            _ => Err(Error::KindMismatch(name.clone(), "map")),
        }
    }

    fn as_set(&self, name: &Name) -> Result<&BTreeSet<Bytes>, Error> {
        match self {
            Collection::Set(set) => Ok(set),
            _ => Err(Error::KindMismatch(name.clone(), "set")),
        }
    }

    fn as_set_mut(&mut self, name: &Name) -> Result<&mut BTreeSet<Bytes>, Error> {
        match self {
            Collection::Set(set) => Ok(set),
            _ => Err(Error::KindMismatch(name.clone(), "set")),
        }
    }

    fn as_scores(&self, name: &Name) -> Result<&BTreeMap<Bytes, f64>, Error> {
        match self {
            Collection::Scores(scores) => Ok(scores),
            _ => Err(Error::KindMismatch(name.clone(), "score map")),
        }
    }

    fn as_scores_mut(&mut self, name: &Name) -> Result<&mut BTreeMap<Bytes, f64>, Error> {
        match self {
            Collection::Scores(scores) => Ok(scores),
            _ => Err(Error::KindMismatch(name.clone(), "score map")),
        }
    }

    fn as_index(&self, name: &Name) -> Result<&BTreeSet<ScoreKey>, Error> {
        match self {
            Collection::Index(index) => Ok(index),
            _ => Err(Error::KindMismatch(name.clone(), "score index")),
        }
    }

    fn as_index_mut(&mut self, name: &Name) -> Result<&mut BTreeSet<ScoreKey>, Error> {
        match self {
            Collection::Index(index) => Ok(index),
            _ => Err(Error::KindMismatch(name.clone(), "score index")),
        }
    }
}

/// A single primitive write. Applying a mutation yields its inverse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) enum Mutation {
    Put {
        name: Name,
        key: Bytes,
        value: Option<Bytes>,
    },
    Member {
        name: Name,
        member: Bytes,
        present: bool,
    },
    Score {
        name: Name,
        member: Bytes,
        score: Option<f64>,
    },
    Entry {
        name: Name,
        entry: ScoreKey,
        present: bool,
    },
    Drop {
        name: Name,
    },
    Restore {
        name: Name,
        collection: Collection,
    },
}

#[derive(Default)]
struct State {
    collections: HashMap<Name, Collection>,
    journal: Option<Journal>,
    /// Forward mutations not yet committed, kept only when journaling.
    pending: Vec<Mutation>,
    /// Inverses of uncommitted mutations, newest last.
    undo: Vec<Mutation>,
}

impl State {
    fn create(&mut self, name: &Name) -> &mut Collection {
        self.collections
            .entry(name.clone())
            .or_insert_with(|| name.empty())
    }

    fn apply(&mut self, mutation: Mutation) -> Result<Mutation, Error> {
        let inverse = match mutation {
            Mutation::Put { name, key, value } => {
                let previous = match value {
                    Some(value) => self.create(&name).as_map_mut(&name)?.insert(key.clone(), value),
                    None => match self.collections.get_mut(&name) {
                        Some(collection) => collection.as_map_mut(&name)?.remove(&key),
                        None => None,
                    },
                };
                Mutation::Put {
                    name,
                    key,
                    value: previous,
                }
            }
            Mutation::Member {
                name,
                member,
                present,
            } => {
                let was_present = if present {
                    !self.create(&name).as_set_mut(&name)?.insert(member.clone())
                } else {
                    match self.collections.get_mut(&name) {
                        Some(collection) => collection.as_set_mut(&name)?.remove(&member),
                        None => false,
                    }
                };
                Mutation::Member {
                    name,
                    member,
                    present: was_present,
                }
            }
            Mutation::Score {
                name,
                member,
                score,
            } => {
                let previous = match score {
                    Some(score) => self
                        .create(&name)
                        .as_scores_mut(&name)?
                        .insert(member.clone(), score),
                    None => match self.collections.get_mut(&name) {
                        Some(collection) => collection.as_scores_mut(&name)?.remove(&member),
                        None => None,
                    },
                };
                Mutation::Score {
                    name,
                    member,
                    score: previous,
                }
            }
            Mutation::Entry {
                name,
                entry,
                present,
            } => {
                let was_present = if present {
                    !self.create(&name).as_index_mut(&name)?.insert(entry.clone())
                } else {
                    match self.collections.get_mut(&name) {
                        Some(collection) => collection.as_index_mut(&name)?.remove(&entry),
                        None => false,
                    }
                };
                Mutation::Entry {
                    name,
                    entry,
                    present: was_present,
                }
            }
            Mutation::Drop { name } => match self.collections.remove(&name) {
                Some(collection) => Mutation::Restore { name, collection },
                None => Mutation::Drop { name },
            },
            Mutation::Restore { name, collection } => {
                match self.collections.insert(name.clone(), collection) {
                    Some(previous) => Mutation::Restore {
                        name,
                        collection: previous,
                    },
                    None => Mutation::Drop { name },
                }
            }
        };

        Ok(inverse)
    }

    /// Rewrites an oversized journal. Failures are only logged: the triggering commit is already
    /// durable.
    fn compact_journal(&mut self) {
        let Some(journal) = self.journal.as_mut() else {
            return;
        };
        if !journal.needs_compaction() {
            return;
        }

        let before = journal.len();
        let snapshot: Vec<Mutation> = self
            .collections
            .iter()
            .map(|(name, collection)| Mutation::Restore {
                name: name.clone(),
                collection: collection.clone(),
            })
            .collect();

        match journal.compact(&snapshot) {
            Ok(()) => info!(before, after = journal.len(), "compacted journal"),
            Err(e) => warn!(error = %e, "failed to compact journal"),
        }
    }
}

/// Shared handle to the substrate. Cloning is cheap.
#[derive(Clone)]
pub struct Db {
    inner: Arc<Mutex<State>>,
}

impl Db {
    /// A database that lives only in memory.
    pub fn memory() -> Db {
        Db {
            inner: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Opens a file-backed database, replaying every committed batch of the journal at `path`.
    /// With `fsync` set each commit is synced to disk before it returns.
    pub fn open(path: impl AsRef<Path>, fsync: bool) -> Result<Db, Error> {
        Db::open_with(path, fsync, DEFAULT_COMPACT_AFTER)
    }

    /// Like [`Db::open`], rewriting the journal as a snapshot once it grows past `compact_after`
    /// bytes.
    pub fn open_with(path: impl AsRef<Path>, fsync: bool, compact_after: u64) -> Result<Db, Error> {
        let path = path.as_ref();
        let (journal, batches) = Journal::open(path, fsync, compact_after)?;

        let mut state = State::default();
        let mut records = 0;
        for batch in batches {
            for mutation in batch {
                state.apply(mutation)?;
                records += 1;
            }
        }
        state.journal = Some(journal);

        info!(path = %path.display(), records, "replayed journal");

        Ok(Db {
            inner: Arc::new(Mutex::new(state)),
        })
    }

    pub fn lock(&self) -> DbGuard<'_> {
        // Guards roll back while unwinding, so a poisoned state is still consistent.
        let state = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        DbGuard { state }
    }
}

impl Default for Db {
    fn default() -> Self {
        Self::memory()
    }
}

/// Exclusive access to the substrate for the duration of one operation.
pub struct DbGuard<'a> {
    state: MutexGuard<'a, State>,
}

impl DbGuard<'_> {
    pub fn map(&self, name: &Name) -> Result<Option<&BTreeMap<Bytes, Bytes>>, Error> {
        self.state
            .collections
            .get(name)
            .map(|collection| collection.as_map(name))
            .transpose()
    }

    pub fn set(&self, name: &Name) -> Result<Option<&BTreeSet<Bytes>>, Error> {
        self.state
            .collections
            .get(name)
            .map(|collection| collection.as_set(name))
            .transpose()
    }

    pub fn scores(&self, name: &Name) -> Result<Option<&BTreeMap<Bytes, f64>>, Error> {
        self.state
            .collections
            .get(name)
            .map(|collection| collection.as_scores(name))
            .transpose()
    }

    pub fn index(&self, name: &Name) -> Result<Option<&BTreeSet<ScoreKey>>, Error> {
        self.state
            .collections
            .get(name)
            .map(|collection| collection.as_index(name))
            .transpose()
    }

    pub fn len(&self, name: &Name) -> usize {
        self.state
            .collections
            .get(name)
            .map_or(0, Collection::len)
    }

    pub fn contains(&self, name: &Name, member: &[u8]) -> Result<bool, Error> {
        Ok(self.set(name)?.is_some_and(|set| set.contains(member)))
    }

    /// Upserts `key` in a map, returning the previous value.
    pub fn put(&mut self, name: &Name, key: Bytes, value: Bytes) -> Result<Option<Bytes>, Error> {
        let previous = self.map(name)?.and_then(|map| map.get(&key)).cloned();
        self.record(Mutation::Put {
            name: name.clone(),
            key,
            value: Some(value),
        })?;
        Ok(previous)
    }

    pub fn delete(&mut self, name: &Name, key: &Bytes) -> Result<Option<Bytes>, Error> {
        let previous = self.map(name)?.and_then(|map| map.get(key)).cloned();
        if previous.is_some() {
            self.record(Mutation::Put {
                name: name.clone(),
                key: key.clone(),
                value: None,
            })?;
        }
        Ok(previous)
    }

    /// Adds `member` to a set, returning whether it was new.
    pub fn insert(&mut self, name: &Name, member: Bytes) -> Result<bool, Error> {
        if self.contains(name, &member)? {
            return Ok(false);
        }
        self.record(Mutation::Member {
            name: name.clone(),
            member,
            present: true,
        })?;
        Ok(true)
    }

    pub fn remove(&mut self, name: &Name, member: &Bytes) -> Result<bool, Error> {
        if !self.contains(name, member)? {
            return Ok(false);
        }
        self.record(Mutation::Member {
            name: name.clone(),
            member: member.clone(),
            present: false,
        })?;
        Ok(true)
    }

    /// Upserts a member's score, returning the previous one.
    pub fn put_score(&mut self, name: &Name, member: Bytes, score: f64) -> Result<Option<f64>, Error> {
        let previous = self
            .scores(name)?
            .and_then(|scores| scores.get(&member))
            .copied();
        self.record(Mutation::Score {
            name: name.clone(),
            member,
            score: Some(score),
        })?;
        Ok(previous)
    }

    pub fn delete_score(&mut self, name: &Name, member: &Bytes) -> Result<Option<f64>, Error> {
        let previous = self
            .scores(name)?
            .and_then(|scores| scores.get(member))
            .copied();
        if previous.is_some() {
            self.record(Mutation::Score {
                name: name.clone(),
                member: member.clone(),
                score: None,
            })?;
        }
        Ok(previous)
    }

    pub fn insert_entry(&mut self, name: &Name, entry: ScoreKey) -> Result<bool, Error> {
        if self.index(name)?.is_some_and(|index| index.contains(&entry)) {
            return Ok(false);
        }
        self.record(Mutation::Entry {
            name: name.clone(),
            entry,
            present: true,
        })?;
        Ok(true)
    }

    pub fn remove_entry(&mut self, name: &Name, entry: &ScoreKey) -> Result<bool, Error> {
        if !self.index(name)?.is_some_and(|index| index.contains(entry)) {
            return Ok(false);
        }
        self.record(Mutation::Entry {
            name: name.clone(),
            entry: entry.clone(),
            present: false,
        })?;
        Ok(true)
    }

    /// Removes a whole collection, returning whether it held anything.
    pub fn drop_collection(&mut self, name: &Name) -> Result<bool, Error> {
        if !self.state.collections.contains_key(name) {
            return Ok(false);
        }
        let populated = self.len(name) > 0;
        self.record(Mutation::Drop { name: name.clone() })?;
        Ok(populated)
    }

    /// Number of writes that a drop of this guard would undo.
    pub fn uncommitted(&self) -> usize {
        self.state.undo.len()
    }

    pub fn commit(&mut self) -> Result<(), Error> {
        let state = &mut *self.state;
        if let Some(journal) = state.journal.as_mut() {
            if !state.pending.is_empty() {
                journal.append(&state.pending)?;
            }
        }
        state.pending.clear();
        state.undo.clear();
        state.compact_journal();
        Ok(())
    }

    pub fn rollback(&mut self) {
        let state = &mut *self.state;
        state.pending.clear();
        while let Some(inverse) = state.undo.pop() {
            if let Err(e) = state.apply(inverse) {
                warn!(error = %e, "failed to undo a write");
            }
        }
    }

    fn record(&mut self, mutation: Mutation) -> Result<(), Error> {
        let forward = self.state.journal.is_some().then(|| mutation.clone());
        let inverse = self.state.apply(mutation)?;
        self.state.undo.push(inverse);
        self.state.pending.extend(forward);
        Ok(())
    }
}

impl Drop for DbGuard<'_> {
    fn drop(&mut self) {
        let uncommitted = self.uncommitted();
        if uncommitted > 0 {
            debug!(uncommitted, "rolling back uncommitted writes");
            self.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(db: &Db, key: &str) -> Option<Bytes> {
        db.lock()
            .map(&Name::Values)
            .unwrap()
            .and_then(|values| values.get(key.as_bytes()))
            .cloned()
    }

    #[test]
    fn collections_are_created_on_first_write() {
        let db = Db::memory();
        let mut guard = db.lock();

        assert_eq!(guard.set(&Name::Keys).unwrap(), None);
        assert!(guard.insert(&Name::Keys, Bytes::from("a")).unwrap());
        assert!(!guard.insert(&Name::Keys, Bytes::from("a")).unwrap());
        assert_eq!(guard.len(&Name::Keys), 1);
        guard.commit().unwrap();
    }

    #[test]
    fn dropping_an_uncommitted_guard_rolls_back() {
        let db = Db::memory();
        {
            let mut guard = db.lock();
            guard
                .put(&Name::Values, Bytes::from("a"), Bytes::from("1"))
                .unwrap();
            guard.commit().unwrap();
        }
        {
            let mut guard = db.lock();
            guard
                .put(&Name::Values, Bytes::from("a"), Bytes::from("2"))
                .unwrap();
            guard
                .put(&Name::Values, Bytes::from("b"), Bytes::from("3"))
                .unwrap();
            guard
                .put_score(&Name::ZMembers(Bytes::from("z")), Bytes::from("m"), 1.0)
                .unwrap();
            guard
                .insert_entry(
                    &Name::ZScores(Bytes::from("z")),
                    ScoreKey::new(1.0, Bytes::from("m")),
                )
                .unwrap();
            assert_eq!(guard.uncommitted(), 4);
        }

        assert_eq!(value(&db, "a"), Some(Bytes::from("1")));
        assert_eq!(value(&db, "b"), None);
        assert_eq!(db.lock().len(&Name::ZMembers(Bytes::from("z"))), 0);
        assert_eq!(db.lock().len(&Name::ZScores(Bytes::from("z"))), 0);
    }

    #[test]
    fn dropped_collections_are_restored_on_rollback() {
        let db = Db::memory();
        let name = Name::Hash(Bytes::from("h"));
        {
            let mut guard = db.lock();
            guard.put(&name, Bytes::from("f"), Bytes::from("v")).unwrap();
            guard.commit().unwrap();
        }
        {
            let mut guard = db.lock();
            assert!(guard.drop_collection(&name).unwrap());
            assert_eq!(guard.map(&name).unwrap(), None);
            guard.rollback();
        }

        let guard = db.lock();
        let map = guard.map(&name).unwrap().unwrap();
        assert_eq!(map.get(b"f".as_slice()), Some(&Bytes::from("v")));
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let db = Db::memory();
        let mut guard = db.lock();
        guard
            .put(&Name::Values, Bytes::from("a"), Bytes::from("1"))
            .unwrap();

        assert!(matches!(
            guard.set(&Name::Values),
            Err(Error::KindMismatch(Name::Values, "set"))
        ));
        assert!(guard.insert(&Name::Values, Bytes::from("x")).is_err());
        guard.commit().unwrap();
    }

    #[test]
    fn committed_writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ordis.journal");
        {
            let db = Db::open(&path, false).unwrap();
            let mut guard = db.lock();
            guard
                .put(&Name::Values, Bytes::from("a"), Bytes::from("1"))
                .unwrap();
            guard.insert(&Name::Keys, Bytes::from("a")).unwrap();
            guard.commit().unwrap();

            guard
                .put(&Name::Values, Bytes::from("b"), Bytes::from("2"))
                .unwrap();
            guard.rollback();

            guard
                .put(&Name::Values, Bytes::from("c"), Bytes::from("3"))
                .unwrap();
            guard.delete(&Name::Values, &Bytes::from("c")).unwrap();
            guard.commit().unwrap();
        }

        let db = Db::open(&path, false).unwrap();
        assert_eq!(value(&db, "a"), Some(Bytes::from("1")));
        assert_eq!(value(&db, "b"), None);
        assert_eq!(value(&db, "c"), None);
        assert!(db.lock().contains(&Name::Keys, b"a").unwrap());
    }

    #[test]
    fn journal_is_compacted_once_it_grows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ordis.journal");
        let hash = Name::Hash(Bytes::from("h"));
        {
            let db = Db::open_with(&path, false, 4096).unwrap();
            let mut guard = db.lock();
            guard.put(&hash, Bytes::from("f"), Bytes::from("v")).unwrap();
            guard.commit().unwrap();
            for i in 0..1000 {
                guard
                    .put(&Name::Values, Bytes::from("a"), Bytes::from(i.to_string()))
                    .unwrap();
                guard.commit().unwrap();
            }
        }

        assert!(std::fs::metadata(&path).unwrap().len() < 8192);

        let db = Db::open_with(&path, false, 4096).unwrap();
        assert_eq!(value(&db, "a"), Some(Bytes::from("999")));
        let guard = db.lock();
        let map = guard.map(&hash).unwrap().unwrap();
        assert_eq!(map.get(b"f".as_slice()), Some(&Bytes::from("v")));
    }
}
