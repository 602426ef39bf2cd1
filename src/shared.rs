//! Thread-safe weighted set.
//!
//! [`SharedWeightedSet`] is a cloneable handle to one [`WeightedSet`] behind a
//! `RwLock`. Mutators hold the write lock for the whole operation; `roll`,
//! `lookup`, `len` and friends hold the read lock, so they run concurrently
//! and never observe a half-applied mutation.
//!
//! Enumeration is exposed as [`snapshot`](SharedWeightedSet::snapshot) (a copy
//! taken under one read lock) or [`read`](SharedWeightedSet::read) (borrow the
//! set for the duration of a closure).

use crate::weight::Weight;
use crate::wheel::{WeightedSet, WheelError};
use rand::prelude::*;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A [`WeightedSet`] shared across threads.
#[derive(Debug)]
pub struct SharedWeightedSet<K, W = f64> {
    inner: Arc<RwLock<WeightedSet<K, W>>>,
}

impl<K, W> Clone for SharedWeightedSet<K, W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, W> Default for SharedWeightedSet<K, W>
where
    K: Eq + Hash + Clone,
    W: Weight,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, W> From<WeightedSet<K, W>> for SharedWeightedSet<K, W> {
    fn from(set: WeightedSet<K, W>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(set)),
        }
    }
}

impl<K, W> SharedWeightedSet<K, W>
where
    K: Eq + Hash + Clone,
    W: Weight,
{
    /// Empty shared set with the default configuration.
    pub fn new() -> Self {
        WeightedSet::<K, W>::new().into()
    }

    /// See [`WeightedSet::from_pairs`].
    pub fn from_pairs<I>(pairs: I) -> Result<Self, WheelError<K, W>>
    where
        I: IntoIterator<Item = (K, W)>,
    {
        WeightedSet::from_pairs(pairs).map(Self::from)
    }

    // Operations validate and run caller code (`Clone`, `Hash`) before touching the
    // slots or the tree, and compaction runs none, so a poisoned lock still guards a
    // consistent set.
    fn read_guard(&self) -> RwLockReadGuard<'_, WeightedSet<K, W>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, WeightedSet<K, W>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with shared access to the set.
    pub fn read<T>(&self, f: impl FnOnce(&WeightedSet<K, W>) -> T) -> T {
        f(&self.read_guard())
    }

    /// Run `f` with exclusive access to the set.
    ///
    /// Useful for applying several mutations as one atomic step.
    pub fn write<T>(&self, f: impl FnOnce(&mut WeightedSet<K, W>) -> T) -> T {
        f(&mut self.write_guard())
    }

    /// See [`WeightedSet::insert`].
    pub fn insert(&self, key: K, weight: W) -> Result<(), WheelError<K, W>> {
        self.write_guard().insert(key, weight)
    }

    /// See [`WeightedSet::insert_many`]. The whole batch runs under one write lock.
    pub fn insert_many<I>(&self, pairs: I) -> Result<usize, WheelError<K, W>>
    where
        I: IntoIterator<Item = (K, W)>,
    {
        self.write_guard().insert_many(pairs)
    }

    /// See [`WeightedSet::remove`].
    pub fn remove<Q>(&self, key: &Q) -> Result<W, WheelError<K, W>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.write_guard().remove(key)
    }

    /// See [`WeightedSet::update`].
    pub fn update<Q>(&self, key: &Q, weight: W) -> Result<W, WheelError<K, W>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.write_guard().update(key, weight)
    }

    /// Current weight of `key`.
    pub fn lookup<Q>(&self, key: &Q) -> Result<W, WheelError<K, W>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.read_guard().lookup(key)
    }

    /// Whether `key` has an entry.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read_guard().contains(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    /// Alias of [`len`](Self::len).
    pub fn size(&self) -> usize {
        self.len()
    }

    /// Whether the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    /// Sum of all entry weights.
    pub fn total_weight(&self) -> W {
        self.read_guard().total_weight()
    }

    /// Draw a key (cloned out of the set) using the thread-local generator.
    pub fn roll(&self) -> Result<K, WheelError<K, W>> {
        let mut rng = rand::rng();
        self.roll_with_rng(&mut rng)
    }

    /// Draw a key using a caller-supplied RNG.
    ///
    /// The draw depends on the total weight, so it is taken under the same read
    /// lock as the resolution step.
    pub fn roll_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<K, WheelError<K, W>> {
        self.read_guard().roll_with_rng(rng).cloned()
    }

    /// Copy of all entries in insertion order, taken atomically.
    pub fn snapshot(&self) -> Vec<(K, W)> {
        self.read_guard()
            .iter()
            .map(|(k, w)| (k.clone(), w))
            .collect()
    }
}
