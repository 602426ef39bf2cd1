//! Dynamic weighted set ("roulette wheel").
//!
//! Keys are drawn with probability `weight / total_weight`, and the set can be
//! mutated between draws. Every operation is O(log n) (amortized for insert and
//! remove):
//!
//! - a sum tree over slot positions resolves a uniform draw on the
//!   cumulative weight axis to a slot;
//! - slots are assigned in insertion order, so enumeration order is insertion
//!   order regardless of tree layout;
//! - removal leaves a zero-weight tombstone, and the set compacts (an
//!   order-preserving O(n) rebuild) once tombstones exceed a configured share
//!   of slots.
//!
//! Notes:
//! - `roll` uses the thread-local generator; `roll_with_rng` exists for
//!   deterministic testing/benchmarking.
//! - A zero-weight entry is present (it enumerates and can be looked up) but is
//!   never rolled.

use crate::tree::SumTree;
use crate::uniform;
use crate::weight::Weight;
use log::{debug, trace};
use rand::prelude::*;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::iter::FusedIterator;

/// Errors for weighted set operations.
#[derive(Debug, Clone, PartialEq)]
pub enum WheelError<K, W> {
    /// Insert of a key that is already present.
    DuplicateKey(K),
    /// Remove/update/lookup of a key that is absent.
    KeyNotFound(K),
    /// Negative (or non-finite) weight on insert or update.
    InvalidWeight { key: K, weight: W },
    /// The new total weight would overflow the weight type.
    WeightOverflow { key: K },
    /// Roll with no entries, or with a total weight of zero.
    EmptySet,
}

impl<K: fmt::Debug, W: fmt::Debug> fmt::Display for WheelError<K, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey(k) => write!(f, "key {k:?} is already present"),
            Self::KeyNotFound(k) => write!(f, "key {k:?} not found"),
            Self::InvalidWeight { key, weight } => {
                write!(f, "weight for key {key:?} must be finite and >= 0 (got {weight:?})")
            }
            Self::WeightOverflow { key } => {
                write!(f, "total weight would overflow when setting key {key:?}")
            }
            Self::EmptySet => write!(f, "cannot roll: no entry has positive weight"),
        }
    }
}

impl<K: fmt::Debug, W: fmt::Debug> std::error::Error for WheelError<K, W> {}

/// Tuning knobs for a [`WeightedSet`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelConfig {
    capacity: usize,
    compact_ratio: f64,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            compact_ratio: 0.5,
        }
    }
}

impl WheelConfig {
    /// Default configuration: 16 initial slots, compact at 50% tombstones.
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum number of slots the cumulative tree keeps (rounded up to a power of two).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Compact once `tombstones > ratio * slots`.
    ///
    /// Clamped to `[0, 1]`; NaN falls back to the default. `1.0` never compacts on
    /// removal (tombstones are then reclaimed only when the tree is full).
    pub fn with_compact_ratio(mut self, ratio: f64) -> Self {
        self.compact_ratio = if ratio.is_nan() {
            Self::default().compact_ratio
        } else {
            ratio.clamp(0.0, 1.0)
        };
        self
    }

    /// Minimum slot count of the cumulative tree.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tombstone share of slots that triggers compaction on removal.
    pub fn compact_ratio(&self) -> f64 {
        self.compact_ratio
    }
}

/// Half-open cumulative interval `[start, end)` owned by one entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval<W> {
    /// Cumulative weight before the entry (inclusive bound).
    pub start: W,
    /// `start` plus the entry's weight (exclusive bound).
    pub end: W,
}

impl<W: Weight> Interval<W> {
    /// Whether a draw of `t` lands in this interval.
    pub fn contains(&self, t: W) -> bool {
        self.start <= t && t < self.end
    }
}

#[derive(Debug, Clone)]
struct Slot<K, W> {
    key: K,
    weight: W,
}

/// A set of unique keys with non-negative weights supporting O(log n) weighted
/// sampling under mutation.
#[derive(Clone)]
pub struct WeightedSet<K, W = f64> {
    slots: Vec<Option<Slot<K, W>>>,
    index: HashMap<K, usize>,
    tree: SumTree<W>,
    tombstones: usize,
    config: WheelConfig,
}

impl<K, W> Default for WeightedSet<K, W>
where
    K: Eq + Hash + Clone,
    W: Weight,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, W> WeightedSet<K, W>
where
    K: Eq + Hash + Clone,
    W: Weight,
{
    /// Create an empty set.
    pub fn new() -> Self {
        Self::with_config(WheelConfig::default())
    }

    /// Create an empty set with room for `capacity` entries before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(WheelConfig::default().with_capacity(capacity))
    }

    /// Create an empty set with explicit tuning.
    pub fn with_config(config: WheelConfig) -> Self {
        Self {
            slots: Vec::with_capacity(config.capacity),
            index: HashMap::with_capacity(config.capacity),
            tree: SumTree::with_capacity(config.capacity),
            tombstones: 0,
            config,
        }
    }

    /// Create a set from `(key, weight)` pairs, inserted in order.
    ///
    /// Fails on the first repeated key or invalid weight.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, WheelError<K, W>>
    where
        I: IntoIterator<Item = (K, W)>,
    {
        let pairs = pairs.into_iter();
        let mut set = Self::with_capacity(pairs.size_hint().0);
        set.insert_many(pairs)?;
        Ok(set)
    }

    /// Tuning in effect.
    pub fn config(&self) -> &WheelConfig {
        &self.config
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Number of entries (alias of [`len`](Self::len)).
    #[inline]
    pub fn size(&self) -> usize {
        self.len()
    }

    /// Whether the set has no entries (zero-weight entries count).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Sum of all current weights.
    #[inline]
    pub fn total_weight(&self) -> W {
        self.tree.total()
    }

    /// Add a new entry.
    pub fn insert(&mut self, key: K, weight: W) -> Result<(), WheelError<K, W>> {
        if !weight.is_valid() {
            return Err(WheelError::InvalidWeight { key, weight });
        }
        if self.index.contains_key(&key) {
            return Err(WheelError::DuplicateKey(key));
        }
        if self.tree.total().checked_sum(weight).is_none() {
            return Err(WheelError::WeightOverflow { key });
        }

        self.reserve_slot();
        let pos = self.slots.len();
        // Caller code (`Clone`, `Hash`) runs before the tree sees the weight.
        self.index.insert(key.clone(), pos);
        self.slots.push(Some(Slot { key, weight }));
        self.tree.set(pos, weight);
        trace!("insert: slot={pos} weight={weight:?}");
        Ok(())
    }

    /// Insert each pair in order; returns how many were inserted.
    ///
    /// If any key in the batch is already in the set, nothing is inserted and
    /// `DuplicateKey` names the first such key. Otherwise pairs are applied in
    /// order, and keys inserted earlier in the batch count as present for later
    /// pairs: on such a repeat (or an invalid weight) the applied prefix stays in
    /// the set and the error for the offending pair is returned.
    pub fn insert_many<I>(&mut self, pairs: I) -> Result<usize, WheelError<K, W>>
    where
        I: IntoIterator<Item = (K, W)>,
    {
        let mut batch: Vec<(K, W)> = pairs.into_iter().collect();
        if let Some(i) = batch.iter().position(|(key, _)| self.index.contains_key(key)) {
            let (key, _) = batch.swap_remove(i);
            return Err(WheelError::DuplicateKey(key));
        }

        let mut inserted = 0;
        for (key, weight) in batch {
            self.insert(key, weight)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Delete the entry for `key`, returning its weight.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<W, WheelError<K, W>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let pos = self
            .index
            .remove(key)
            .ok_or_else(|| WheelError::KeyNotFound(key.to_owned()))?;
        let weight = self.slots[pos].take().map_or(W::ZERO, |slot| slot.weight);
        self.tree.set(pos, W::ZERO);
        self.tombstones += 1;
        trace!("remove: slot={pos} weight={weight:?}");

        if self.tombstones as f64 > self.config.compact_ratio * self.slots.len() as f64 {
            self.compact(self.len());
        }
        Ok(weight)
    }

    /// Replace the weight of an existing entry, returning the previous weight.
    ///
    /// The entry keeps its enumeration position.
    pub fn update<Q>(&mut self, key: &Q, weight: W) -> Result<W, WheelError<K, W>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let pos = *self
            .index
            .get(key)
            .ok_or_else(|| WheelError::KeyNotFound(key.to_owned()))?;
        if !weight.is_valid() {
            return Err(WheelError::InvalidWeight {
                key: key.to_owned(),
                weight,
            });
        }
        let Some(slot) = self.slots[pos].as_mut() else {
            return Err(WheelError::KeyNotFound(key.to_owned()));
        };
        let old = slot.weight;
        if (self.tree.total() - old).checked_sum(weight).is_none() {
            return Err(WheelError::WeightOverflow {
                key: key.to_owned(),
            });
        }

        slot.weight = weight;
        self.tree.set(pos, weight);
        trace!("update: slot={pos} weight={old:?} -> {weight:?}");
        Ok(old)
    }

    /// Current weight of `key`.
    pub fn lookup<Q>(&self, key: &Q) -> Result<W, WheelError<K, W>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.get(key)
            .ok_or_else(|| WheelError::KeyNotFound(key.to_owned()))
    }

    /// Current weight of `key`, if present.
    pub fn get<Q>(&self, key: &Q) -> Option<W>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let pos = *self.index.get(key)?;
        self.slots[pos].as_ref().map(|slot| slot.weight)
    }

    /// Whether `key` is present, regardless of its weight.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Draw a key with probability proportional to its weight.
    #[inline]
    pub fn roll(&self) -> Result<&K, WheelError<K, W>> {
        let mut rng = rand::rng();
        self.roll_with_rng(&mut rng)
    }

    /// Draw a key using a caller-supplied RNG.
    ///
    /// This exists primarily for deterministic testing/benchmarking.
    pub fn roll_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&K, WheelError<K, W>> {
        let t = uniform::random_below_with_rng(self.tree.total(), rng)
            .ok_or(WheelError::EmptySet)?;
        let pos = self.tree.find(t);
        self.slots
            .get(pos)
            .and_then(Option::as_ref)
            .map(|slot| &slot.key)
            .ok_or(WheelError::EmptySet)
    }

    /// Entries in insertion order (most recent last).
    pub fn iter(&self) -> Iter<'_, K, W> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.len(),
        }
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Entries with the cumulative interval each one owns, in insertion order.
    ///
    /// Zero-weight entries get an empty interval (`start == end`).
    ///
    /// Bounds are running sums in enumeration order. They are exact for integer
    /// weights; for float weights they can differ from the boundaries `roll`
    /// resolves against (and the last `end` from [`total_weight`]) by rounding.
    ///
    /// [`total_weight`]: Self::total_weight
    pub fn intervals(&self) -> Intervals<'_, K, W> {
        Intervals {
            inner: self.iter(),
            acc: W::ZERO,
        }
    }

    /// Make sure the tree has a free leaf after the last slot.
    ///
    /// A full tree is rebuilt with tombstones dropped and at least 50% headroom,
    /// so rebuilds stay amortized O(1) per insert.
    fn reserve_slot(&mut self) {
        if self.slots.len() < self.tree.capacity() {
            return;
        }
        self.compact(self.len() + 1);
    }

    /// Drop tombstones and rebuild the tree, preserving slot order.
    ///
    /// Never hashes or clones keys: index positions are remapped in place.
    fn compact(&mut self, min_slots: usize) {
        let mut remap = vec![0usize; self.slots.len()];
        let mut live = 0;
        for (old, slot) in self.slots.iter().enumerate() {
            if slot.is_some() {
                remap[old] = live;
                live += 1;
            }
        }
        let want = (min_slots + min_slots / 2).max(self.config.capacity);
        let tree = SumTree::from_weights(want, self.slots.iter().flatten().map(|slot| slot.weight));
        debug!(
            "compact: dropped {} tombstones, {} live, capacity {} -> {}",
            self.tombstones,
            live,
            self.tree.capacity(),
            tree.capacity()
        );

        for pos in self.index.values_mut() {
            *pos = remap[*pos];
        }
        self.slots.retain(Option::is_some);
        self.tree = tree;
        self.tombstones = 0;
    }
}

impl<K: fmt::Debug, W: fmt::Debug> fmt::Debug for WeightedSet<K, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.slots
                    .iter()
                    .flatten()
                    .map(|slot| (&slot.key, &slot.weight)),
            )
            .finish()
    }
}

impl<'a, K, W> IntoIterator for &'a WeightedSet<K, W>
where
    K: Eq + Hash + Clone,
    W: Weight,
{
    type Item = (&'a K, W);
    type IntoIter = Iter<'a, K, W>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over `(key, weight)` in insertion order. See [`WeightedSet::iter`].
#[derive(Debug, Clone)]
pub struct Iter<'a, K, W> {
    slots: std::slice::Iter<'a, Option<Slot<K, W>>>,
    remaining: usize,
}

impl<'a, K, W: Copy> Iterator for Iter<'a, K, W> {
    type Item = (&'a K, W);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.slots.by_ref().flatten().next()?;
        self.remaining -= 1;
        Some((&slot.key, slot.weight))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, W: Copy> ExactSizeIterator for Iter<'_, K, W> {}

impl<K, W: Copy> FusedIterator for Iter<'_, K, W> {}

/// Iterator over `(key, interval)` in insertion order. See [`WeightedSet::intervals`].
#[derive(Debug, Clone)]
pub struct Intervals<'a, K, W> {
    inner: Iter<'a, K, W>,
    acc: W,
}

impl<'a, K, W: Weight> Iterator for Intervals<'a, K, W> {
    type Item = (&'a K, Interval<W>);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, weight) = self.inner.next()?;
        let start = self.acc;
        self.acc = start + weight;
        Some((
            key,
            Interval {
                start,
                end: self.acc,
            },
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::cell::Cell;
    use std::hash::Hasher;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn counts<K: Eq + Hash + Clone + fmt::Debug, W: Weight>(
        set: &WeightedSet<K, W>,
        rolls: usize,
        seed: u64,
    ) -> HashMap<K, usize> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut counts = HashMap::new();
        for _ in 0..rolls {
            let k = set.roll_with_rng(&mut rng).expect("non-empty set");
            *counts.entry(k.clone()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn empty_set_has_zero_total() {
        let set: WeightedSet<&str> = WeightedSet::new();
        assert_eq!(set.len(), 0);
        assert_eq!(set.size(), 0);
        assert!(set.is_empty());
        assert_eq!(set.total_weight(), 0.0);
        assert_eq!(set.iter().count(), 0);
    }

    #[test]
    fn roll_on_empty_set_fails() {
        let set: WeightedSet<&str> = WeightedSet::new();
        assert_eq!(set.roll(), Err(WheelError::EmptySet));
    }

    #[test]
    fn roll_on_all_zero_weights_fails() {
        let set = WeightedSet::from_pairs([("a", 0.0), ("b", 0.0)]).expect("valid pairs");
        assert_eq!(set.len(), 2);
        assert_eq!(set.roll(), Err(WheelError::EmptySet));
    }

    #[test]
    fn insert_tracks_total_and_size() {
        let mut set = WeightedSet::new();
        set.insert("a", 1.5).expect("fresh key");
        set.insert("b", 2.0).expect("fresh key");
        set.insert("c", 0.0).expect("fresh key");
        assert_eq!(set.len(), 3);
        assert_eq!(set.total_weight(), 3.5);
        assert_eq!(set.lookup(&"a"), Ok(1.5));
        assert!(set.contains("c"));
        assert!(!set.contains("d"));
    }

    #[test]
    fn duplicate_insert_fails_and_leaves_set_unchanged() {
        let mut set = WeightedSet::from_pairs([("a", 1.0), ("b", 2.0)]).expect("valid pairs");
        let err = set.insert("a", 5.0).expect_err("duplicate rejected");
        assert_eq!(err, WheelError::DuplicateKey("a"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.total_weight(), 3.0);
        assert_eq!(set.lookup(&"a"), Ok(1.0));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut set = WeightedSet::new();
        let err = set.insert("a", -1.0).expect_err("negative rejected");
        assert_eq!(
            err,
            WheelError::InvalidWeight {
                key: "a",
                weight: -1.0
            }
        );
        assert!(set.is_empty());
        assert_eq!(set.total_weight(), 0.0);

        set.insert("a", 1.0).expect("fresh key");
        let err = set.update(&"a", f64::NAN).expect_err("nan rejected");
        assert!(matches!(err, WheelError::InvalidWeight { key: "a", weight } if weight.is_nan()));
        assert_eq!(set.lookup(&"a"), Ok(1.0));
    }

    #[test]
    fn missing_keys_are_reported() {
        let mut set: WeightedSet<String> = WeightedSet::new();
        set.insert("x".to_string(), 1.0).expect("fresh key");
        let missing = WheelError::KeyNotFound("y".to_string());
        assert_eq!(set.lookup("y"), Err(missing.clone()));
        assert_eq!(set.remove("y"), Err(missing.clone()));
        assert_eq!(set.update("y", 3.0), Err(missing));
        assert_eq!(set.get("y"), None);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn integer_overflow_is_rejected() {
        let mut set = WeightedSet::<&str, u8>::new();
        set.insert("a", 200).expect("fits");
        assert_eq!(
            set.insert("b", 100),
            Err(WheelError::WeightOverflow { key: "b" })
        );
        set.insert("b", 55).expect("fits exactly");
        assert_eq!(
            set.update(&"b", 56),
            Err(WheelError::WeightOverflow { key: "b" })
        );
        assert_eq!(set.update(&"a", 10), Ok(200));
        assert_eq!(set.total_weight(), 65);
    }

    #[test]
    fn update_scenario_totals_ten() {
        let mut set = WeightedSet::from_pairs([
            ("alpha", 1.0),
            ("beta", 2.5),
            ("gamma", 2.0),
            ("tick", 1.0),
            ("delta", 1.0),
        ])
        .expect("valid pairs");
        assert_eq!(set.remove(&"tick"), Ok(1.0));
        assert_eq!(set.update(&"alpha", 4.5), Ok(1.0));
        assert_eq!(set.total_weight(), 10.0);
        assert_eq!(set.lookup(&"alpha"), Ok(4.5));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn update_keeps_enumeration_position() {
        let mut set = WeightedSet::from_pairs([("a", 1u32), ("b", 2), ("c", 3)]).expect("valid");
        set.update(&"a", 9).expect("present");
        let order: Vec<_> = set.iter().collect();
        assert_eq!(order, vec![(&"a", 9), (&"b", 2), (&"c", 3)]);
    }

    #[test]
    fn enumeration_round_trips_construction_order() {
        let pairs = vec![("k3", 0.5), ("k1", 2.0), ("k2", 0.0), ("k9", 7.25)];
        let set = WeightedSet::from_pairs(pairs.clone()).expect("valid pairs");
        let got: Vec<(&str, f64)> = set.iter().map(|(k, w)| (*k, w)).collect();
        assert_eq!(got, pairs);
        assert_eq!(set.iter().len(), 4);
        // Restartable.
        assert_eq!(set.iter().count(), 4);
        assert_eq!((&set).into_iter().count(), 4);
    }

    #[test]
    fn reinserted_key_moves_to_the_end() {
        let mut set = WeightedSet::from_pairs([("a", 1), ("b", 1), ("c", 1)]).expect("valid");
        set.remove(&"a").expect("present");
        set.insert("a", 4).expect("fresh again");
        let keys: Vec<_> = set.keys().copied().collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[test]
    fn from_pairs_rejects_repeated_keys() {
        let err = WeightedSet::from_pairs([("a", 1.0), ("b", 1.0), ("a", 2.0)])
            .expect_err("repeat rejected");
        assert_eq!(err, WheelError::DuplicateKey("a"));
    }

    #[test]
    fn insert_many_keeps_applied_prefix() {
        let mut set = WeightedSet::from_pairs([("x", 1u64)]).expect("valid");
        let err = set
            .insert_many([("a", 2), ("b", 3), ("a", 4), ("c", 5)])
            .expect_err("in-batch repeat rejected");
        assert_eq!(err, WheelError::DuplicateKey("a"));
        let keys: Vec<_> = set.keys().copied().collect();
        assert_eq!(keys, vec!["x", "a", "b"]);
        assert_eq!(set.total_weight(), 6);

        assert_eq!(set.insert_many([("c", 1), ("d", 1)]), Ok(2));
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn insert_many_with_existing_key_inserts_nothing() {
        let mut set = WeightedSet::from_pairs([("x", 1u64)]).expect("valid");
        let err = set
            .insert_many([("a", 2), ("b", 3), ("x", 4)])
            .expect_err("existing key rejected");
        assert_eq!(err, WheelError::DuplicateKey("x"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.total_weight(), 1);
        assert!(!set.contains("a"));
        assert_eq!(set.lookup(&"x"), Ok(1));
    }

    thread_local! {
        static CLONE_ARMED: Cell<bool> = const { Cell::new(false) };
        static HASHES: Cell<usize> = const { Cell::new(0) };
    }

    /// Key that counts hashes and refuses to clone while armed.
    #[derive(Debug, PartialEq, Eq)]
    struct Tracked(u32);

    impl Clone for Tracked {
        fn clone(&self) -> Self {
            assert!(!CLONE_ARMED.with(Cell::get), "clone of {self:?} while armed");
            Tracked(self.0)
        }
    }

    impl Hash for Tracked {
        fn hash<H: Hasher>(&self, state: &mut H) {
            HASHES.with(|h| h.set(h.get() + 1));
            self.0.hash(state);
        }
    }

    #[test]
    fn panicking_key_clone_leaves_set_consistent() {
        let mut set = WeightedSet::from_pairs((0..4u32).map(|i| (Tracked(i), i + 1)))
            .expect("valid pairs");
        CLONE_ARMED.with(|a| a.set(true));
        let result = catch_unwind(AssertUnwindSafe(|| set.insert(Tracked(9), 5)));
        CLONE_ARMED.with(|a| a.set(false));

        assert!(result.is_err());
        assert_eq!(set.len(), 4);
        assert_eq!(set.total_weight(), 10);
        assert!(!set.contains(&Tracked(9)));

        set.insert(Tracked(9), 5).expect("fresh key");
        assert_eq!(set.total_weight(), 15);
        assert_eq!(set.total_weight(), set.iter().map(|(_, w)| w).sum::<u32>());
    }

    #[test]
    fn compaction_does_not_hash_or_clone_keys() {
        let config = WheelConfig::new().with_capacity(4).with_compact_ratio(0.25);
        let mut set = WeightedSet::with_config(config);
        for i in 0..8u32 {
            set.insert(Tracked(i), 1u32).expect("fresh key");
        }

        CLONE_ARMED.with(|a| a.set(true));
        let before = HASHES.with(Cell::get);
        for i in 0..3u32 {
            set.remove(&Tracked(i)).expect("present");
        }
        let hashed = HASHES.with(Cell::get) - before;
        CLONE_ARMED.with(|a| a.set(false));

        // One hash per removal lookup; the compaction on the third adds none.
        assert_eq!(hashed, 3);
        assert_eq!(set.tombstones, 0);
        let keys: Vec<u32> = set.keys().map(|k| k.0).collect();
        assert_eq!(keys, vec![3, 4, 5, 6, 7]);
        for i in 3..8u32 {
            assert_eq!(set.lookup(&Tracked(i)), Ok(1));
        }
    }

    #[test]
    fn removing_last_entry_empties_the_set() {
        let mut set = WeightedSet::new();
        set.insert("only", 0.3).expect("fresh key");
        assert_eq!(set.remove(&"only"), Ok(0.3));
        assert!(set.is_empty());
        assert_eq!(set.total_weight(), 0.0);
        assert_eq!(set.roll(), Err(WheelError::EmptySet));
    }

    #[test]
    fn convergence_matches_weight_ratios() {
        let pairs = [("a", 1.0), ("b", 2.0), ("c", 2.0), ("d", 1.0), ("e", 1.0)];
        let set = WeightedSet::from_pairs(pairs).expect("valid pairs");
        assert_eq!(set.total_weight(), 7.0);

        let rolls = 100_000;
        let c = counts(&set, rolls, 7);
        for (key, weight) in set.iter() {
            let observed = c.get(key).copied().unwrap_or(0) as f64 / rolls as f64;
            let expected = weight / 7.0;
            assert!(
                (observed - expected).abs() < 0.01,
                "{key}: observed {observed:.4}, expected {expected:.4}"
            );
        }
    }

    #[test]
    fn fractional_weights_converge() {
        let set = WeightedSet::from_pairs([("p", 0.25), ("q", 0.5), ("r", 1.25)]).expect("valid");
        let rolls = 50_000;
        let c = counts(&set, rolls, 11);
        let expected = [("p", 0.125), ("q", 0.25), ("r", 0.625)];
        for (key, p) in expected {
            let observed = c[key] as f64 / rolls as f64;
            assert!((observed - p).abs() < 0.01, "{key}: {observed:.4} vs {p}");
        }
    }

    #[test]
    fn zero_weight_entry_is_never_rolled() {
        let set = WeightedSet::from_pairs([("a", 1.0), ("ghost", 0.0), ("b", 3.0)]).expect("valid");
        let c = counts(&set, 10_000, 3);
        assert!(!c.contains_key("ghost"));
        assert!(set.keys().any(|k| *k == "ghost"));
    }

    #[test]
    fn removed_key_is_never_rolled() {
        let mut set = WeightedSet::new();
        for i in 0..10u32 {
            set.insert(i.to_string(), f64::from(i + 1)).expect("fresh key");
        }
        set.remove("5").expect("present");
        assert_eq!(set.total_weight(), 55.0 - 6.0);

        let c = counts(&set, 10_000, 5);
        assert!(!c.contains_key("5"));
        assert_eq!(c.len(), 9);
    }

    #[test]
    fn updated_weight_changes_distribution() {
        let mut set = WeightedSet::from_pairs([("a", 1u32), ("b", 1)]).expect("valid");
        set.update(&"a", 0).expect("present");
        let c = counts(&set, 5_000, 9);
        assert_eq!(c.get("b"), Some(&5_000));
        set.update(&"a", 3).expect("present");
        let c = counts(&set, 20_000, 10);
        let share = c["a"] as f64 / 20_000.0;
        assert!((share - 0.75).abs() < 0.02, "share of a = {share:.4}");
    }

    #[test]
    fn compaction_preserves_order_and_weights() {
        let config = WheelConfig::new().with_capacity(4).with_compact_ratio(0.25);
        let mut set = WeightedSet::with_config(config);
        for i in 0..32u64 {
            set.insert(i, i + 1).expect("fresh key");
        }
        for i in (0..32u64).filter(|i| i % 3 == 0) {
            set.remove(&i).expect("present");
        }
        let expected: Vec<(u64, u64)> = (0..32u64)
            .filter(|i| i % 3 != 0)
            .map(|i| (i, i + 1))
            .collect();
        let got: Vec<(u64, u64)> = set.iter().map(|(k, w)| (*k, w)).collect();
        assert_eq!(got, expected);
        assert_eq!(set.total_weight(), expected.iter().map(|(_, w)| w).sum::<u64>());
        assert!(set.tombstones as f64 <= 0.25 * set.slots.len() as f64);

        // Lookups and rolls still resolve through the rebuilt index.
        for (k, w) in &expected {
            assert_eq!(set.lookup(k), Ok(*w));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1_000 {
            let k = set.roll_with_rng(&mut rng).expect("non-empty");
            assert!(k % 3 != 0);
        }
    }

    #[test]
    fn tree_grows_past_initial_capacity() {
        let mut set = WeightedSet::with_capacity(1);
        for i in 0..1_000u32 {
            set.insert(i, 1u32).expect("fresh key");
        }
        assert_eq!(set.len(), 1_000);
        assert_eq!(set.total_weight(), 1_000);
        assert!(set.tree.capacity() >= 1_000);
    }

    #[test]
    fn churn_keeps_tombstones_bounded() {
        let mut set = WeightedSet::new();
        for round in 0..2_000u32 {
            set.insert(round, 1u32).expect("fresh key");
            if round >= 10 {
                set.remove(&(round - 10)).expect("present");
            }
        }
        assert_eq!(set.len(), 10);
        assert_eq!(set.total_weight(), 10);
        assert!(set.slots.len() <= set.tree.capacity());
        assert!(set.tree.capacity() <= 64, "capacity {}", set.tree.capacity());
    }

    #[test]
    fn intervals_partition_the_total() {
        let set =
            WeightedSet::from_pairs([("a", 5u32), ("b", 2), ("z", 0), ("c", 1)]).expect("valid");
        let iv: Vec<_> = set.intervals().map(|(k, i)| (*k, i.start, i.end)).collect();
        assert_eq!(iv, vec![("a", 0, 5), ("b", 5, 7), ("z", 7, 7), ("c", 7, 8)]);
        let (_, zero) = set.intervals().nth(2).expect("third entry");
        assert!(!zero.contains(7));
    }

    #[test]
    fn float_intervals_end_near_the_total() {
        let set = WeightedSet::from_pairs((0..100u32).map(|i| (i, 0.1 * f64::from(i % 7))))
            .expect("valid");
        let (_, last) = set.intervals().last().expect("non-empty");
        let total = set.total_weight();
        assert!((last.end - total).abs() <= 1e-9 * total);
    }

    #[test]
    fn debug_renders_as_map() {
        let set = WeightedSet::from_pairs([("a", 1u8), ("b", 2)]).expect("valid");
        assert_eq!(format!("{set:?}"), r#"{"a": 1, "b": 2}"#);
    }

    #[test]
    fn config_clamps_ratio() {
        assert_eq!(WheelConfig::new().with_compact_ratio(3.0).compact_ratio(), 1.0);
        assert_eq!(WheelConfig::new().with_compact_ratio(-1.0).compact_ratio(), 0.0);
        assert_eq!(WheelConfig::new().with_compact_ratio(f64::NAN).compact_ratio(), 0.5);
        assert_eq!(WheelConfig::new().with_capacity(0).capacity(), 1);
    }

    #[test]
    fn error_messages_name_the_offender() {
        let e: WheelError<&str, f64> = WheelError::KeyNotFound("boy");
        assert_eq!(e.to_string(), r#"key "boy" not found"#);
        let e: WheelError<&str, f64> = WheelError::InvalidWeight {
            key: "x",
            weight: -2.0,
        };
        assert_eq!(
            e.to_string(),
            r#"weight for key "x" must be finite and >= 0 (got -2.0)"#
        );
    }
}
