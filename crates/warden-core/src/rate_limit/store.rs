//! Sharded, bounded key-value store
//!
//! Each tracker keeps its per-key records in a fixed number of shards, every
//! shard being an LRU cache behind its own mutex. Operations on one key only
//! lock that key's shard, and the total number of records never exceeds the
//! configured capacity.
//!
//! When a full shard needs room for a new key it gives up records in this
//! order: expired ones, then the least recently used record that enforces
//! nothing, and only when every record is enforcing a lock or block, the
//! least recently used one.

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::prelude::*;

/// How much a record is worth keeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
	/// Nothing left in it; indistinguishable from a missing record
	Expired,
	/// Holds live history but enforces nothing right now
	Evictable,
	/// Enforces an active lock or block
	Protected,
}

pub struct ShardedStore<K, V> {
	shards: Box<[Mutex<LruCache<K, V>>]>,
	hasher: RandomState,
}

impl<K: Hash + Eq + Clone, V> ShardedStore<K, V> {
	/// Create a store holding at most roughly `capacity` entries across `shards` stripes
	pub fn new(capacity: usize, shards: usize) -> Self {
		let shards = shards.max(1);
		let per_shard = NonZeroUsize::new(capacity.div_ceil(shards)).unwrap_or(NonZeroUsize::MIN);
		let shards = (0..shards).map(|_| Mutex::new(LruCache::new(per_shard))).collect();
		Self { shards, hasher: RandomState::new() }
	}

	fn shard<Q: Hash + ?Sized>(&self, key: &Q) -> &Mutex<LruCache<K, V>> {
		let hash = self.hasher.hash_one(key);
		let idx = usize::try_from(hash % self.shards.len() as u64).unwrap_or(0);
		&self.shards[idx]
	}

	/// Run `f` on the entry for `key`, creating it with `init` if missing
	///
	/// Creating an entry in a full shard first makes room, judging the
	/// existing records with `retention`.
	pub fn with_entry<Q, R>(
		&self,
		key: &Q,
		init: impl FnOnce() -> V,
		retention: impl FnMut(&mut V) -> Retention,
		f: impl FnOnce(&mut V) -> R,
	) -> R
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
	{
		let mut shard = self.shard(key).lock();
		if let Some(value) = shard.get_mut(key) {
			return f(value);
		}
		if shard.len() >= shard.cap().get() {
			make_room(&mut *shard, retention);
		}
		f(shard.get_or_insert_mut(key.to_owned(), init))
	}

	/// Run `f` on the entry for `key` if it exists
	pub fn with_existing<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Option<R>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let mut shard = self.shard(key).lock();
		shard.get_mut(key).map(f)
	}

	/// Read an entry without touching its LRU position
	pub fn peek<Q, R>(&self, key: &Q, f: impl FnOnce(&V) -> R) -> Option<R>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let shard = self.shard(key).lock();
		shard.peek(key).map(f)
	}

	pub fn remove<Q>(&self, key: &Q) -> Option<V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.shard(key).lock().pop(key)
	}

	/// Drop every expired entry, returning how many were removed
	///
	/// Each shard stays locked while it is examined, so an entry cannot be
	/// removed while another thread is updating it.
	pub fn sweep(&self, mut retention: impl FnMut(&mut V) -> Retention) -> usize {
		self.shards.iter().map(|shard| drop_expired(&mut *shard.lock(), &mut retention)).sum()
	}

	/// Number of entries satisfying `pred`
	pub fn count(&self, pred: impl Fn(&V) -> bool) -> usize {
		self.shards.iter().map(|shard| shard.lock().iter().filter(|(_, v)| pred(v)).count()).sum()
	}

	pub fn len(&self) -> usize {
		self.shards.iter().map(|shard| shard.lock().len()).sum()
	}
}

fn drop_expired<K: Hash + Eq + Clone, V>(
	shard: &mut LruCache<K, V>,
	retention: &mut impl FnMut(&mut V) -> Retention,
) -> usize {
	let doomed: Vec<K> = shard
		.iter_mut()
		.filter_map(|(key, value)| (retention(value) == Retention::Expired).then(|| key.clone()))
		.collect();
	for key in &doomed {
		shard.pop(key);
	}
	doomed.len()
}

/// Free at least one slot in a full shard
fn make_room<K: Hash + Eq + Clone, V>(
	shard: &mut LruCache<K, V>,
	mut retention: impl FnMut(&mut V) -> Retention,
) {
	if drop_expired(shard, &mut retention) > 0 {
		return;
	}
	// Iteration runs from most to least recently used
	let victim = shard
		.iter_mut()
		.filter_map(|(key, value)| (retention(value) == Retention::Evictable).then(|| key.clone()))
		.last();
	match victim {
		Some(key) => {
			shard.pop(&key);
		}
		None => {
			warn!(
				capacity = shard.cap().get(),
				"Tracker shard full of active locks or blocks, evicting the least recently used one"
			);
			shard.pop_lru();
		}
	}
}

impl<K, V> std::fmt::Debug for ShardedStore<K, V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ShardedStore").field("shards", &self.shards.len()).finish_non_exhaustive()
	}
}


// vim: ts=4
