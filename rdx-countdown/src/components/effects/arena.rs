//! A TTL-tagged instance store shared by all effect generators.

use crate::common::{EffectId, EpochMillis};
use slotmap::SlotMap;

/// An effect instance together with its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Timed<T> {
    pub spawned_at: EpochMillis,
    pub expires_at: EpochMillis,
    pub value: T,
}

impl<T> Timed<T> {
    pub fn is_expired(&self, now: EpochMillis) -> bool {
        now >= self.expires_at
    }
}

/// Self-expiring collection of effect instances.
#[derive(Debug, Clone)]
pub struct EffectArena<T> {
    instances: SlotMap<EffectId, Timed<T>>,
}

impl<T> Default for EffectArena<T> {
    fn default() -> Self {
        Self {
            instances: SlotMap::with_key(),
        }
    }
}

impl<T> EffectArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` until `now + ttl_ms`.
    pub fn spawn(&mut self, value: T, now: EpochMillis, ttl_ms: u64) -> EffectId {
        self.instances.insert(Timed {
            spawned_at: now,
            expires_at: now + ttl_ms as EpochMillis,
            value,
        })
    }

    /// Removes every instance whose lifetime has elapsed. Returns how many went.
    pub fn prune(&mut self, now: EpochMillis) -> usize {
        let before = self.instances.len();
        self.instances.retain(|_, instance| !instance.is_expired(now));
        before - self.instances.len()
    }

    pub fn get(&self, id: EffectId) -> Option<&Timed<T>> {
        self.instances.get(id)
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.instances.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EffectId, &Timed<T>)> {
        self.instances.iter()
    }

    /// Live instances at `now`, skipping ones that expired since the last sweep.
    pub fn live(&self, now: EpochMillis) -> impl Iterator<Item = &Timed<T>> {
        self.instances.values().filter(move |i| !i.is_expired(now))
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_removes_only_expired() {
        let mut arena = EffectArena::new();
        let short = arena.spawn("short", 0, 100);
        let long = arena.spawn("long", 0, 1_000);

        assert_eq!(arena.prune(99), 0);
        assert_eq!(arena.prune(100), 1);
        assert!(!arena.contains(short));
        assert!(arena.contains(long));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn stale_ids_do_not_resolve() {
        let mut arena = EffectArena::new();
        let id = arena.spawn(1u8, 0, 10);
        arena.prune(10);
        let fresh = arena.spawn(2u8, 10, 10);
        assert!(arena.get(id).is_none());
        assert_eq!(arena.get(fresh).map(|t| t.value), Some(2));
    }

    #[test]
    fn live_view_hides_unswept_expired() {
        let mut arena = EffectArena::new();
        arena.spawn((), 0, 50);
        arena.spawn((), 0, 500);
        assert_eq!(arena.live(100).count(), 1);
        assert_eq!(arena.len(), 2);
    }
}
