//! Bounded consist info cache
//!
//! Slot 0 always holds the own consist, slots 1..N hold foreign consists
//! keyed by UUID.

use crate::consist::ConsistInfo;
use crate::core::CstUuid;
use crate::iec61375::TTI_CACHED_CONSISTS;
use log::debug;

/// Slot reserved for the own consist
pub const OWN_SLOT: usize = 0;

/// Where a foreign consist goes when its UUID is not cached and no slot is free
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReplacementPolicy {
    /// Always overwrite slot 1
    ///
    /// Matches the long-standing behaviour of the TTDB accessor; starves
    /// slots 2..N once the cache is full.
    #[default]
    FirstForeignSlot,
    /// Cycle through slots 1..N
    RoundRobin,
}

/// Fixed-capacity consist info cache
#[derive(Debug, Clone)]
pub struct ConsistInfoCache<const N: usize = TTI_CACHED_CONSISTS> {
    slots: [Option<ConsistInfo>; N],
    policy: ReplacementPolicy,
    next_victim: usize,
}

impl<const N: usize> ConsistInfoCache<N> {
    const HAS_FOREIGN_SLOTS: () = assert!(N >= 2, "cache needs the own slot plus one foreign slot");

    /// Create an empty cache
    pub fn new(policy: ReplacementPolicy) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::HAS_FOREIGN_SLOTS;
        ConsistInfoCache {
            slots: std::array::from_fn(|_| None),
            policy,
            next_victim: 1,
        }
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        N
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Check if no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a decoded consist info, replacing whatever occupied its slot
    ///
    /// An own consist also frees any foreign slot holding the same UUID, so
    /// a consist is never cached twice. Returns the slot index used.
    pub fn store(&mut self, info: ConsistInfo, is_own: bool) -> usize {
        let slot = if is_own {
            for i in 1..N {
                if self.slots[i]
                    .as_ref()
                    .is_some_and(|cached| cached.cst_uuid == info.cst_uuid)
                {
                    debug!("Own consist info {} moved out of cache slot {}", info.cst_uuid, i);
                    self.slots[i] = None;
                }
            }
            OWN_SLOT
        } else {
            self.foreign_slot_for(&info.cst_uuid)
        };
        if let Some(old) = self.slots[slot].replace(info) {
            debug!("Replaced consist info {} in cache slot {}", old.cst_uuid, slot);
        }
        slot
    }

    fn foreign_slot_for(&mut self, uuid: &CstUuid) -> usize {
        let cached = (1..N).find(|&i| {
            self.slots[i]
                .as_ref()
                .is_some_and(|info| info.cst_topo_cnt != 0 && info.cst_uuid == *uuid)
        });
        if let Some(slot) = cached {
            return slot;
        }
        if let Some(free) = (1..N).find(|&i| self.slots[i].is_none()) {
            return free;
        }
        match self.policy {
            ReplacementPolicy::FirstForeignSlot => 1,
            ReplacementPolicy::RoundRobin => {
                let slot = self.next_victim;
                self.next_victim = if slot + 1 < N { slot + 1 } else { 1 };
                slot
            }
        }
    }

    /// Find a consist by UUID, `None` addresses the own consist
    pub fn lookup(&self, uuid: Option<&CstUuid>) -> Option<&ConsistInfo> {
        match uuid {
            None => self.own(),
            Some(uuid) => self
                .slots
                .iter()
                .flatten()
                .find(|info| info.cst_uuid == *uuid),
        }
    }

    /// Find a consist by label (case-insensitive), `None` addresses the own consist
    pub fn lookup_label(&self, label: Option<&str>) -> Option<&ConsistInfo> {
        match label {
            None => self.own(),
            Some(label) => self
                .slots
                .iter()
                .flatten()
                .find(|info| info.cst_id.matches(label)),
        }
    }

    /// The own consist info, if cached
    pub fn own(&self) -> Option<&ConsistInfo> {
        self.slots[OWN_SLOT].as_ref()
    }

    /// Empty a slot, returning its previous content
    pub fn evict(&mut self, slot: usize) -> Option<ConsistInfo> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Empty every slot
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    /// Occupied slots with their index
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ConsistInfo)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|info| (i, info)))
    }
}

impl<const N: usize> Default for ConsistInfoCache<N> {
    fn default() -> Self {
        Self::new(ReplacementPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{consist_info, sealed, uuid};

    #[test]
    fn test_own_consist_pinned_to_slot_zero() {
        let mut cache: ConsistInfoCache = ConsistInfoCache::default();
        assert_eq!(cache.store(sealed(consist_info(uuid(2), "B", 1, 0)), false), 1);
        assert_eq!(cache.store(sealed(consist_info(uuid(1), "A", 1, 0)), true), OWN_SLOT);
        assert_eq!(cache.own().map(|i| i.cst_uuid), Some(uuid(1)));
        assert_eq!(cache.lookup(None).map(|i| i.cst_uuid), Some(uuid(1)));
        assert_eq!(cache.lookup_label(Some("b")).map(|i| i.cst_uuid), Some(uuid(2)));

        // a later own record replaces slot 0
        cache.store(sealed(consist_info(uuid(3), "C", 2, 0)), true);
        assert_eq!(cache.own().map(|i| i.cst_uuid), Some(uuid(3)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_own_consist_leaves_no_foreign_duplicate() {
        let mut cache: ConsistInfoCache = ConsistInfoCache::default();
        // arrived before the own consist number was known
        assert_eq!(cache.store(sealed(consist_info(uuid(1), "A", 1, 0)), false), 1);
        cache.store(sealed(consist_info(uuid(2), "B", 1, 0)), false);

        assert_eq!(cache.store(sealed(consist_info(uuid(1), "A", 1, 0)), true), OWN_SLOT);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.iter().filter(|(_, c)| c.cst_uuid == uuid(1)).count(), 1);
        // the freed slot is taken by the next foreign consist
        assert_eq!(cache.store(sealed(consist_info(uuid(3), "C", 1, 0)), false), 1);
    }

    #[test]
    fn test_same_uuid_reuses_slot() {
        let mut cache: ConsistInfoCache = ConsistInfoCache::default();
        cache.store(sealed(consist_info(uuid(2), "B", 1, 0)), false);
        cache.store(sealed(consist_info(uuid(3), "C", 1, 0)), false);
        let slot = cache.store(sealed(consist_info(uuid(3), "C", 4, 0)), false);
        assert_eq!(slot, 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(Some(&uuid(3))).map(|i| i.veh_cnt()), Some(4));
    }

    #[test]
    fn test_capacity_invariant() {
        let mut cache: ConsistInfoCache = ConsistInfoCache::default();
        for n in 1..=20u8 {
            cache.store(sealed(consist_info(uuid(n), "X", 1, 0)), false);
            assert!(cache.len() <= cache.capacity());
        }
        // foreign slots are full, slot 0 stays reserved
        assert_eq!(cache.len(), TTI_CACHED_CONSISTS - 1);
        assert!(cache.own().is_none());
        // the default policy keeps overwriting slot 1
        assert_eq!(cache.lookup(Some(&uuid(20))).map(|_| ()), Some(()));
        assert_eq!(cache.iter().find(|(i, _)| *i == 1).map(|(_, c)| c.cst_uuid), Some(uuid(20)));
        assert!(cache.lookup(Some(&uuid(8))).is_none());
    }

    #[test]
    fn test_round_robin_policy() {
        let mut cache: ConsistInfoCache<4> = ConsistInfoCache::new(ReplacementPolicy::RoundRobin);
        for n in 1..=3u8 {
            cache.store(sealed(consist_info(uuid(n), "X", 1, 0)), false);
        }
        assert_eq!(cache.store(sealed(consist_info(uuid(4), "X", 1, 0)), false), 1);
        assert_eq!(cache.store(sealed(consist_info(uuid(5), "X", 1, 0)), false), 2);
        assert_eq!(cache.store(sealed(consist_info(uuid(6), "X", 1, 0)), false), 3);
        assert_eq!(cache.store(sealed(consist_info(uuid(7), "X", 1, 0)), false), 1);
    }

    #[test]
    fn test_evict_and_clear() {
        let mut cache: ConsistInfoCache = ConsistInfoCache::default();
        cache.store(sealed(consist_info(uuid(1), "A", 1, 0)), true);
        cache.store(sealed(consist_info(uuid(2), "B", 1, 0)), false);
        assert_eq!(cache.evict(OWN_SLOT).map(|i| i.cst_uuid), Some(uuid(1)));
        assert!(cache.evict(OWN_SLOT).is_none());
        assert!(cache.evict(99).is_none());
        cache.clear();
        assert!(cache.is_empty());
    }
}
