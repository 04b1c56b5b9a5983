use std::collections::HashSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::cache::{CoherentCache, GenericSetCache, SetCache};
use crate::coherence::{CacheLine, CoherenceState, Residency};
use crate::error::CacheError;
use crate::replacement_policies::{LeastRecentlyUsed, Random, ReplacementPolicy};

const ALL_STATES: [CoherenceState; 5] = [
    CoherenceState::Modified,
    CoherenceState::Owned,
    CoherenceState::Exclusive,
    CoherenceState::Shared,
    CoherenceState::Invalid,
];

/// Every set holds `associativity` distinct tags, and its recency order is a permutation of them
fn assert_consistent<R: ReplacementPolicy>(cache: &SetCache<R>) {
    for set in 0..cache.num_sets() {
        let resident: Vec<u64> = cache.lines(set).iter().map(|line| line.tag).collect();
        let distinct: HashSet<u64> = resident.iter().copied().collect();
        assert_eq!(resident.len() as u64, cache.associativity());
        assert_eq!(distinct.len(), resident.len(), "duplicate tag in set {set}: {resident:?}");
        let mut ordered = cache.recency_order(set);
        ordered.sort_unstable();
        let mut sorted = resident.clone();
        sorted.sort_unstable();
        assert_eq!(ordered, sorted, "recency order of set {set} isn't a permutation of its lines");
        for tag in resident {
            assert_ne!(cache.probe(set, tag), Residency::Absent);
        }
    }
}

fn sorted_tags<R: ReplacementPolicy>(cache: &SetCache<R>, set: u64) -> Vec<u64> {
    let mut tags: Vec<u64> = cache.lines(set).iter().map(|line| line.tag).collect();
    tags.sort_unstable();
    tags
}

#[test]
fn construction_fills_sets_with_invalid_placeholders() {
    let cache = SetCache::new(8, 4, LeastRecentlyUsed).unwrap();
    assert_eq!(cache.num_sets(), 2);
    assert_eq!(cache.associativity(), 4);
    for set in 0..2 {
        let expected: Vec<CacheLine> = (0..4).map(|tag| CacheLine::new(tag, CoherenceState::Invalid)).collect();
        assert_eq!(cache.lines(set), expected.as_slice());
        assert_eq!(cache.recency_order(set), vec![3, 2, 1, 0]);
        assert_eq!(cache.check_writeback(set), (0, false));
    }
    assert_eq!(cache.invalid_line_count(), 8);
    assert_consistent(&cache);
}

#[test]
fn construction_rejects_bad_geometry() {
    assert!(matches!(
        SetCache::new(10, 4, LeastRecentlyUsed),
        Err(CacheError::Geometry { num_lines: 10, associativity: 4 })
    ));
    assert!(matches!(SetCache::new(8, 0, LeastRecentlyUsed), Err(CacheError::ZeroAssociativity)));
    assert!(matches!(SetCache::new(6, 3, Random::seeded(1)), Ok(_)));
}

#[test]
fn lru_evicts_the_least_recently_used_line() {
    let mut cache = SetCache::new(2, 2, LeastRecentlyUsed).unwrap();
    let (a, b, c) = (10, 11, 12);
    cache.insert_line(0, a, CoherenceState::Exclusive);
    cache.insert_line(0, b, CoherenceState::Exclusive);
    assert_eq!(cache.recency_order(0), vec![b, a]);

    // Reading a refreshes it, leaving b as the victim
    assert_eq!(cache.find_tag(0, a), CoherenceState::Owned);
    cache.update_lru(0, a);
    assert_eq!(cache.check_writeback(0), (b, false));

    let evicted = cache.insert_line(0, c, CoherenceState::Exclusive);
    assert_eq!(evicted, CacheLine::new(b, CoherenceState::Exclusive));
    assert_eq!(sorted_tags(&cache, 0), vec![a, c]);
    assert_eq!(cache.recency_order(0), vec![c, a]);
    assert_eq!(cache.find_tag(0, b), CoherenceState::Invalid);
    assert_consistent(&cache);
}

#[test]
fn lru_victim_matches_the_writeback_candidate() {
    let mut cache = SetCache::new(8, 4, LeastRecentlyUsed).unwrap();
    for tag in 20..30 {
        let (candidate, _) = cache.check_writeback(1);
        let evicted = cache.insert_line(1, tag, CoherenceState::Modified);
        assert_eq!(evicted.tag, candidate);
        if tag % 3 == 0 && tag >= 22 {
            cache.update_lru(1, tag - 2);
        }
    }
    assert_consistent(&cache);
}

#[test]
fn writeback_is_owed_for_modified_and_owned_victims() {
    for state in ALL_STATES {
        let mut cache = SetCache::new(1, 1, LeastRecentlyUsed).unwrap();
        cache.insert_line(0, 5, state);
        let expected = matches!(state, CoherenceState::Modified | CoherenceState::Owned);
        assert_eq!(cache.check_writeback(0), (5, expected), "victim state {state:?}");
        assert_eq!(state.needs_writeback(), expected);
    }
}

#[test]
fn writeback_follows_state_changes() {
    let mut cache = SetCache::new(4, 2, LeastRecentlyUsed).unwrap();
    cache.insert_line(1, 40, CoherenceState::Exclusive);
    cache.insert_line(1, 41, CoherenceState::Exclusive);
    assert_eq!(cache.check_writeback(1), (40, false));
    cache.change_state(1, 40, CoherenceState::Owned);
    assert_eq!(cache.check_writeback(1), (40, true));
}

#[test]
fn find_tag_reports_resident_invalid_lines_as_owned() {
    let mut cache = SetCache::new(4, 2, LeastRecentlyUsed).unwrap();
    cache.insert_line(0, 7, CoherenceState::Exclusive);
    cache.change_state(0, 7, CoherenceState::Invalid);
    assert_eq!(cache.find_tag(0, 7), CoherenceState::Owned);
    assert_eq!(cache.probe(0, 7), Residency::Present(CoherenceState::Invalid));
    assert_eq!(cache.probe(0, 7).valid_state(), None);

    // Placeholders are resident too
    assert_eq!(cache.find_tag(1, 0), CoherenceState::Owned);
    assert_eq!(cache.probe(1, 0), Residency::Present(CoherenceState::Invalid));

    assert_eq!(cache.find_tag(0, 99), CoherenceState::Invalid);
    assert_eq!(cache.probe(0, 99), Residency::Absent);
}

#[test]
fn change_state_ignores_absent_tags() {
    let mut cache = SetCache::new(4, 2, LeastRecentlyUsed).unwrap();
    cache.insert_line(0, 7, CoherenceState::Shared);
    let before = cache.lines(0).to_vec();
    cache.change_state(0, 99, CoherenceState::Modified);
    assert_eq!(cache.lines(0), before.as_slice());
    cache.change_state(0, 7, CoherenceState::Modified);
    assert_eq!(cache.probe(0, 7), Residency::Present(CoherenceState::Modified));
}

#[test]
fn update_lru_does_not_change_residency_or_state() {
    let mut cache = SetCache::new(4, 4, LeastRecentlyUsed).unwrap();
    cache.update_lru(0, 0);
    assert_eq!(cache.recency_order(0), vec![0, 3, 2, 1]);
    cache.update_lru(0, 0);
    assert_eq!(cache.recency_order(0), vec![0, 3, 2, 1]);
    cache.update_lru(0, 2);
    assert_eq!(cache.recency_order(0), vec![2, 0, 3, 1]);
    assert_eq!(cache.check_writeback(0), (1, false));
    assert_eq!(cache.invalid_line_count(), 4);
    assert_consistent(&cache);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "isn't resident")]
fn update_lru_on_absent_tag_is_caught_in_debug_builds() {
    let mut cache = SetCache::new(4, 2, LeastRecentlyUsed).unwrap();
    cache.update_lru(0, 1234);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "already resident")]
fn inserting_a_resident_tag_is_caught_in_debug_builds() {
    let mut cache = SetCache::new(4, 2, LeastRecentlyUsed).unwrap();
    cache.insert_line(0, 8, CoherenceState::Shared);
    cache.insert_line(0, 8, CoherenceState::Shared);
}

fn check_state_store_after_eviction<R: ReplacementPolicy>(mut cache: SetCache<R>) {
    for tag in 10..14 {
        cache.insert_line(0, tag, CoherenceState::Modified);
    }
    let evicted = cache.insert_line(0, 99, CoherenceState::Shared);
    assert_ne!(evicted.tag, 99);
    assert_eq!(cache.probe(0, 99), Residency::Present(CoherenceState::Shared));
    assert_eq!(cache.find_tag(0, 99), CoherenceState::Owned);
    assert_eq!(cache.probe(0, evicted.tag), Residency::Absent);
    assert_eq!(cache.lines(0).iter().filter(|line| line.tag == 99).count(), 1);
    assert!(cache.lines(0).contains(&CacheLine::new(99, CoherenceState::Shared)));
    assert!(cache.lines(0).iter().all(|line| line.tag != evicted.tag));

    // The evicted tag is gone from the line store, not just from the recency index
    let before = cache.lines(0).to_vec();
    cache.change_state(0, evicted.tag, CoherenceState::Modified);
    assert_eq!(cache.lines(0), before.as_slice());
    assert_eq!(cache.recency_order(0)[0], 99);
    assert_consistent(&cache);
}

#[test]
fn lru_eviction_updates_the_state_store() {
    check_state_store_after_eviction(SetCache::new(8, 4, LeastRecentlyUsed).unwrap());
}

#[test]
fn random_eviction_updates_the_state_store() {
    for seed in 0..20 {
        check_state_store_after_eviction(SetCache::new(8, 4, Random::seeded(seed)).unwrap());
    }
}

#[test]
fn random_eviction_is_uniform_over_resident_lines() {
    const ASSOCIATIVITY: usize = 4;
    const INSERTIONS: usize = 10_000;
    let mut cache = SetCache::new(ASSOCIATIVITY as u64, ASSOCIATIVITY as u64, Random::seeded(7)).unwrap();
    // Count victims by their position in the recency order, so a bias towards either end shows
    let mut by_rank = [0usize; ASSOCIATIVITY];
    for tag in 100..(100 + INSERTIONS as u64) {
        let before = cache.recency_order(0);
        let evicted = cache.insert_line(0, tag, CoherenceState::Exclusive);
        let rank = before.iter().position(|t| *t == evicted.tag).unwrap();
        by_rank[rank] += 1;
    }
    let expected = INSERTIONS / ASSOCIATIVITY;
    let tolerance = expected / 10;
    for (rank, count) in by_rank.iter().enumerate() {
        assert!(
            count.abs_diff(expected) <= tolerance,
            "rank {rank} evicted {count} times, expected {expected} +/- {tolerance}: {by_rank:?}"
        );
    }
    assert_consistent(&cache);
}

#[test]
fn random_eviction_never_picks_the_inserted_tag() {
    let mut cache = SetCache::new(2, 2, Random::seeded(3)).unwrap();
    for tag in 10..1000 {
        let evicted = cache.insert_line(0, tag, CoherenceState::Shared);
        assert_ne!(evicted.tag, tag);
        assert_eq!(cache.recency_order(0)[0], tag);
    }
}

#[test]
fn seeded_random_caches_are_reproducible() {
    let mut first = SetCache::new(16, 4, Random::seeded(5)).unwrap();
    let mut second = SetCache::new(16, 4, Random::seeded(5)).unwrap();
    for tag in 10..500 {
        let set = tag % 4;
        assert_eq!(
            first.insert_line(set, tag, CoherenceState::Exclusive),
            second.insert_line(set, tag, CoherenceState::Exclusive)
        );
    }
    for set in 0..4 {
        assert_eq!(first.recency_order(set), second.recency_order(set));
    }
}

fn run_mixed_workload<R: ReplacementPolicy>(cache: &mut SetCache<R>, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..5_000 {
        let set = rng.gen_range(0..cache.num_sets());
        let tag = rng.gen_range(0..32);
        match cache.probe(set, tag) {
            Residency::Present(_) => {
                cache.update_lru(set, tag);
                if rng.gen_bool(0.3) {
                    cache.change_state(set, tag, ALL_STATES[rng.gen_range(0..ALL_STATES.len())]);
                }
            }
            Residency::Absent => {
                cache.insert_line(set, tag, CoherenceState::Exclusive);
                assert_eq!(cache.recency_order(set)[0], tag);
            }
        }
        assert_consistent(cache);
    }
}

#[test]
fn invariants_hold_under_mixed_workloads() {
    run_mixed_workload(&mut SetCache::new(16, 4, LeastRecentlyUsed).unwrap(), 1);
    run_mixed_workload(&mut SetCache::new(16, 4, Random::seeded(2)).unwrap(), 2);
    run_mixed_workload(&mut SetCache::new(8, 8, Random::seeded(3)).unwrap(), 3);
}

#[test]
fn generic_cache_dispatches_to_the_policy() {
    let mut lru = GenericSetCache::from(SetCache::new(8, 4, LeastRecentlyUsed).unwrap());
    let mut random = GenericSetCache::from(SetCache::new(8, 4, Random::seeded(1)).unwrap());
    assert_eq!(lru.policy_name(), "lru");
    assert_eq!(random.policy_name(), "random");

    let evicted = lru.insert_line(1, 50, CoherenceState::Modified);
    assert_eq!(evicted, CacheLine::new(0, CoherenceState::Invalid));
    assert_eq!(lru.recency_order(1), vec![50, 3, 2, 1]);
    assert_eq!(lru.check_writeback(1), (1, false));

    random.insert_line(1, 50, CoherenceState::Modified);
    assert_eq!(random.probe(1, 50), Residency::Present(CoherenceState::Modified));
    assert_eq!(random.invalid_line_count(), 7);
    assert_eq!(random.num_sets(), 2);
}
