/// Property-based tests for the persistent map and strategy selection
///
/// These tests use proptest to generate random inputs and check invariants
/// that must hold for any sequence of inserts or registrations.

use ferrous_ioc::{ActivationStrategy, Container, Locator, PersistentMap};
use proptest::prelude::*;
use std::collections::BTreeMap;

proptest! {
    // Property: a persistent map answers lookups exactly like a BTreeMap fed the same inserts
    #[test]
    fn matches_btree_map(entries in prop::collection::vec((0u16..512, any::<u32>()), 0..200)) {
        let mut expected = BTreeMap::new();
        let mut map = PersistentMap::new();
        for (key, value) in &entries {
            expected.insert(*key, *value);
            map = map.insert(*key, *value);
        }

        prop_assert_eq!(map.len(), expected.len());
        let actual: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
        let expected_entries: Vec<_> = expected.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(actual, expected_entries);
        for key in 0u16..512 {
            prop_assert_eq!(map.get(&key), expected.get(&key));
        }
    }
}

proptest! {
    // Property: older versions are unaffected by later inserts
    #[test]
    fn old_versions_are_preserved(keys in prop::collection::vec(any::<i32>(), 1..100)) {
        let mut versions = vec![PersistentMap::new()];
        for (index, key) in keys.iter().enumerate() {
            let next = versions[versions.len() - 1].insert(*key, index);
            versions.push(next);
        }

        for (version, map) in versions.iter().enumerate() {
            let mut expected = BTreeMap::new();
            for (index, key) in keys.iter().take(version).enumerate() {
                expected.insert(*key, index);
            }
            prop_assert_eq!(map.len(), expected.len());
            for (key, index) in &expected {
                prop_assert_eq!(map.get(key), Some(index));
            }
        }
    }
}

proptest! {
    // Property: the tree stays AVL balanced, so height is logarithmic in size
    #[test]
    fn height_stays_logarithmic(keys in prop::collection::vec(any::<u64>(), 1..500)) {
        let map = keys.iter().fold(PersistentMap::new(), |map, key| map.insert(*key, ()));
        let bound = 1.45 * ((map.len() + 2) as f64).log2();
        prop_assert!((map.height() as f64) <= bound, "height {} exceeds {}", map.height(), bound);
    }
}

proptest! {
    // Property: sequential inserts, the worst case for an unbalanced tree, stay balanced too
    #[test]
    fn sorted_inserts_stay_balanced(len in 1usize..2000) {
        let map = (0..len).fold(PersistentMap::new(), |map, key| map.insert(key, key));
        let bound = 1.45 * ((len + 2) as f64).log2();
        prop_assert!((map.height() as f64) <= bound);
        prop_assert!(map.keys().copied().eq(0..len));
    }
}

proptest! {
    // Property: the highest priority wins, ties going to the earliest registration
    #[test]
    fn selection_prefers_priority_then_registration_order(priorities in prop::collection::vec(-5i32..5, 1..12)) {
        let container = Container::new();
        container
            .configure(|r| {
                for (index, priority) in priorities.iter().enumerate() {
                    r.export(
                        ActivationStrategy::build::<usize>()
                            .instance(index)
                            .priority(*priority)
                            .finish(),
                    );
                }
            })
            .unwrap();

        let best = priorities.iter().copied().max().unwrap();
        let expected = priorities.iter().position(|p| *p == best).unwrap();
        prop_assert_eq!(*container.locate::<usize>().unwrap(), expected);

        let all: Vec<usize> = container.locate_all::<usize>().unwrap().iter().map(|v| **v).collect();
        let mut order: Vec<usize> = (0..priorities.len()).collect();
        order.sort_by_key(|index| std::cmp::Reverse(priorities[*index]));
        prop_assert_eq!(all, order);
    }
}
