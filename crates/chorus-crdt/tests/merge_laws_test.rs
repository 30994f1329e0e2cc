//! Property tests: every merge is commutative, associative and idempotent.

use chorus_core::models::UniqueTag;
use chorus_core::{LogicalClock, LwwStamp, ReplicaId};
use chorus_crdt::{AddWinsSet, AgentStateCRDT, CrdtValue, GCounter, GSet, LWWElementSet, TwoPSet};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

const REPLICAS: [&str; 3] = ["r0", "r1", "r2"];

fn stamp(wall: i64, replica: usize, counter: u64) -> LwwStamp {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    LwwStamp::new(
        base + Duration::seconds(wall),
        LogicalClock::at(REPLICAS[replica], counter),
    )
}

fn assert_laws<T, F>(a: &T, b: &T, c: &T, merge: F) -> Result<(), TestCaseError>
where
    T: PartialEq + std::fmt::Debug,
    F: Fn(&T, &T) -> T,
{
    prop_assert_eq!(merge(a, b), merge(b, a), "commutativity");
    prop_assert_eq!(
        merge(&merge(a, b), c),
        merge(a, &merge(b, c)),
        "associativity"
    );
    prop_assert_eq!(&merge(a, a), a, "idempotence");
    Ok(())
}

fn split3<T>(ops: &[(usize, T)]) -> [Vec<(usize, &T)>; 3] {
    let mut out: [Vec<(usize, &T)>; 3] = Default::default();
    for (i, (which, op)) in ops.iter().enumerate() {
        out[*which].push((i, op));
    }
    out
}

fn gset_strategy() -> impl Strategy<Value = GSet<u8>> {
    proptest::collection::vec(0u8..16, 0..12).prop_map(|v| v.into_iter().collect())
}

fn gcounter_strategy() -> impl Strategy<Value = GCounter> {
    proptest::collection::vec((0usize..3, 0u64..20), 0..8).prop_map(|entries| {
        let mut c = GCounter::new();
        for (r, n) in entries {
            c.raise_to(&ReplicaId::from(REPLICAS[r]), n);
        }
        c
    })
}

fn two_p_strategy() -> impl Strategy<Value = TwoPSet<u8>> {
    proptest::collection::vec((0u8..8, any::<bool>()), 0..12).prop_map(|ops| {
        let mut s = TwoPSet::new();
        for (e, add) in ops {
            if add {
                s.insert(e);
            } else {
                s.remove(e);
            }
        }
        s
    })
}

/// (state, key, value or removal, wall seconds, replica)
type LwwOp = (u8, Option<u8>, i64, usize);

fn lww_sets(ops: &[(usize, LwwOp)]) -> [LWWElementSet<u8, u8>; 3] {
    let mut sets: [LWWElementSet<u8, u8>; 3] = Default::default();
    for (which, part) in split3(ops).iter().enumerate() {
        for (i, (key, value, wall, replica)) in part {
            let s = stamp(*wall, *replica, *i as u64 + 1);
            match value {
                Some(v) => sets[which].insert(*key, *v, s),
                None => sets[which].remove(*key, s),
            };
        }
    }
    sets
}

fn add_wins_sets(ops: &[(usize, (u8, bool))]) -> [AddWinsSet<u8>; 3] {
    let mut sets: [AddWinsSet<u8>; 3] = Default::default();
    for (which, part) in split3(ops).iter().enumerate() {
        for (i, (element, add)) in part {
            if *add {
                sets[which].add(*element, UniqueTag::new(REPLICAS[which], *i as u64 + 1));
            } else {
                sets[which].remove(element);
            }
        }
    }
    sets
}

proptest! {
    #[test]
    fn gset_merge_laws(a in gset_strategy(), b in gset_strategy(), c in gset_strategy()) {
        assert_laws(&a, &b, &c, GSet::merge)?;
    }

    #[test]
    fn gcounter_merge_laws(a in gcounter_strategy(), b in gcounter_strategy(), c in gcounter_strategy()) {
        assert_laws(&a, &b, &c, GCounter::merge)?;
        prop_assert!(a.merge(&b).value() >= a.value().max(b.value()));
    }

    #[test]
    fn two_p_set_merge_laws(a in two_p_strategy(), b in two_p_strategy(), c in two_p_strategy()) {
        assert_laws(&a, &b, &c, TwoPSet::merge)?;
    }

    #[test]
    fn lww_element_set_merge_laws(
        ops in proptest::collection::vec(
            (0usize..3, (0u8..6, proptest::option::of(any::<u8>()), 0i64..4, 0usize..3)),
            0..30,
        )
    ) {
        let [a, b, c] = lww_sets(&ops);
        assert_laws(&a, &b, &c, LWWElementSet::merge)?;
    }

    #[test]
    fn add_wins_set_merge_laws(
        ops in proptest::collection::vec((0usize..3, (0u8..6, any::<bool>())), 0..30)
    ) {
        let [a, b, c] = add_wins_sets(&ops);
        assert_laws(&a, &b, &c, AddWinsSet::merge)?;
    }

    #[test]
    fn crdt_value_merge_laws(
        kinds in (0usize..5, 0usize..5, 0usize..5),
        sets in (gset_strategy(), gcounter_strategy(), two_p_strategy()),
        aw in proptest::collection::vec((0usize..3, (0u8..6, any::<bool>())), 0..20),
        lww in proptest::collection::vec(
            (0usize..3, (0u8..6, proptest::option::of(any::<u8>()), 0i64..4, 0usize..3)),
            0..20,
        ),
    ) {
        let aws = add_wins_sets(&aw);
        let lwws = lww_sets(&lww);
        let pick = |kind: usize, slot: usize| -> CrdtValue<u8, u8> {
            match kind {
                0 => CrdtValue::GSet(sets.0.clone()),
                1 => CrdtValue::GCounter(sets.1.clone()),
                2 => CrdtValue::TwoPSet(sets.2.clone()),
                3 => CrdtValue::LwwElementSet(lwws[slot].clone()),
                _ => CrdtValue::AddWinsSet(aws[slot].clone()),
            }
        };
        let a = pick(kinds.0, 0);
        let b = pick(kinds.1, 1);
        let c = pick(kinds.2, 2);
        assert_laws(&a, &b, &c, CrdtValue::merge)?;
    }

    #[test]
    fn agent_state_merge_laws(
        ops in proptest::collection::vec((0usize..3, (0u8..3, 0u8..4, 0u64..5)), 0..24)
    ) {
        let mut states: [AgentStateCRDT; 3] = Default::default();
        for (i, (which, (kind, key, n))) in ops.iter().enumerate() {
            let origin = REPLICAS[*which];
            let counter = i as u64 + 1;
            let event = match kind {
                0 => test_fixtures::memory_event(origin, counter, &format!("fact {key}")),
                1 => test_fixtures::knowledge_event(origin, counter, &format!("k{key}"), 0.5, *n != 0),
                _ => test_fixtures::belief_event(origin, counter, &format!("b{key}"), *n, &["doc"]),
            };
            states[*which].apply_delta(&event).unwrap();
        }
        let [a, b, c] = &states;
        assert_laws(a, b, c, AgentStateCRDT::merge)?;
    }
}
