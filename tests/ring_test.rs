/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests for the sliding window [`Ring`]: the flow cap, rotation, re-indexing, and persistence.

mod common;

use borsh::{BorshDeserialize, BorshSerialize};
use common::validators::{identities, power, set_of};
use validator_window::{
    types::{
        data_types::{Power, MAX_TOTAL_VOTING_POWER},
        validator::Identity,
    },
    validators::{
        ring::{unpersist_ring, PersistedRing, UnpersistError},
        History, PowerChangeError, Reader, Ring, Set,
    },
};

#[test]
fn windowed_ring_test() {
    let ids = identities(3);
    let (a, b, c) = (&ids[0], &ids[1], &ids[2]);

    let mut ring = Ring::new(&set_of(&[*a], &[10000]), 3);
    assert_eq!(ring.max_flow(), power(3332));

    assert_eq!(ring.alter_power(a, power(7000)).unwrap(), power(3000));
    assert_eq!(ring.alter_power(b, power(23)).unwrap(), power(23));
    assert_eq!(ring.alter_power(c, power(309)).unwrap(), power(309));

    let (total_power_change, total_flow) = ring.rotate().unwrap();
    assert_eq!(total_power_change, power(7000 + 23 + 309 - 10000));
    assert_eq!(total_flow, power(10000 / 3 - 1));
    assert_eq!(ring.current_set(), &set_of(&ids, &[7000, 23, 309]));
    assert_eq!(ring.previous_set(), &set_of(&[*a], &[10000]));
}

#[test]
fn windowed_ring_rejects_flow_over_the_cap() {
    let ids = identities(3);
    let (a, b, c) = (&ids[0], &ids[1], &ids[2]);

    let mut ring = Ring::new(&set_of(&[*a], &[10000]), 3);
    ring.alter_power(a, power(7000)).unwrap();
    ring.alter_power(b, power(23)).unwrap();

    let before = ring.clone();
    let err = ring.alter_power(c, power(310)).unwrap_err();
    match err {
        PowerChangeError::FlowCapExceeded {
            address,
            flow,
            total_flow,
            max_flow,
            allowable_flow,
            ..
        } => {
            assert_eq!(address, c.address());
            assert_eq!(flow, power(310));
            assert_eq!(total_flow, power(3023));
            assert_eq!(max_flow, power(3332));
            assert_eq!(allowable_flow, power(309));
        }
        other => panic!("unexpected error: {}", other),
    }
    // Rejection is atomic.
    assert_eq!(ring, before);
    assert_eq!(ring.power(&c.address()), power(0));
}

#[test]
fn flow_is_counted_once_per_validator_and_reset_by_rotation() {
    let ids = identities(3);
    let (a, b, c) = (&ids[0], &ids[1], &ids[2]);

    let mut ring = Ring::new(&set_of(&[*a], &[10000]), 3);
    ring.alter_power(b, power(3000)).unwrap();
    ring.alter_power(b, power(3332)).unwrap();
    assert_eq!(ring.flow().total_power(), power(3332));
    assert!(ring.alter_power(c, power(1)).is_err());

    ring.rotate().unwrap();
    assert!(ring.flow().is_empty());

    // The new baseline has a total power of 13332, so the cap is 4443.
    assert_eq!(ring.max_flow(), power(4443));
    ring.alter_power(b, power(3332 + 4442)).unwrap();
    ring.alter_power(c, power(1)).unwrap();
    assert!(matches!(
        ring.alter_power(c, power(2)),
        Err(PowerChangeError::FlowCapExceeded { .. })
    ));
}

#[test]
fn set_power_replaces_the_flow_of_an_earlier_alter() {
    let ids = identities(3);
    let (a, b, _) = (&ids[0], &ids[1], &ids[2]);

    let mut ring = Ring::new(&set_of(&ids, &[1000, 1000, 1000]), 3);
    assert_eq!(ring.max_flow(), power(999));

    assert_eq!(ring.alter_power(a, power(1500)).unwrap(), power(500));
    assert_eq!(ring.set_power(a, power(1000)).unwrap(), power(0));
    assert_eq!(ring.flow().total_power(), power(0));

    // The whole cap is available again.
    assert_eq!(ring.alter_power(b, power(1999)).unwrap(), power(999));
    let (total_power_change, total_flow) = ring.rotate().unwrap();
    assert_eq!(total_power_change, power(999));
    assert_eq!(total_flow, power(999));
}

#[test]
fn set_power_is_uncapped_but_counts_towards_the_flow() {
    let ids = identities(3);
    let (a, b, c) = (&ids[0], &ids[1], &ids[2]);

    let mut ring = Ring::new(&set_of(&[*a], &[1000]), 3);
    assert_eq!(ring.set_power(b, power(5000)).unwrap(), power(5000));
    assert_eq!(ring.flow().total_power(), power(5000));
    assert!(matches!(
        ring.set_power(c, power(-1)),
        Err(PowerChangeError::NegativePower { .. })
    ));
    assert!(matches!(
        ring.set_power(c, Power::from(MAX_TOTAL_VOTING_POWER)),
        Err(PowerChangeError::TotalPowerExceeded { .. })
    ));

    // Capped changes see the flow of the uncapped one.
    assert!(matches!(
        ring.alter_power(c, power(1)),
        Err(PowerChangeError::FlowCapExceeded { .. })
    ));
    assert_eq!(ring.rotate().unwrap(), (power(5000), power(5000)));
}

#[test]
fn ring_rejects_total_power_over_the_ceiling() {
    let ids = identities(2);
    let mut ring = Ring::new(&set_of(&ids[..1], &[MAX_TOTAL_VOTING_POWER - 1]), 2);

    ring.alter_power(&ids[1], power(1)).unwrap();
    let before = ring.clone();
    assert!(matches!(
        ring.alter_power(&ids[1], power(2)),
        Err(PowerChangeError::TotalPowerExceeded { .. })
    ));
    assert!(matches!(
        ring.alter_power(&ids[0], power(-2)),
        Err(PowerChangeError::NegativePower { .. })
    ));
    assert_eq!(ring, before);
}

#[test]
fn idle_rotation_changes_nothing() {
    let ids = identities(2);
    let mut ring = Ring::new(&set_of(&ids, &[1000, 2000]), 4);

    for _ in 0..6 {
        let (total_power_change, total_flow) = ring.rotate().unwrap();
        assert_eq!(total_power_change, power(0));
        assert_eq!(total_flow, power(0));
        assert_eq!(ring.current_set(), &set_of(&ids, &[1000, 2000]));
    }
    assert_eq!(ring.head(), 6 % 4);
}

#[test]
fn changes_leave_the_window_after_size_rotations() {
    let ids = identities(3);
    let (a, b, c) = (&ids[0], &ids[1], &ids[2]);

    let mut ring = Ring::new(&set_of(&[*a], &[10000]), 3);
    ring.alter_power(a, power(7000)).unwrap();
    ring.alter_power(b, power(23)).unwrap();
    ring.alter_power(c, power(309)).unwrap();

    ring.rotate().unwrap();
    assert_eq!(ring.window_power(), &set_of(&ids, &[7000, 23, 309]));
    ring.rotate().unwrap();
    assert_eq!(ring.window_power(), &set_of(&ids, &[7000, 23, 309]));
    ring.rotate().unwrap();
    assert!(ring.window_power().is_empty());
    assert_eq!(ring.current_set(), &set_of(&ids, &[7000, 23, 309]));
}

#[test]
fn history_looks_back_within_the_window() {
    let ids = identities(3);
    let (a, b, c) = (&ids[0], &ids[1], &ids[2]);

    let mut ring = Ring::new(&set_of(&[*a], &[10000]), 3);
    ring.alter_power(a, power(7000)).unwrap();
    ring.alter_power(b, power(23)).unwrap();
    ring.alter_power(c, power(309)).unwrap();
    ring.rotate().unwrap();

    assert_eq!(ring.validators(0), Some(ring.current_set()));
    assert_eq!(ring.validators(1), Some(&set_of(&[*a], &[10000])));
    assert_eq!(ring.validators(2), Some(&Set::new()));
    assert_eq!(ring.validators(3), None);

    // Reads see the open round.
    ring.alter_power(b, power(50)).unwrap();
    assert_eq!(ring.power(&b.address()), power(50));
    assert_eq!(ring.current_set().power(&b.address()), power(23));
    assert_eq!(ring.next_set().power(&b.address()), power(50));
    assert_eq!(ring.total_power(), power(7000 + 50 + 309));
}

#[test]
fn ring_size_is_at_least_one() {
    let ring = Ring::empty(0);
    assert_eq!(ring.size(), 1);
    assert!(ring.current_set().is_empty());
}

#[test]
fn reindex_preserves_the_window() {
    let ids = identities(4);
    let mut ring = run_rounds(&ids, 5);
    let original = ring.clone();
    let old_head = ring.head();

    ring.reindex(old_head + 1);
    assert_eq!(ring.head(), (old_head + 1) % ring.size());
    assert_ne!(ring, original);
    assert_eq!(ring.current_set(), original.current_set());
    assert_eq!(ring.previous_set(), original.previous_set());
    assert_eq!(ring.ordered_buckets(), original.ordered_buckets());
    assert_eq!(ring.next_set(), original.next_set());

    ring.reindex(old_head);
    assert_eq!(ring, original);
}

#[test]
fn persisted_ring_round_trips_with_wraparound() {
    let ids = identities(4);
    // More rounds than slots, with an open round in progress.
    let mut ring = run_rounds(&ids, 7);
    ring.alter_power(&ids[3], power(1234)).unwrap();

    let persisted = ring.persistable();
    let bytes = persisted.try_to_vec().unwrap();
    let decoded = PersistedRing::try_from_slice(&bytes).unwrap();
    assert_eq!(decoded, persisted);

    let unpersisted = unpersist_ring(decoded.clone()).unwrap();
    assert_eq!(unpersisted, ring);
    assert_eq!(unpersisted.flow(), ring.flow());
    assert!(unpersisted.cum().is_trim());
    assert!(unpersisted.window_power().is_trim());

    let loaded = Ring::load(decoded, 3).unwrap();
    assert_eq!(loaded, ring);

    // Both keep working identically.
    let mut ring = ring;
    let mut loaded = loaded;
    assert_eq!(ring.rotate().unwrap(), loaded.rotate().unwrap());
    assert_eq!(ring, loaded);
}

#[test]
fn unpersist_rejects_malformed_rings() {
    let ids = identities(4);
    let ring = run_rounds(&ids, 4);

    assert!(matches!(
        Ring::load(ring.persistable(), 4),
        Err(UnpersistError::WindowSizeMismatch {
            persisted: 3,
            configured: 4
        })
    ));

    let mut persisted = ring.persistable();
    persisted.head = 3;
    assert!(matches!(
        Ring::try_from(persisted),
        Err(UnpersistError::HeadOutOfRange { head: 3, size: 3 })
    ));

    let mut persisted = ring.persistable();
    persisted.cum.pop();
    assert!(matches!(
        Ring::try_from(persisted),
        Err(UnpersistError::SlotCountMismatch { delta: 3, cum: 2 })
    ));
}

// Run `rounds` rounds on a ring of size 3 over 4 validators that start with 1000 power each, raising
// one validator per round.
fn run_rounds(ids: &[Identity], rounds: usize) -> Ring {
    let mut ring = Ring::new(&set_of(ids, &[1000, 1000, 1000, 1000]), 3);
    for round in 0..rounds {
        let id = &ids[round % ids.len()];
        let raised = ring.power(&id.address()) + power(100 * (round as i64 + 1));
        ring.alter_power(id, raised).unwrap();
        ring.rotate().unwrap();
    }
    ring
}
