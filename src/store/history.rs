/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Rebuilding the validator [`Ring`] from the versioned history of the validator set.
//!
//! A ring is never stored in full on every commit. What the store keeps is the validator set as of
//! every committed version, which is enough to replay the last `ring_size` rounds into a fresh ring.
//! The replayed ring is equal to the ring that a node running since genesis would hold at that version.
//!
//! ## Replay
//!
//! 1. Start from an empty ring, and write the whole validator set of the oldest version still inside
//!    the window (`version - ring_size`, but no earlier than genesis) into its open round. Rotate.
//! 2. For each later version up to and including `version`, write the [`diff`] between the ring's
//!    current set and the validator set of that version into the open round. Rotate.
//! 3. [`reindex`](Ring::reindex) the ring so that its head sits at `version % ring_size`, which is where
//!    the head of a ring rotated `version` times since genesis sits.
//!
//! Historical changes were already accepted when they were committed, so they are replayed without
//! enforcing the flow cap.

use std::fmt::{self, Display, Formatter};

use crate::{
    types::data_types::Version,
    validators::{check_power, diff, write, Iterable, PowerChangeError, Ring, Set},
};

use super::pluggables::{KVGet, KVGetError, VersionedKVStore};

/// Rebuild the validator ring of `ring_size` slots as of `version` from the validator sets committed in
/// `store`.
pub fn load_validator_ring<S: VersionedKVStore + ?Sized>(
    version: Version,
    ring_size: usize,
    store: &S,
) -> Result<Ring, LoadRingError> {
    if version < Version::GENESIS {
        return Err(LoadRingError::VersionNotFound { version });
    }

    let mut ring = Ring::empty(ring_size);
    let ring_size = ring.size() as u64;
    let start_version = Version::new(version.int().saturating_sub(ring_size).max(Version::GENESIS.int()));

    // The oldest round enters the window whole, so that the current set ends up complete even if the
    // chain is younger than the window.
    let start_set = validator_set_at(store, start_version)?;
    replay(&mut ring, &start_set)?;
    ring.rotate()?;

    let mut next_version = start_version.next();
    while next_version <= version {
        let validator_set = validator_set_at(store, next_version)?;
        let changes = diff(ring.current_set(), &validator_set);
        replay(&mut ring, &changes)?;
        ring.rotate()?;
        next_version = next_version.next();
    }

    ring.reindex((version.int() % ring_size) as usize);
    Ok(ring)
}

fn validator_set_at<S: VersionedKVStore + ?Sized>(
    store: &S,
    version: Version,
) -> Result<Set, LoadRingError> {
    let snapshot = store
        .snapshot_at(version)
        .ok_or(LoadRingError::VersionNotFound { version })?;
    Ok(snapshot.validator_set()?)
}

// Write `changes` into the open round of `ring` without enforcing the flow cap.
fn replay<I: Iterable + ?Sized>(ring: &mut Ring, changes: &I) -> Result<(), PowerChangeError> {
    let mut result = Ok(());
    changes.iterate(|id, power| match check_power(id, power) {
        Ok(()) => false,
        Err(err) => {
            result = Err(err);
            true
        }
    });
    result?;
    write(ring.head_mut(), changes)
}

/// Error when trying to rebuild a [`Ring`] from history.
#[derive(Debug)]
pub enum LoadRingError {
    /// A version inside the window is not held by the store.
    VersionNotFound { version: Version },

    /// The validator set of a version inside the window could not be read.
    KVGetError(KVGetError),

    /// The validator set of a version inside the window holds an invalid power.
    PowerChangeError(PowerChangeError),
}

impl From<KVGetError> for LoadRingError {
    fn from(value: KVGetError) -> Self {
        LoadRingError::KVGetError(value)
    }
}

impl From<PowerChangeError> for LoadRingError {
    fn from(value: PowerChangeError) -> Self {
        LoadRingError::PowerChangeError(value)
    }
}

impl Display for LoadRingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LoadRingError::VersionNotFound { version } => {
                write!(f, "version {} is not held by the store", version)
            }
            LoadRingError::KVGetError(err) => {
                write!(f, "could not read historical validator set: {}", err)
            }
            LoadRingError::PowerChangeError(err) => {
                write!(f, "historical validator set is invalid: {}", err)
            }
        }
    }
}

impl std::error::Error for LoadRingError {}
