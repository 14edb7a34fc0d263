/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The validator state of a chain: a validator [`Ring`] kept in step with a [`VersionedKVStore`].
//!
//! [`ValidatorState`] is the one place where power changes enter the chain. Each round, its owner
//! proposes changes with [`alter_power`](ValidatorState::alter_power) (subject to the flow cap) or
//! [`set_power`](ValidatorState::set_power) (trusted, uncapped), then calls
//! [`commit`](ValidatorState::commit). Committing writes the changes of the round into the store as a
//! new version and rotates the ring, so that ring and store always describe the same version.
//!
//! ## Startup
//!
//! A new chain starts with [`genesis`](ValidatorState::genesis), which commits the initial validator set
//! as [`Version::GENESIS`]. An existing chain is reopened with [`load`](ValidatorState::load), which
//! restores the ring from a checkpoint if the latest version carries one, and otherwise rebuilds it by
//! replaying the last `window_size` versions with [`load_validator_ring`].
//!
//! ## Checkpoints
//!
//! [`commit_and_checkpoint`](ValidatorState::commit_and_checkpoint) additionally stores the rotated ring
//! in the version it commits. A plain [`commit`](ValidatorState::commit) deletes any earlier checkpoint,
//! so a checkpoint found in the latest version always describes exactly that version.

use std::{
    fmt::{self, Display, Formatter},
    time::SystemTime,
};

use crate::{
    config::Configuration,
    events::{CheckpointRingEvent, LoadValidatorRingEvent, RejectPowerChangeEvent, RotateRingEvent},
    logging::Logger,
    store::{
        history::{load_validator_ring, LoadRingError},
        pluggables::{KVGet, KVGetError, VersionedKVStore},
        write_batch::{KVSetError, ValidatorWriteBatch},
    },
    types::{
        data_types::{Address, Power, Version},
        validator::{Identity, Validator},
    },
    validators::{
        ring::{Ring, UnpersistError},
        History, PowerChangeError, Reader, Set,
    },
};

/// What a call to [`ValidatorState::commit`] did.
#[derive(Clone, Debug, PartialEq)]
pub struct CommitOutcome {
    /// The version that the commit produced.
    pub version: Version,
    /// Total power of the new current set minus total power of the previous set.
    pub total_power_change: Power,
    /// Sum of the flows of the changes accepted by the flow cap in the committed round.
    pub total_flow: Power,
}

/// A validator ring together with the store that its history is persisted in.
pub struct ValidatorState<S: VersionedKVStore> {
    store: S,
    ring: Ring,
    config: Configuration,
}

impl<S: VersionedKVStore> ValidatorState<S> {
    /// Commit `validators` as the genesis validator set of an empty `store`.
    ///
    /// Genesis powers are trusted, so they are not subject to the flow cap.
    pub fn genesis(
        store: S,
        validators: &[Validator],
        config: Configuration,
    ) -> Result<(ValidatorState<S>, CommitOutcome), ValidatorStateError> {
        if let Some(version) = store.version() {
            return Err(ValidatorStateError::AlreadyInitialized { version });
        }

        let mut state = ValidatorState {
            store,
            ring: Ring::empty(config.window_size),
            config,
        };
        for validator in validators {
            state.set_power(&validator.identity, validator.power.clone())?;
        }
        let outcome = state.commit()?;
        Ok((state, outcome))
    }

    /// Reopen the validator state of a `store` that has been committed to at least once.
    pub fn load(store: S, config: Configuration) -> Result<ValidatorState<S>, ValidatorStateError> {
        let version = store
            .version()
            .ok_or(ValidatorStateError::NotInitialized)?;

        let checkpoint = store
            .snapshot_at(version)
            .ok_or(LoadRingError::VersionNotFound { version })?
            .persisted_ring()?;
        let from_checkpoint = checkpoint.is_some();
        let ring = match checkpoint {
            Some(persisted_ring) => Ring::load(persisted_ring, config.window_size)?,
            None => load_validator_ring(version, config.window_size, &store)?,
        };

        let state = ValidatorState {
            store,
            ring,
            config,
        };
        state.log_load(version, from_checkpoint);
        Ok(state)
    }

    /// Reopen the validator state of `store` by replaying its history, ignoring any checkpoint.
    pub fn load_from_history(
        store: S,
        config: Configuration,
    ) -> Result<ValidatorState<S>, ValidatorStateError> {
        let version = store
            .version()
            .ok_or(ValidatorStateError::NotInitialized)?;
        let ring = load_validator_ring(version, config.window_size, &store)?;

        let state = ValidatorState {
            store,
            ring,
            config,
        };
        state.log_load(version, false);
        Ok(state)
    }

    /// Propose changing the power of `id` to `power` in the open round, subject to the flow cap. Returns
    /// the absolute flow that the change induces.
    ///
    /// Rejected changes leave the validator state untouched, and are logged.
    pub fn alter_power(&mut self, id: &Identity, power: Power) -> Result<Power, ValidatorStateError> {
        match self.ring.alter_power(id, power) {
            Ok(flow) => Ok(flow),
            Err(error) => {
                if self.config.log_events {
                    (RejectPowerChangeEvent::get_logger())(&RejectPowerChangeEvent {
                        timestamp: SystemTime::now(),
                        error: error.clone(),
                    })
                }
                Err(error.into())
            }
        }
    }

    /// Set the power of `id` to `power` in the open round without enforcing the flow cap. Returns the
    /// absolute flow that the change induces.
    ///
    /// For trusted callers only. The power must still be valid, and must keep the total power of the
    /// next set within [`MAX_TOTAL_VOTING_POWER`](crate::types::data_types::MAX_TOTAL_VOTING_POWER).
    pub fn set_power(&mut self, id: &Identity, power: Power) -> Result<Power, ValidatorStateError> {
        Ok(self.ring.set_power(id, power)?)
    }

    /// Commit the open round as a new version of the store, and rotate the ring.
    pub fn commit(&mut self) -> Result<CommitOutcome, ValidatorStateError> {
        self.commit_inner(false)
    }

    /// Like [`commit`](Self::commit), but also store a checkpoint of the rotated ring in the new version,
    /// so that the next [`load`](Self::load) does not need to replay history.
    pub fn commit_and_checkpoint(&mut self) -> Result<CommitOutcome, ValidatorStateError> {
        self.commit_inner(true)
    }

    fn commit_inner(&mut self, checkpoint: bool) -> Result<CommitOutcome, ValidatorStateError> {
        let mut wb = ValidatorWriteBatch::<S::WriteBatch>::new();
        for validator in self.ring.head_set().validators() {
            wb.set_validator_power(&validator.identity, &validator.power)?;
        }

        // The ring only moves on once the whole batch is staged.
        let mut ring = self.ring.clone();
        let (total_power_change, total_flow) = ring.rotate()?;
        if checkpoint {
            wb.set_persisted_ring(&ring.persistable())?;
        } else {
            wb.delete_persisted_ring();
        }

        self.ring = ring;
        self.store.write(wb.into_inner());
        let committed = self.store.commit();

        if self.config.log_events {
            (RotateRingEvent::get_logger())(&RotateRingEvent {
                timestamp: SystemTime::now(),
                version: committed,
                total_power_change: total_power_change.clone(),
                total_flow: total_flow.clone(),
                validators: self.ring.current_set().count(),
            });
            if checkpoint {
                (CheckpointRingEvent::get_logger())(&CheckpointRingEvent {
                    timestamp: SystemTime::now(),
                    version: committed,
                    head: self.ring.head(),
                });
            }
        }

        Ok(CommitOutcome {
            version: committed,
            total_power_change,
            total_flow,
        })
    }

    fn log_load(&self, version: Version, from_checkpoint: bool) {
        if self.config.log_events {
            (LoadValidatorRingEvent::get_logger())(&LoadValidatorRingEvent {
                timestamp: SystemTime::now(),
                version,
                window_size: self.ring.size(),
                validators: self.ring.current_set().count(),
                from_checkpoint,
            })
        }
    }

    /// Get the validator set committed in the latest version.
    pub fn current_set(&self) -> &Set {
        self.ring.current_set()
    }

    /// Get the validator set committed in the version before the latest.
    pub fn previous_set(&self) -> &Set {
        self.ring.previous_set()
    }

    /// Get the validator set that committing the open round would produce.
    pub fn next_set(&self) -> Set {
        self.ring.next_set()
    }

    /// Get the latest committed version.
    pub fn version(&self) -> Option<Version> {
        self.store.version()
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }
}

impl<S: VersionedKVStore> Reader for ValidatorState<S> {
    fn power(&self, address: &Address) -> Power {
        self.ring.power(address)
    }
}

impl<S: VersionedKVStore> History for ValidatorState<S> {
    fn validators(&self, lookback: usize) -> Option<&Set> {
        self.ring.validators(lookback)
    }
}

/// Error when trying to change, commit, or load the validator state.
#[derive(Debug)]
pub enum ValidatorStateError {
    /// [`ValidatorState::load`] was called on a store that was never committed to.
    NotInitialized,

    /// [`ValidatorState::genesis`] was called on a store that was already committed to.
    AlreadyInitialized { version: Version },

    PowerChangeError(PowerChangeError),
    LoadRingError(LoadRingError),
    KVGetError(KVGetError),
    KVSetError(KVSetError),
    UnpersistError(UnpersistError),
}

impl From<PowerChangeError> for ValidatorStateError {
    fn from(value: PowerChangeError) -> Self {
        ValidatorStateError::PowerChangeError(value)
    }
}

impl From<LoadRingError> for ValidatorStateError {
    fn from(value: LoadRingError) -> Self {
        ValidatorStateError::LoadRingError(value)
    }
}

impl From<KVGetError> for ValidatorStateError {
    fn from(value: KVGetError) -> Self {
        ValidatorStateError::KVGetError(value)
    }
}

impl From<KVSetError> for ValidatorStateError {
    fn from(value: KVSetError) -> Self {
        ValidatorStateError::KVSetError(value)
    }
}

impl From<UnpersistError> for ValidatorStateError {
    fn from(value: UnpersistError) -> Self {
        ValidatorStateError::UnpersistError(value)
    }
}

impl Display for ValidatorStateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "the store has no committed version"),
            Self::AlreadyInitialized { version } => {
                write!(f, "the store is already at version {}", version)
            }
            Self::PowerChangeError(err) => Display::fmt(err, f),
            Self::LoadRingError(err) => Display::fmt(err, f),
            Self::KVGetError(err) => Display::fmt(err, f),
            Self::KVSetError(err) => Display::fmt(err, f),
            Self::UnpersistError(err) => Display::fmt(err, f),
        }
    }
}

impl std::error::Error for ValidatorStateError {}
