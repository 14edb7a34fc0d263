/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A typed wrapper around [`WriteBatch`] that forms the keys of the validator state variables.

use std::fmt::{self, Display, Formatter};

use borsh::BorshSerialize;
use num_traits::Zero;

use crate::{
    types::{
        data_types::Power,
        validator::{Identity, Validator, ValidatorBytes},
    },
    validators::ring::PersistedRing,
};

use super::{
    pluggables::{Key, WriteBatch},
    variables::{self, concat},
};

/// Stages writes to the validator state variables into an underlying [`WriteBatch`].
pub struct ValidatorWriteBatch<W: WriteBatch>(W);

impl<W: WriteBatch> ValidatorWriteBatch<W> {
    pub fn new() -> ValidatorWriteBatch<W> {
        ValidatorWriteBatch(W::new())
    }

    /// Unwrap the underlying write batch, e.g., to hand it to
    /// [`VersionedKVStore::write`](super::pluggables::VersionedKVStore::write).
    pub fn into_inner(self) -> W {
        self.0
    }

    /* ↓↓↓ Validators ↓↓↓ */

    /// Stage `power` as the power of `id`. A power of zero deletes the validator's entry.
    pub fn set_validator_power(&mut self, id: &Identity, power: &Power) -> Result<(), KVSetError> {
        let key = concat(&variables::VALIDATORS, &id.address().bytes());
        if power.is_zero() {
            self.0.delete(&key);
            return Ok(());
        }

        let validator_bytes = ValidatorBytes::from(&Validator {
            identity: *id,
            power: power.clone(),
        });
        self.0.set(
            &key,
            &validator_bytes
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::Validator {
                        address: id.address(),
                    },
                    source: err,
                })?,
        );
        Ok(())
    }

    /* ↓↓↓ Validator Ring ↓↓↓ */

    pub fn set_persisted_ring(&mut self, persisted_ring: &PersistedRing) -> Result<(), KVSetError> {
        self.0.set(
            &variables::VALIDATOR_RING,
            &persisted_ring
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::ValidatorRing,
                    source: err,
                })?,
        );
        Ok(())
    }

    pub fn delete_persisted_ring(&mut self) {
        self.0.delete(&variables::VALIDATOR_RING)
    }
}

impl<W: WriteBatch> Default for ValidatorWriteBatch<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// Error when trying to serialize a value before staging it into a [`WriteBatch`].
#[derive(Debug)]
pub enum KVSetError {
    SerializeValueError { key: Key, source: std::io::Error },
}

impl Display for KVSetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            KVSetError::SerializeValueError { key, source } => {
                write!(f, "could not serialize the value of {}: {}", key, source)
            }
        }
    }
}

impl std::error::Error for KVSetError {}
