/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable, versioned persistence of validator powers.
//!
//! The library user provides the storage engine by implementing [`VersionedKVStore`] (and through it,
//! [`KVGet`] and [`WriteBatch`]). Validator state is then read and written in terms of the typed
//! accessors that [`KVGet`] provides on top of raw `get`, so that the key layout described in
//! [`variables`](super::variables) never leaks into the caller.

use std::fmt::{self, Display, Formatter};

use borsh::BorshDeserialize;

use crate::{
    types::{
        data_types::{Address, Version},
        validator::{Validator, ValidatorBytes},
    },
    validators::{ring::PersistedRing, Set},
};

use super::variables::{self, concat};

/// A key-value store that commits its state as a sequence of immutable, numbered versions.
///
/// Reads through the store's own [`KVGet`] implementation see the working state, i.e., everything
/// written since the last commit. Reads through a [`Snapshot`](Self::Snapshot) see exactly the state as
/// of one committed version.
pub trait VersionedKVStore: KVGet {
    type WriteBatch: WriteBatch;
    type Snapshot: KVGet;

    /// Atomically apply `wb` to the working state.
    fn write(&mut self, wb: Self::WriteBatch);

    /// Freeze the working state as a new version and return that version. The first commit produces
    /// [`Version::GENESIS`].
    fn commit(&mut self) -> Version;

    /// Get the latest committed version, or `None` if nothing has been committed yet.
    fn version(&self) -> Option<Version>;

    /// Get a read-only view of the state as of `version`, or `None` if that version does not exist.
    fn snapshot_at(&self, version: Version) -> Option<Self::Snapshot>;
}

pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Get every key-value pair whose key starts with `prefix`, in ascending order of key.
    fn prefix_iter(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;

    /* ↓↓↓ Validators ↓↓↓ */

    /// Get the validator at `address`, or `None` if it has no power.
    fn validator(&self, address: &Address) -> Result<Option<Validator>, KVGetError> {
        if let Some(bytes) = self.get(&concat(&variables::VALIDATORS, &address.bytes())) {
            let key = Key::Validator { address: *address };
            let validator = deserialize_validator(&key, &bytes)?;
            if validator.identity.address() != *address {
                return Err(KVGetError::AddressMismatch {
                    key,
                    found: validator.identity.address(),
                });
            }
            Ok(Some(validator))
        } else {
            Ok(None)
        }
    }

    /// Get every validator with non-zero power, as a trimming [`Set`].
    fn validator_set(&self) -> Result<Set, KVGetError> {
        let mut set = Set::new_trim();
        for (key, bytes) in self.prefix_iter(&variables::VALIDATORS) {
            let address = address_from_key(&key)?;
            let key = Key::Validator { address };
            let validator = deserialize_validator(&key, &bytes)?;
            if validator.identity.address() != address {
                return Err(KVGetError::AddressMismatch {
                    key,
                    found: validator.identity.address(),
                });
            }
            set.change_power(&validator.identity, validator.power);
        }
        Ok(set)
    }

    /* ↓↓↓ Validator Ring ↓↓↓ */

    /// Get the most recent checkpoint of the validator ring, if one was ever written.
    fn persisted_ring(&self) -> Result<Option<PersistedRing>, KVGetError> {
        if let Some(bytes) = self.get(&variables::VALIDATOR_RING) {
            let persisted_ring = PersistedRing::deserialize(&mut &*bytes).map_err(|err| {
                KVGetError::DeserializeValueError {
                    key: Key::ValidatorRing,
                    source: err,
                }
            })?;
            Ok(Some(persisted_ring))
        } else {
            Ok(None)
        }
    }
}

fn deserialize_validator(key: &Key, bytes: &[u8]) -> Result<Validator, KVGetError> {
    let validator_bytes = ValidatorBytes::deserialize(&mut &*bytes).map_err(|err| {
        KVGetError::DeserializeValueError {
            key: key.clone(),
            source: err,
        }
    })?;
    Validator::try_from(&validator_bytes).map_err(|err| KVGetError::Ed25519DalekError {
        key: key.clone(),
        source: err,
    })
}

fn address_from_key(key: &[u8]) -> Result<Address, KVGetError> {
    let bytes = key
        .get(variables::VALIDATORS.len()..)
        .and_then(|suffix| suffix.try_into().ok())
        .ok_or_else(|| KVGetError::MalformedKey { key: key.to_vec() })?;
    Ok(Address::new(bytes))
}

pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

/// Error when trying to read a value corresponding to a given key from a [`KVGet`]. The error may arise
/// in the following circumstances:
/// 1. The value corresponding to a given key cannot be deserialized into its expected type,
/// 2. A key under a known prefix does not have the expected length,
/// 3. A stored validator's public key is not a valid Ed25519 public key,
/// 4. A stored validator's public key does not hash to the address it is stored under.
#[derive(Debug)]
pub enum KVGetError {
    DeserializeValueError {
        key: Key,
        source: std::io::Error,
    },
    MalformedKey {
        key: Vec<u8>,
    },
    Ed25519DalekError {
        key: Key,
        source: ed25519_dalek::SignatureError,
    },
    AddressMismatch {
        key: Key,
        found: Address,
    },
}

impl Display for KVGetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            KVGetError::DeserializeValueError { key, source } => {
                write!(f, "could not deserialize the value of {}: {}", key, source)
            }
            KVGetError::MalformedKey { key } => {
                write!(f, "malformed key under the validators prefix: {:?}", key)
            }
            KVGetError::Ed25519DalekError { key, source } => {
                write!(f, "invalid public key in the value of {}: {}", key, source)
            }
            KVGetError::AddressMismatch { key, found } => write!(
                f,
                "the public key in the value of {} belongs to {} instead",
                key, found
            ),
        }
    }
}

impl std::error::Error for KVGetError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Validator { address: Address },
    ValidatorRing,
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Key::Validator { address } => write!(f, "Validator {}", address),
            Key::ValidatorRing => write!(f, "Validator Ring"),
        }
    }
}
