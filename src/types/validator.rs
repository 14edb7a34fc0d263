/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Identities of validators, and the flat `(public key, power)` form in which they are persisted.

use std::{
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

use borsh::{BorshDeserialize, BorshSerialize};

use super::{
    crypto_primitives::{address_of, SignatureError, VerifyingKey, VerifyingKeyBytes},
    data_types::{Address, Power},
};

/// A validator's public key together with the address derived from it.
///
/// Two identities are equal if and only if their addresses are equal.
#[derive(Clone, Copy)]
pub struct Identity {
    address: Address,
    public_key: VerifyingKey,
}

impl Identity {
    /// Create the `Identity` of the holder of `public_key`.
    pub fn new(public_key: VerifyingKey) -> Self {
        Self {
            address: address_of(&public_key),
            public_key,
        }
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    pub const fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }
}

impl From<VerifyingKey> for Identity {
    fn from(public_key: VerifyingKey) -> Self {
        Identity::new(public_key)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state)
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.address, f)
    }
}

impl Debug for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.address, f)
    }
}

/// A validator and its voting power, as stored in flat, per-address lists.
#[derive(Clone, PartialEq, Debug)]
pub struct Validator {
    pub identity: Identity,
    pub power: Power,
}

impl Validator {
    pub fn new(public_key: VerifyingKey, power: Power) -> Self {
        Self {
            identity: Identity::new(public_key),
            power,
        }
    }
}

/// Intermediate representation of [`Validator`] for safe serialization and deserialization.
///
/// ## Rationale
///
/// Neither [`VerifyingKey`] nor [`Power`] implement the Borsh traits. This type replaces the former with
/// its 32 raw bytes and the latter with its two's-complement big-endian encoding, which is lossless for
/// every power this crate ever stores. As with any byte representation of a public key, instances of
/// this type are not guaranteed to contain valid Ed25519 keys, so conversion back into `Validator` is
/// fallible.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct ValidatorBytes {
    public_key: VerifyingKeyBytes,
    power: Vec<u8>,
}

impl From<&Validator> for ValidatorBytes {
    fn from(validator: &Validator) -> Self {
        ValidatorBytes {
            public_key: validator.identity.public_key().to_bytes(),
            power: validator.power.to_signed_bytes_be(),
        }
    }
}

impl TryFrom<&ValidatorBytes> for Validator {
    type Error = SignatureError;

    fn try_from(value: &ValidatorBytes) -> Result<Self, Self::Error> {
        Ok(Validator::new(
            VerifyingKey::from_bytes(&value.public_key)?,
            Power::from_signed_bytes_be(&value.power),
        ))
    }
}
