/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide two categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate, used to derive [`Address`]es.
//! 2. **Public keys**: provided by the [`ed25519_dalek`] crate, which identify validators.

use sha2::{Digest, Sha256};

use super::data_types::{Address, ADDRESS_LENGTH};

// re-exports below.
pub use ed25519_dalek::{SignatureError, SigningKey, VerifyingKey};

/// Internal type used for serializing and deserializing values of type [`VerifyingKey`].
pub type VerifyingKeyBytes = [u8; 32];

/// Derive the address of `public_key`: the first [`ADDRESS_LENGTH`] bytes of its SHA256 digest.
pub fn address_of(public_key: &VerifyingKey) -> Address {
    let digest = Sha256::digest(public_key.as_bytes());
    let mut bytes = [0u8; ADDRESS_LENGTH];
    bytes.copy_from_slice(&digest[..ADDRESS_LENGTH]);
    Address::new(bytes)
}
