/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'state variables' that validator state is stored under.
//!
//! ## State variables
//!
//! Validator state is made up of two state variables:
//!
//! |Variable|Type|Description|
//! |---|---|---|
//! |Validators|[`Address`](crate::types::data_types::Address) -> [`ValidatorBytes`](crate::types::validator::ValidatorBytes)|The public key and power of every validator with non-zero power.|
//! |Validator Ring|[`PersistedRing`](crate::validators::ring::PersistedRing)|The most recent checkpoint of the validator ring, if any.|
//!
//! Each state variable is identified by a single-byte prefix. "Validators" is a mapping, so each of
//! its entries is stored at the key formed by concatenating [`VALIDATORS`] and the raw bytes of the
//! validator's address. A validator whose power falls to zero has its entry deleted, so a prefix scan
//! over [`VALIDATORS`] yields exactly the current validator set in ascending order of address.
//!
//! "Validator Ring" is a single value, stored at the key [`VALIDATOR_RING`].

// State variables
pub const VALIDATORS: [u8; 1] = [0];
pub const VALIDATOR_RING: [u8; 1] = [1];

/// Concatenate two byteslices into one vector.
pub fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}
