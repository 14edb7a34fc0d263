/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store numbers and bytes, and do not have any major "active" behavior.

use std::fmt::{self, Debug, Display, Formatter};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};
use num_bigint::BigInt;

/// Voting power of a validator, or an aggregate (total, flow) of voting powers.
///
/// Committed powers are always non-negative and fit inside an `i64`, but intermediate values (signed
/// flows, sums across a whole window) are computed with arbitrary precision so that they never wrap
/// before the explicit range checks in [`check_power`](crate::validators::check_power) run.
pub type Power = BigInt;

/// Ceiling on the total power of any committed validator set.
///
/// Consensus engines in the Tendermint family reserve headroom above this value for their proposer
/// priority arithmetic, so a validator set whose total power exceeds it cannot be handed to them.
pub const MAX_TOTAL_VOTING_POWER: i64 = i64::MAX / 8;

/// Length in bytes of an [`Address`].
pub const ADDRESS_LENGTH: usize = 20;

/// Fixed-width identifier of a validator, derived from its public key.
///
/// Addresses are totally ordered by their bytes. Every ordered traversal of validators in this crate
/// (and therefore every serialization derived from one) walks addresses in this order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Create a new `Address` wrapping `bytes`.
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the inner bytes of this `Address`.
    pub const fn bytes(&self) -> [u8; ADDRESS_LENGTH] {
        self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", STANDARD_NO_PAD.encode(self.0))
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Version of the versioned key-value store in which validator powers are persisted.
///
/// Version 1 is written by the genesis commit. Every later commit, and therefore every
/// [rotation](crate::validators::ring::Ring::rotate) of the validator ring, produces the next version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct Version(u64);

impl Version {
    /// The version produced by committing the genesis state.
    pub const GENESIS: Version = Version(1);

    /// Create a new `Version` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `Version`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Get the version immediately after this one.
    pub const fn next(&self) -> Version {
        Version(self.0 + 1)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
