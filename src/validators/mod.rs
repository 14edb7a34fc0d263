/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Validator power accounting: multisets of validator powers, and the sliding window that bounds how
//! quickly they may change.
//!
//! # Components
//!
//! From the leaves up:
//! 1. [`Set`]: a multiset from validator identity to power with an incrementally maintained total.
//! 2. [`diff`] and the other composition helpers in this module, which work on anything that
//!    implements the capability traits below rather than on a concrete type.
//! 3. [`Bucket`]: a single-round, flow-capped accumulator of power changes.
//! 4. [`Ring`]: a fixed-size circular buffer of rounds, whose flow cap is measured against the baseline
//!    of the window.
//!
//! # Capabilities
//!
//! Callers that only need to read or write validator power depend on the small traits [`Reader`],
//! [`Writer`] and [`Iterable`] (and their combinations), which [`Set`], [`Bucket`] and [`Ring`] all
//! implement. A [`History`] additionally exposes the committed validator sets of recent rounds.
//!
//! # The flow cap
//!
//! Let `P` be the total power of the baseline set. The *flow* of a validator is the absolute difference
//! between its proposed power and its baseline power, counted once per validator no matter how many
//! times its power is altered. Both [`Bucket`] and [`Ring`] reject any change that would make the sum
//! of flows exceed `P/3 - 1` (integer division). A light client that trusts a validator set can then
//! rely on at least one honest validator being in the intersection of that set and any set produced
//! within the window, which is what lets it detect being lied to about later sets.

use std::fmt::{self, Display, Formatter};

use num_traits::{Signed, ToPrimitive, Zero};

use crate::types::{
    data_types::{Address, Power},
    validator::Identity,
};

pub mod bucket;
pub use bucket::Bucket;

pub mod ring;
pub use ring::Ring;

pub mod set;
pub use set::Set;

/// Read access to validator powers.
pub trait Reader {
    /// Get the power of the validator at `address`, or zero if the validator is unknown.
    fn power(&self, address: &Address) -> Power;
}

/// Write access to validator powers.
pub trait Writer {
    /// Set the power of `id` to `power`, returning the flow that the change induced.
    fn alter_power(&mut self, id: &Identity, power: Power) -> Result<Power, PowerChangeError>;
}

/// Ordered traversal of validators.
pub trait Iterable {
    /// Call `visit` on every validator in ascending order of address, stopping early if `visit` returns
    /// `true`. Returns whether iteration was stopped early.
    fn iterate<F: FnMut(&Identity, &Power) -> bool>(&self, visit: F) -> bool;
}

pub trait IterableReader: Iterable + Reader {}

impl<T: Iterable + Reader + ?Sized> IterableReader for T {}

pub trait ReaderWriter: Reader + Writer {}

impl<T: Reader + Writer + ?Sized> ReaderWriter for T {}

/// Access to the committed validator sets of recent rounds.
pub trait History: Reader {
    /// Get the validator set committed `lookback` rotations ago (`0` is the current set), or `None` if
    /// that set is no longer held.
    fn validators(&self, lookback: usize) -> Option<&Set>;
}

/// Build a new ordinary [`Set`] with the same entries as `vs`.
pub fn copy<I: Iterable + ?Sized>(vs: &I) -> Set {
    let mut copy = Set::new();
    vs.iterate(|id, power| {
        copy.change_power(id, power.clone());
        false
    });
    copy
}

/// Build a new trimming [`Set`] with the same non-zero entries as `vs`.
pub fn copy_trim<I: Iterable + ?Sized>(vs: &I) -> Set {
    let mut copy = Set::new_trim();
    vs.iterate(|id, power| {
        copy.change_power(id, power.clone());
        false
    });
    copy
}

/// Replace the power in `vs` of every validator in `other` with its power in `other`.
pub fn alter<W: Writer + ?Sized, I: Iterable + ?Sized>(
    vs: &mut W,
    other: &I,
) -> Result<(), PowerChangeError> {
    apply(other, |id, power| vs.alter_power(id, power.clone()).map(|_| ()))
}

/// Write every validator in `other` into `vs`. An alias of [`alter`] that reads better when the writer
/// is the destination of a whole validator set.
pub fn write<W: Writer + ?Sized, I: Iterable + ?Sized>(
    vs: &mut W,
    other: &I,
) -> Result<(), PowerChangeError> {
    alter(vs, other)
}

/// Add the power in `other` of every validator to its power in `vs`.
pub fn add<W: ReaderWriter + ?Sized, I: Iterable + ?Sized>(
    vs: &mut W,
    other: &I,
) -> Result<(), PowerChangeError> {
    apply(other, |id, power| add_power(&mut *vs, id, power).map(|_| ()))
}

/// Subtract the power in `other` of every validator from its power in `vs`.
pub fn subtract<W: ReaderWriter + ?Sized, I: Iterable + ?Sized>(
    vs: &mut W,
    other: &I,
) -> Result<(), PowerChangeError> {
    apply(other, |id, power| subtract_power(&mut *vs, id, power).map(|_| ()))
}

/// Increase the power of `id` in `vs` by `power`.
pub fn add_power<W: ReaderWriter + ?Sized>(
    vs: &mut W,
    id: &Identity,
    power: &Power,
) -> Result<Power, PowerChangeError> {
    let current = vs.power(&id.address());
    vs.alter_power(id, current + power)
}

/// Decrease the power of `id` in `vs` by `power`.
pub fn subtract_power<W: ReaderWriter + ?Sized>(
    vs: &mut W,
    id: &Identity,
    power: &Power,
) -> Result<Power, PowerChangeError> {
    let current = vs.power(&id.address());
    vs.alter_power(id, current - power)
}

/// Compute the changes that turn `before` into `after`.
///
/// The result holds, for every validator whose power differs between the two, its power in `after`
/// (zero if it is absent from `after`). Validators on which the two agree are omitted. Applying the
/// result to a copy of `before` with [`alter`] yields a set equal to `after`, and `diff(after, before)`
/// is the inverse change.
pub fn diff<B: IterableReader + ?Sized, A: IterableReader + ?Sized>(before: &B, after: &A) -> Set {
    let mut diff = Set::new();
    after.iterate(|id, power_after| {
        if before.power(&id.address()) != *power_after {
            diff.change_power(id, power_after.clone());
        }
        false
    });
    // Validators that are in before but missing from after are zeroed.
    before.iterate(|id, power_before| {
        let power_after = after.power(&id.address());
        if power_after.is_zero() && !power_before.is_zero() {
            diff.change_power(id, power_after);
        }
        false
    });
    diff
}

/// Check that `power` may be committed as the power of `id`: it must be non-negative and fit in an
/// `i64`.
pub fn check_power(id: &Identity, power: &Power) -> Result<(), PowerChangeError> {
    if power.is_negative() {
        return Err(PowerChangeError::NegativePower {
            address: id.address(),
            power: power.clone(),
        });
    }
    if power.to_i64().is_none() {
        return Err(PowerChangeError::PowerOutOfRange {
            address: id.address(),
            power: power.clone(),
        });
    }
    Ok(())
}

/// Compute the flow cap of a window whose baseline has `total_power`: `total_power/3 - 1`.
///
/// The bound must be strict even when the division truncates, hence the `- 1`.
pub fn max_flow(total_power: &Power) -> Power {
    const ONE: u8 = 1;
    const THREE: u8 = 3;

    total_power / THREE - ONE
}

// Call `f` on every validator of `vs`, stopping at and returning the first error.
fn apply<I: Iterable + ?Sized, F: FnMut(&Identity, &Power) -> Result<(), PowerChangeError>>(
    vs: &I,
    mut f: F,
) -> Result<(), PowerChangeError> {
    let mut result = Ok(());
    vs.iterate(|id, power| match f(id, power) {
        Ok(()) => false,
        Err(err) => {
            result = Err(err);
            true
        }
    });
    result
}

/// Reasons a proposed change to a validator's power was rejected.
///
/// Every rejection happens before any state is mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum PowerChangeError {
    /// The proposed power is negative.
    NegativePower { address: Address, power: Power },

    /// The proposed power does not fit in an `i64`.
    PowerOutOfRange { address: Address, power: Power },

    /// The change would make the total power of the next validator set exceed
    /// [`MAX_TOTAL_VOTING_POWER`](crate::types::data_types::MAX_TOTAL_VOTING_POWER).
    TotalPowerExceeded {
        address: Address,
        from: Power,
        to: Power,
        next_total_power: Power,
        max_total_power: Power,
    },

    /// The change, together with the changes already accepted in the window, would make the total flow
    /// exceed the flow cap.
    FlowCapExceeded {
        address: Address,
        from: Power,
        to: Power,
        flow: Power,
        total_flow: Power,
        max_flow: Power,
        allowable_flow: Power,
    },
}

impl PowerChangeError {
    /// Get the address of the validator whose power change was rejected.
    pub fn address(&self) -> Address {
        match self {
            Self::NegativePower { address, .. }
            | Self::PowerOutOfRange { address, .. }
            | Self::TotalPowerExceeded { address, .. }
            | Self::FlowCapExceeded { address, .. } => *address,
        }
    }
}

impl Display for PowerChangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativePower { address, power } => write!(
                f,
                "cannot set negative validator power {} for {}",
                power, address
            ),
            Self::PowerOutOfRange { address, power } => write!(
                f,
                "validator power must fit within an i64 but {} for {} does not",
                power, address
            ),
            Self::TotalPowerExceeded {
                address,
                from,
                to,
                next_total_power,
                max_total_power,
            } => write!(
                f,
                "cannot change validator power of {} from {} to {} because that would result in a total \
                 power of {}, greater than the maximum of {}",
                address, from, to, next_total_power, max_total_power
            ),
            Self::FlowCapExceeded {
                address,
                from,
                to,
                flow,
                total_flow,
                max_flow,
                allowable_flow,
            } => write!(
                f,
                "cannot change validator power of {} from {} to {} because that would result in a flow \
                 greater than or equal to 1/3 of total power for the next commit: flow induced by change: {}, \
                 current total flow: {}/{} (cumulative/max), remaining allowable flow: {}",
                address, from, to, flow, total_flow, max_flow, allowable_flow
            ),
        }
    }
}

impl std::error::Error for PowerChangeError {}
