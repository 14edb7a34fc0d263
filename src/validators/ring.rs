/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A sliding window over the validator power changes of the last `size` rounds.
//!
//! ## Slots
//!
//! A [`Ring`] is a circular buffer of `size` slots. Each slot holds the validator set committed at
//! the start of a round ("cum") and the changes proposed during that round ("delta"). The slot at the
//! head belongs to the open round: its cum is the current validator set, and its delta accumulates
//! the changes that [`alter_power`](Ring::alter_power) accepts. [`rotate`](Ring::rotate) commits the
//! head's delta onto its cum, and moves the head onto the oldest slot, which it overwrites.
//!
//! ## Persistence
//!
//! [`Ring::persistable`] flattens a ring into a [`PersistedRing`], which is Borsh-serializable.
//! Converting it back with [`unpersist_ring`] or `Ring::try_from` yields a ring equal to the original.

use std::fmt::{self, Debug, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};
use num_traits::Signed;

use crate::types::{
    data_types::{Address, Power, MAX_TOTAL_VOTING_POWER},
    validator::{Identity, Validator, ValidatorBytes},
};

use super::{
    add, alter, check_power, copy_trim, max_flow, subtract, History, Iterable,
    PowerChangeError, Reader, Set, Writer,
};

/// Sliding window of validator power changes that enforces the flow cap across the window.
#[derive(Clone)]
pub struct Ring {
    // The changes committed at the rotation out of each slot.
    delta: Vec<Set>,
    // The validator set at the rotation into each slot. Trimming.
    cum: Vec<Set>,
    // Totals for each validator across the deltas in the window. Trimming.
    power: Set,
    // Absolute flow of each validator touched since the last rotation.
    flow: Set,
    // Index of the head slot.
    head: usize,
    // Number of slots.
    size: usize,
}

impl Ring {
    /// Create a ring of `window_size` slots (at least one) whose current validator set is a copy of
    /// `initial_set`.
    pub fn new<I: Iterable + ?Sized>(initial_set: &I, window_size: usize) -> Ring {
        let size = window_size.max(1);
        let mut cum: Vec<Set> = (0..size).map(|_| Set::new_trim()).collect();
        cum[0] = copy_trim(initial_set);

        Self {
            delta: (0..size).map(|_| Set::new()).collect(),
            cum,
            power: Set::new_trim(),
            flow: Set::new(),
            head: 0,
            size,
        }
    }

    /// Create a ring of `window_size` slots with no validators.
    pub fn empty(window_size: usize) -> Ring {
        Ring::new(&Set::new(), window_size)
    }

    /// Propose changing the power of `id` to `power` in the open round, and return the absolute flow
    /// that the change induces relative to [`cum`](Self::cum).
    ///
    /// Rejected changes leave the ring exactly as it was. A change is rejected if `power` is invalid, if
    /// it would push the total power of the next set over [`MAX_TOTAL_VOTING_POWER`], or if it would make
    /// the total flow since the last rotation exceed [`max_flow`](Self::max_flow).
    pub fn alter_power(&mut self, id: &Identity, power: Power) -> Result<Power, PowerChangeError> {
        self.check_total_power(id, &power)?;

        let address = id.address();
        let flow = self.flow_of(&address, &power);
        let max_flow = self.max_flow();
        // The flow of this validator replaces, rather than adds to, any flow it already has, so that
        // each validator is only counted once.
        let next_total_flow = self.flow.total_power() + self.flow.flow(&address, &flow);
        if next_total_flow > max_flow {
            let total_flow = self.flow.total_power();
            let allowable_flow = &max_flow - &total_flow;
            return Err(PowerChangeError::FlowCapExceeded {
                address,
                from: self.cum().power(&address),
                to: power,
                flow,
                total_flow,
                max_flow,
                allowable_flow,
            });
        }

        self.flow.change_power(id, flow.clone());
        self.delta[self.head].change_power(id, power);
        Ok(flow)
    }

    /// Set the power of `id` to `power` in the open round without enforcing the flow cap, and return the
    /// absolute flow that the change induces relative to [`cum`](Self::cum).
    ///
    /// The flow is still recorded, so that later capped changes in the same round see it. A change is
    /// rejected only if `power` is invalid or would push the total power of the next set over
    /// [`MAX_TOTAL_VOTING_POWER`].
    pub fn set_power(&mut self, id: &Identity, power: Power) -> Result<Power, PowerChangeError> {
        self.check_total_power(id, &power)?;

        let flow = self.flow_of(&id.address(), &power);
        self.flow.change_power(id, flow.clone());
        self.delta[self.head].change_power(id, power);
        Ok(flow)
    }

    /// Check that `power` is a valid power for `id`, and that setting it would keep the total power of
    /// the next set within [`MAX_TOTAL_VOTING_POWER`]. Does not check the flow cap.
    pub fn check_total_power(&self, id: &Identity, power: &Power) -> Result<(), PowerChangeError> {
        check_power(id, power)?;
        let address = id.address();
        let next_total_power = self.total_power() + power - self.power(&address);
        if next_total_power > Power::from(MAX_TOTAL_VOTING_POWER) {
            return Err(PowerChangeError::TotalPowerExceeded {
                address,
                from: self.cum().power(&address),
                to: power.clone(),
                next_total_power,
                max_total_power: Power::from(MAX_TOTAL_VOTING_POWER),
            });
        }
        Ok(())
    }

    /// Get the absolute flow that changing the power of the validator at `address` to `power` would
    /// induce relative to [`cum`](Self::cum).
    pub fn flow_of(&self, address: &Address, power: &Power) -> Power {
        self.cum().flow(address, power).abs()
    }

    /// Get the largest total flow that may be induced between two rotations: a third of the total power
    /// of [`cum`](Self::cum), minus one.
    pub fn max_flow(&self) -> Power {
        max_flow(&self.cum().total_power())
    }

    /// Commit the open round and advance the ring by one slot.
    ///
    /// Returns the change in total power between the previous and the new current set, and the total
    /// flow induced in the committed round. A non-zero flow is notable but not an error.
    pub fn rotate(&mut self) -> Result<(Power, Power), PowerChangeError> {
        // The tail slot is about to be overwritten, so its delta leaves the window total.
        let tail = self.index(1);
        let head = self.head;
        subtract(&mut self.power, &self.delta[tail])?;
        add(&mut self.power, &self.delta[head])?;

        let mut next_cum = copy_trim(self.cum());
        alter(&mut next_cum, self.head_set())?;

        self.head = self.index(1);
        self.delta[self.head] = Set::new();
        self.cum[self.head] = next_cum;

        let total_flow = self.flow.total_power();
        self.flow = Set::new();

        let total_power_change =
            self.cum().total_power() - self.cum[self.index(-1)].total_power();
        Ok((total_power_change, total_flow))
    }

    /// Move the slots of this ring so that the current head sits at index `new_head`, preserving the
    /// order of the slots relative to the head.
    ///
    /// Rings that have been rotated the same number of times modulo `size` have their heads at the same
    /// index. This lets a ring rebuilt from history be indexed like one that has run since genesis.
    pub fn reindex(&mut self, new_head: usize) {
        let new_head = new_head % self.size;
        let mut delta: Vec<Set> = (0..self.size).map(|_| Set::new()).collect();
        let mut cum: Vec<Set> = (0..self.size).map(|_| Set::new_trim()).collect();
        for i in 0..self.size {
            let from = self.index(i as isize);
            let to = (new_head + i) % self.size;
            delta[to] = std::mem::take(&mut self.delta[from]);
            cum[to] = std::mem::take(&mut self.cum[from]);
        }
        self.delta = delta;
        self.cum = cum;
        self.head = new_head;
    }

    /// Get the validator set that would result from committing the open round as it stands.
    pub fn next_set(&self) -> Set {
        let mut next = copy_trim(self.cum());
        self.head_set().iterate(|id, power| {
            next.change_power(id, power.clone());
            false
        });
        next
    }

    /// Get the total power of [`next_set`](Self::next_set).
    pub fn total_power(&self) -> Power {
        self.next_set().total_power()
    }

    /// Get the current, i.e., most recently committed, validator set.
    pub fn current_set(&self) -> &Set {
        &self.cum[self.head]
    }

    /// Get the validator set committed before the current one.
    pub fn previous_set(&self) -> &Set {
        &self.cum[self.index(-1)]
    }

    /// Get the baseline against which flows are measured and the flow cap is computed.
    pub fn cum(&self) -> &Set {
        &self.cum[self.head]
    }

    /// Get the changes proposed in the open round.
    pub fn head_set(&self) -> &Set {
        &self.delta[self.head]
    }

    /// Get mutable access to the changes proposed in the open round, bypassing the flow cap.
    ///
    /// Writes through this reference are neither validated nor recorded as flow. Callers must
    /// [`check_power`] first; this is meant for replaying already-committed history. Other trusted
    /// callers want [`set_power`](Self::set_power).
    pub fn head_mut(&mut self) -> &mut Set {
        &mut self.delta[self.head]
    }

    /// Get the changes of the oldest round in the window, which the next rotation discards.
    pub fn next(&self) -> &Set {
        &self.delta[self.index(1)]
    }

    /// Get the sum, for each validator, of the changes held in the window.
    pub fn window_power(&self) -> &Set {
        &self.power
    }

    /// Get the absolute flows induced since the last rotation.
    pub fn flow(&self) -> &Set {
        &self.flow
    }

    /// Get the index of the head slot.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Get the number of slots in the ring. Use `current_set().count()` to get the number of validators.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the deltas and cums of every slot, in order from the head to the tail.
    pub fn ordered_buckets(&self) -> (Vec<&Set>, Vec<&Set>) {
        (0..self.size)
            .map(|i| {
                let index = self.index(-(i as isize));
                (&self.delta[index], &self.cum[index])
            })
            .unzip()
    }

    // Index of the slot `i` slots after the head, wrapping around in either direction.
    fn index(&self, i: isize) -> usize {
        let size = self.size as isize;
        (self.head as isize + i).rem_euclid(size) as usize
    }

    /// Flatten this ring into a form that can be stored.
    pub fn persistable(&self) -> PersistedRing {
        PersistedRing {
            delta: self.delta.iter().map(Set::validator_bytes).collect(),
            cum: self.cum.iter().map(Set::validator_bytes).collect(),
            power: self.power.validator_bytes(),
            flow: self.flow.validator_bytes(),
            head: self.head as u64,
        }
    }

    /// Rebuild a ring from `persisted`, requiring it to have exactly `window_size` slots.
    ///
    /// The head of a persisted ring is a raw slot index, which has no meaning in a ring of a different
    /// size, so a mismatch is an error rather than something to adapt to.
    pub fn load(persisted: PersistedRing, window_size: usize) -> Result<Ring, UnpersistError> {
        let ring = Ring::try_from(persisted)?;
        if ring.size != window_size {
            return Err(UnpersistError::WindowSizeMismatch {
                persisted: ring.size,
                configured: window_size,
            });
        }
        Ok(ring)
    }
}

impl Reader for Ring {
    // Power proposed in the open round, falling back to the current set.
    fn power(&self, address: &Address) -> Power {
        self.head_set()
            .maybe_power(address)
            .unwrap_or_else(|| self.cum().power(address))
    }
}

impl Writer for Ring {
    fn alter_power(&mut self, id: &Identity, power: Power) -> Result<Power, PowerChangeError> {
        Ring::alter_power(self, id, power)
    }
}

impl History for Ring {
    fn validators(&self, lookback: usize) -> Option<&Set> {
        if lookback >= self.size {
            return None;
        }
        Some(&self.cum[self.index(-(lookback as isize))])
    }
}

impl PartialEq for Ring {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && self.head == other.head
            && self.flow == other.flow
            && self.power == other.power
            && self.delta == other.delta
            && self.cum == other.cum
    }
}

impl Display for Ring {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (delta, _) = self.ordered_buckets();
        write!(
            f,
            "ValidatorsWindow{{Total: {}; Delta: Head->{:?}<-Tail}}",
            self.power, delta
        )
    }
}

impl Debug for Ring {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Flat, Borsh-serializable representation of a [`Ring`].
///
/// Every list of validators is in ascending order of address, so equal rings always serialize to
/// equal bytes.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct PersistedRing {
    pub delta: Vec<Vec<ValidatorBytes>>,
    pub cum: Vec<Vec<ValidatorBytes>>,
    pub power: Vec<ValidatorBytes>,
    pub flow: Vec<ValidatorBytes>,
    pub head: u64,
}

/// Rebuild a ring from its flat representation.
pub fn unpersist_ring(persisted: PersistedRing) -> Result<Ring, UnpersistError> {
    Ring::try_from(persisted)
}

impl TryFrom<PersistedRing> for Ring {
    type Error = UnpersistError;

    fn try_from(value: PersistedRing) -> Result<Self, Self::Error> {
        let size = value.delta.len();
        if size == 0 || value.cum.len() != size {
            return Err(UnpersistError::SlotCountMismatch {
                delta: size,
                cum: value.cum.len(),
            });
        }
        let head = value.head as usize;
        if head >= size {
            return Err(UnpersistError::HeadOutOfRange { head, size });
        }

        let delta = value
            .delta
            .iter()
            .map(|slot| unpersist_set(slot).map(|validators| Set::from_validators(&validators)))
            .collect::<Result<Vec<Set>, UnpersistError>>()?;
        let cum = value
            .cum
            .iter()
            .map(|slot| unpersist_set(slot).map(|validators| Set::from_validators_trim(&validators)))
            .collect::<Result<Vec<Set>, UnpersistError>>()?;

        Ok(Ring {
            delta,
            cum,
            power: Set::from_validators_trim(&unpersist_set(&value.power)?),
            flow: Set::from_validators(&unpersist_set(&value.flow)?),
            head,
            size,
        })
    }
}

fn unpersist_set(validators: &[ValidatorBytes]) -> Result<Vec<Validator>, UnpersistError> {
    validators
        .iter()
        .map(|bytes| Validator::try_from(bytes).map_err(UnpersistError::InvalidPublicKey))
        .collect()
}

/// Reasons a [`PersistedRing`] could not be turned back into a [`Ring`].
#[derive(Debug)]
pub enum UnpersistError {
    /// A persisted validator's public key bytes are not a valid Ed25519 public key.
    InvalidPublicKey(ed25519_dalek::SignatureError),

    /// The persisted ring has no slots, or different numbers of delta and cum slots.
    SlotCountMismatch { delta: usize, cum: usize },

    /// The persisted head does not index a slot.
    HeadOutOfRange { head: usize, size: usize },

    /// The persisted ring has a different number of slots than the configured window size.
    WindowSizeMismatch { persisted: usize, configured: usize },
}

impl Display for UnpersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPublicKey(err) => {
                write!(f, "persisted validator has an invalid public key: {}", err)
            }
            Self::SlotCountMismatch { delta, cum } => write!(
                f,
                "persisted ring has {} delta slots and {} cum slots",
                delta, cum
            ),
            Self::HeadOutOfRange { head, size } => write!(
                f,
                "persisted ring head {} is out of range for a ring of size {}",
                head, size
            ),
            Self::WindowSizeMismatch {
                persisted,
                configured,
            } => write!(
                f,
                "persisted ring has {} slots but the configured window size is {}",
                persisted, configured
            ),
        }
    }
}

impl std::error::Error for UnpersistError {}
