/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Set`] multiset of validator powers.

use std::{
    collections::BTreeMap,
    fmt::{self, Debug, Display, Formatter},
};

use num_traits::Zero;

use crate::types::{
    data_types::{Address, Power},
    validator::{Identity, Validator, ValidatorBytes},
};

use super::{Iterable, PowerChangeError, Reader, Writer};

/// A multiset mapping validators to their power, which can hold the complete state of the validators
/// or act as an accumulator of the changes made to them in a round.
///
/// ## Total power
///
/// The sum of the powers of all entries is maintained incrementally on every change, so
/// [`total_power`](Self::total_power) never scans the set.
///
/// ## Trimming
///
/// A set created with [`new_trim`](Self::new_trim) deletes an entry as soon as its power becomes zero,
/// so that `count() == count_non_zero()`. Sets that hold a committed baseline are trimming: they must
/// neither grow without bound nor report a removed validator as "present with zero power". Ordinary
/// sets keep explicit zero entries, which is how an accumulator records "this validator was removed".
///
/// ## Ordering
///
/// Iteration always walks validators in ascending order of [`Address`].
#[derive(Clone, Default)]
pub struct Set {
    entries: BTreeMap<Address, (Identity, Power)>,
    total_power: Power,
    trim: bool,
}

impl Set {
    /// Create a new, empty, ordinary set.
    pub fn new() -> Set {
        Self {
            entries: BTreeMap::new(),
            total_power: Power::zero(),
            trim: false,
        }
    }

    /// Create a new, empty, trimming set.
    pub fn new_trim() -> Set {
        Self {
            trim: true,
            ..Self::new()
        }
    }

    /// Rebuild an ordinary set from its flat representation.
    pub fn from_validators<'a>(validators: impl IntoIterator<Item = &'a Validator>) -> Set {
        Self::collect(Self::new(), validators)
    }

    /// Rebuild a trimming set from its flat representation.
    pub fn from_validators_trim<'a>(validators: impl IntoIterator<Item = &'a Validator>) -> Set {
        Self::collect(Self::new_trim(), validators)
    }

    fn collect<'a>(mut set: Set, validators: impl IntoIterator<Item = &'a Validator>) -> Set {
        for validator in validators {
            set.change_power(&validator.identity, validator.power.clone());
        }
        set
    }

    /// Check whether this set deletes entries whose power becomes zero.
    pub fn is_trim(&self) -> bool {
        self.trim
    }

    /// Set the power of `id` to `power`, replacing any previous value, and return the signed flow into
    /// `id` (`power` minus its previous power).
    ///
    /// In a trimming set, setting a power of exactly zero removes the entry.
    pub fn change_power(&mut self, id: &Identity, power: Power) -> Power {
        let address = id.address();
        // Positive flow is into the validator, negative is out of it.
        let flow = &power - self.power(&address);
        self.total_power += &flow;

        if self.trim && power.is_zero() {
            self.entries.remove(&address);
        } else {
            self.entries.insert(address, (*id, power));
        }
        flow
    }

    /// Get the power of the validator at `address`, if it has an entry (possibly a zero one) in this set.
    pub fn maybe_power(&self, address: &Address) -> Option<Power> {
        self.entries.get(address).map(|(_, power)| power.clone())
    }

    /// Get the signed flow that setting the power of the validator at `address` to `power` would cause.
    pub fn flow(&self, address: &Address, power: &Power) -> Power {
        power - self.power(address)
    }

    /// Get the sum of the powers of all of the validators in this set.
    pub fn total_power(&self) -> Power {
        self.total_power.clone()
    }

    /// Get the number of entries in this set, including explicit zero entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Get the number of entries in this set with a non-zero power.
    pub fn count_non_zero(&self) -> usize {
        self.entries
            .values()
            .filter(|(_, power)| !power.is_zero())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the flat representation of this set, in ascending order of address.
    pub fn validators(&self) -> Vec<Validator> {
        self.entries
            .values()
            .map(|(identity, power)| Validator {
                identity: *identity,
                power: power.clone(),
            })
            .collect()
    }

    /// Get the flat representation of this set in its serializable form.
    pub fn validator_bytes(&self) -> Vec<ValidatorBytes> {
        self.validators().iter().map(ValidatorBytes::from).collect()
    }
}

impl Reader for Set {
    fn power(&self, address: &Address) -> Power {
        self.maybe_power(address).unwrap_or_else(Power::zero)
    }
}

impl Writer for Set {
    // Never fails.
    fn alter_power(&mut self, id: &Identity, power: Power) -> Result<Power, PowerChangeError> {
        Ok(self.change_power(id, power))
    }
}

impl Iterable for Set {
    fn iterate<F: FnMut(&Identity, &Power) -> bool>(&self, mut visit: F) -> bool {
        for (identity, power) in self.entries.values() {
            if visit(identity, power) {
                return true;
            }
        }
        false
    }
}

/// Two sets are equal if they hold exactly the same validators with exactly the same powers.
///
/// Whether either set is trimming is not compared.
impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        if self.count() != other.count() {
            return false;
        }
        // Stop iteration iff we find a validator whose power does not match.
        !self.iterate(|id, power| other.power(&id.address()) != *power)
    }
}

impl Display for Set {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .entries
            .iter()
            .map(|(address, (_, power))| format!("{}->{}", address, power))
            .collect();
        write!(
            f,
            "Validators{{TotalPower: {}; Count: {}; {}}}",
            self.total_power,
            self.count(),
            entries.join(", ")
        )
    }
}

impl Debug for Set {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
