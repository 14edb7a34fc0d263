/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A single-round, flow-capped accumulator of validator power changes.

use num_traits::Signed;

use crate::types::{
    data_types::{Address, Power, MAX_TOTAL_VOTING_POWER},
    validator::Identity,
};

use super::{check_power, copy_trim, max_flow, Iterable, PowerChangeError, Reader, Set, Writer};

/// Couples a committed baseline ([`current_set`](Self::current_set)), the changes proposed against it
/// in the open round ([`delta`](Self::delta)), and the flow those changes induce.
///
/// `Bucket` is the one-slot version of the protocol that [`Ring`](super::Ring) runs over a whole window:
/// its flow cap is computed from, and its flows are measured against, the baseline of the same round.
#[derive(Clone, Debug)]
pub struct Bucket {
    // The baseline agreed as of the last rotation. Trimming.
    cum: Set,
    // Changes proposed in this round.
    delta: Set,
    // Absolute flow of each validator touched in this round, relative to cum.
    flow: Set,
}

impl Bucket {
    /// Create a bucket whose baseline is a copy of `initial_set`.
    pub fn new<I: Iterable + ?Sized>(initial_set: &I) -> Bucket {
        Self {
            cum: copy_trim(initial_set),
            delta: Set::new(),
            flow: Set::new(),
        }
    }

    /// Propose changing the power of `id` to `power`, and return the absolute flow that the change
    /// induces relative to the baseline.
    ///
    /// The change is rejected, leaving the bucket untouched, if `power` is invalid, if it would push
    /// the total power of the next set over [`MAX_TOTAL_VOTING_POWER`], or if the flows of this round
    /// would then sum to more than [`max_flow`](Self::max_flow). A validator whose power is altered
    /// several times in a round contributes its flow once, by its net change against the baseline.
    pub fn alter_power(&mut self, id: &Identity, power: Power) -> Result<Power, PowerChangeError> {
        self.change_power(id, power, true)
    }

    /// Like [`alter_power`](Self::alter_power), but without enforcing the flow cap.
    ///
    /// For trusted callers only, e.g., when writing the genesis validators.
    pub fn set_power(&mut self, id: &Identity, power: Power) -> Result<Power, PowerChangeError> {
        self.change_power(id, power, false)
    }

    fn change_power(
        &mut self,
        id: &Identity,
        power: Power,
        cap_flow: bool,
    ) -> Result<Power, PowerChangeError> {
        check_power(id, &power)?;
        let address = id.address();

        let next_total_power = self.next_total_power(&address, &power);
        if next_total_power > Power::from(MAX_TOTAL_VOTING_POWER) {
            return Err(PowerChangeError::TotalPowerExceeded {
                address,
                from: self.cum.power(&address),
                to: power,
                next_total_power,
                max_total_power: Power::from(MAX_TOTAL_VOTING_POWER),
            });
        }

        let abs_flow = self.cum.flow(&address, &power).abs();
        if cap_flow {
            let max_flow = self.max_flow();
            let total_flow = self.flow.total_power();
            let allowable_flow = &max_flow - &total_flow;
            // The flow of this validator replaces, rather than adds to, any flow it already has.
            if self.flow.flow(&address, &abs_flow) > allowable_flow {
                return Err(PowerChangeError::FlowCapExceeded {
                    address,
                    from: self.cum.power(&address),
                    to: power,
                    flow: abs_flow,
                    total_flow,
                    max_flow,
                    allowable_flow,
                });
            }
        }

        self.flow.change_power(id, abs_flow.clone());
        self.delta.change_power(id, power);
        Ok(abs_flow)
    }

    // Total power of the next set if the power at `address` were changed to `power`.
    fn next_total_power(&self, address: &Address, power: &Power) -> Power {
        let current = self
            .delta
            .maybe_power(address)
            .unwrap_or_else(|| self.cum.power(address));
        self.cum.total_power() + self.delta_total_flow() + power - current
    }

    // Net change in total power that the delta makes to the baseline.
    fn delta_total_flow(&self) -> Power {
        let mut flow = Power::default();
        self.delta.iterate(|id, power| {
            flow += self.cum.flow(&id.address(), power);
            false
        });
        flow
    }

    /// Get the largest total flow that this round may induce: a third of the baseline's total power,
    /// minus one.
    pub fn max_flow(&self) -> Power {
        max_flow(&self.cum.total_power())
    }

    /// Get the committed baseline.
    pub fn current_set(&self) -> &Set {
        &self.cum
    }

    /// Get the validator set that would result from committing this round as it stands.
    pub fn next_set(&self) -> Set {
        let mut next = copy_trim(&self.cum);
        self.delta.iterate(|id, power| {
            next.change_power(id, power.clone());
            false
        });
        next
    }

    /// Get the changes proposed in this round.
    pub fn delta(&self) -> &Set {
        &self.delta
    }

    /// Get the absolute flows induced in this round.
    pub fn flow(&self) -> &Set {
        &self.flow
    }
}

impl Reader for Bucket {
    fn power(&self, address: &Address) -> Power {
        self.delta
            .maybe_power(address)
            .unwrap_or_else(|| self.cum.power(address))
    }
}

impl Writer for Bucket {
    fn alter_power(&mut self, id: &Identity, power: Power) -> Result<Power, PowerChangeError> {
        Bucket::alter_power(self, id, power)
    }
}

impl Iterable for Bucket {
    fn iterate<F: FnMut(&Identity, &Power) -> bool>(&self, visit: F) -> bool {
        self.next_set().iterate(visit)
    }
}

/// Flow is transient state of the open round, so only the delta and the baseline are compared.
impl PartialEq for Bucket {
    fn eq(&self, other: &Self) -> bool {
        self.delta == other.delta && self.cum == other.cum
    }
}
