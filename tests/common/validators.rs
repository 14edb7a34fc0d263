//! Helpers for making validator identities and sets in tests.

use rand_core::OsRng;
use validator_window::{
    types::{
        crypto_primitives::SigningKey,
        data_types::Power,
        validator::{Identity, Validator},
    },
    validators::Set,
};

/// Generate `n` fresh identities, sorted in ascending order of address.
pub(crate) fn identities(n: usize) -> Vec<Identity> {
    let mut identities: Vec<Identity> = (0..n)
        .map(|_| Identity::new(SigningKey::generate(&mut OsRng).verifying_key()))
        .collect();
    identities.sort_by_key(|identity| identity.address());
    identities
}

pub(crate) fn power(int: i64) -> Power {
    Power::from(int)
}

pub(crate) fn validator(identity: &Identity, int: i64) -> Validator {
    Validator {
        identity: *identity,
        power: power(int),
    }
}

/// Build a trimming set giving `identities[i]` the power `powers[i]`.
pub(crate) fn set_of(identities: &[Identity], powers: &[i64]) -> Set {
    let validators: Vec<Validator> = identities
        .iter()
        .zip(powers)
        .map(|(identity, int)| validator(identity, *int))
        .collect();
    Set::from_validators_trim(&validators)
}
