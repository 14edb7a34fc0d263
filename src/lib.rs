/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Sliding-window accounting of validator voting power for BFT chains.
//!
//! A light client that trusts a validator set can follow a chain into the future only if later sets
//! keep enough of the power of the sets it already trusts. This crate enforces that: every proposed
//! change to a validator's power is measured as a *flow* against a committed baseline, and changes are
//! rejected once the flows of a round would add up to a third or more of the baseline's total power.
//!
//! ## Layout
//!
//! - [`validators`]: the in-memory core. [`Set`](validators::Set), [`Bucket`](validators::Bucket) and
//!   [`Ring`](validators::Ring), and the capability traits they implement.
//! - [`store`]: the pluggable, versioned key-value store that validator powers are persisted in, and
//!   [`load_validator_ring`](store::history::load_validator_ring), which rebuilds a ring from it.
//! - [`state`]: [`ValidatorState`](state::ValidatorState), which keeps a ring and a store in step.
//! - [`config`], [`events`] and [`logging`]: configuration and observability.

pub mod config;

pub mod events;

pub mod logging;

pub mod state;

pub mod store;

pub mod types;

pub mod validators;
