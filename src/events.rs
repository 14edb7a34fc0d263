/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events emitted by [`ValidatorState`](crate::state::ValidatorState).
//!
//! An event for a given action indicates that the action has been completed (or, for
//! [`RejectPowerChangeEvent`], that the action was refused). Events are printed by the loggers in
//! [`logging`](crate::logging) if [`Configuration::log_events`](crate::config::Configuration) is set.

use std::time::SystemTime;

use crate::{
    types::data_types::{Power, Version},
    validators::PowerChangeError,
};

/// The open round was committed as `version`, and the validator ring rotated.
pub struct RotateRingEvent {
    pub timestamp: SystemTime,
    pub version: Version,
    pub total_power_change: Power,
    pub total_flow: Power,
    pub validators: usize,
}

/// A proposed power change was rejected by the validator ring.
pub struct RejectPowerChangeEvent {
    pub timestamp: SystemTime,
    pub error: PowerChangeError,
}

/// The validator ring was loaded from the store, either from a checkpoint or by replaying history.
pub struct LoadValidatorRingEvent {
    pub timestamp: SystemTime,
    pub version: Version,
    pub window_size: usize,
    pub validators: usize,
    pub from_checkpoint: bool,
}

/// A checkpoint of the validator ring was stored in the version it describes.
pub struct CheckpointRingEvent {
    pub timestamp: SystemTime,
    pub version: Version,
    pub head: usize,
}
