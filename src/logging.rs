/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the validator state's
//! [config](crate::config::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [RotateRing](crate::events::RotateRingEvent) is printed:
//!
//! ```text
//! RotateRing, 1701329264, 42, 7, -2668, 332
//! ```
//!
//! In the snippet:
//! - The third value is the version that the rotation committed.
//! - The fourth value is the number of validators in the new current set.
//! - The fifth value is the change in total power from the previous set to the new current set.
//! - The sixth value is the total flow induced in the committed round.
//!
//! Rotations that induce a non-zero flow are logged at `Info` level, idle rotations at `Debug` level.
//! Rejected power changes are logged at `Warn` level.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use log;
use num_traits::Zero;

use crate::{events::*, validators::PowerChangeError};

// Names of each event in PascalCase for printing:
pub const ROTATE_RING: &str = "RotateRing";
pub const REJECT_POWER_CHANGE: &str = "RejectPowerChange";
pub const LOAD_VALIDATOR_RING: &str = "LoadValidatorRing";
pub const CHECKPOINT_RING: &str = "CheckpointRing";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for RotateRingEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |rotate_ring_event: &RotateRingEvent| {
            let level = if rotate_ring_event.total_flow.is_zero() {
                log::Level::Debug
            } else {
                log::Level::Info
            };
            log::log!(
                level,
                "{}, {}, {}, {}, {}, {}",
                ROTATE_RING,
                secs_since_unix_epoch(rotate_ring_event.timestamp),
                rotate_ring_event.version,
                rotate_ring_event.validators,
                rotate_ring_event.total_power_change,
                rotate_ring_event.total_flow
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectPowerChangeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_power_change_event: &RejectPowerChangeEvent| {
            log::warn!(
                "{}, {}, {}, {}",
                REJECT_POWER_CHANGE,
                secs_since_unix_epoch(reject_power_change_event.timestamp),
                first_seven_base64_chars(&reject_power_change_event.error.address().bytes()),
                rejection_reason(&reject_power_change_event.error)
            )
        };
        Box::new(logger)
    }
}

impl Logger for LoadValidatorRingEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |load_validator_ring_event: &LoadValidatorRingEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                LOAD_VALIDATOR_RING,
                secs_since_unix_epoch(load_validator_ring_event.timestamp),
                load_validator_ring_event.version,
                load_validator_ring_event.window_size,
                load_validator_ring_event.validators,
                if load_validator_ring_event.from_checkpoint {
                    "checkpoint"
                } else {
                    "history"
                }
            )
        };
        Box::new(logger)
    }
}

impl Logger for CheckpointRingEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |checkpoint_ring_event: &CheckpointRingEvent| {
            log::info!(
                "{}, {}, {}, {}",
                CHECKPOINT_RING,
                secs_since_unix_epoch(checkpoint_ring_event.timestamp),
                checkpoint_ring_event.version,
                checkpoint_ring_event.head
            )
        };
        Box::new(logger)
    }
}

fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

// Events are timestamped with the system clock, which can be set before the epoch.
fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

fn rejection_reason(error: &PowerChangeError) -> String {
    match error {
        PowerChangeError::NegativePower { power, .. } => format!("negative power: {}", power),
        PowerChangeError::PowerOutOfRange { power, .. } => format!("power out of range: {}", power),
        PowerChangeError::TotalPowerExceeded {
            next_total_power,
            max_total_power,
            ..
        } => format!(
            "total power exceeded: {}/{}",
            next_total_power, max_total_power
        ),
        PowerChangeError::FlowCapExceeded {
            flow,
            allowable_flow,
            ..
        } => format!("flow cap exceeded: {}/{}", flow, allowable_flow),
    }
}
