/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration of a [`ValidatorState`](crate::state::ValidatorState).
//!
//! The configuration can be defined using the builder pattern, for example:
//!
//! ```
//! use validator_window::config::Configuration;
//!
//! let config = Configuration::builder()
//!     .window_size(20)
//!     .log_events(false)
//!     .build();
//!
//! assert_eq!(config.window_size, 20);
//! ```

use typed_builder::TypedBuilder;

/// Number of rounds that the validator ring spans unless configured otherwise.
pub const DEFAULT_VALIDATORS_WINDOW_SIZE: usize = 10;

/// Stores the user-defined parameters of a [`ValidatorState`](crate::state::ValidatorState).
///
/// ## Window size
///
/// A larger window means a light client that trusts some validator set can verify sets further into
/// the future, at the cost of keeping (and on startup, replaying) more rounds of history.
///
/// The window size of a chain must never change while its history is in use: a ring checkpointed or
/// rebuilt with one window size is not comparable to a ring of another.
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Optional:
    - `.window_size(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(
        default = DEFAULT_VALIDATORS_WINDOW_SIZE,
        setter(doc = "Set the number of rounds that the validator ring spans. Defaults to 10.")
    )]
    pub window_size: usize,
    #[builder(
        default = true,
        setter(doc = "Enable logging of validator ring events? Defaults to true.")
    )]
    pub log_events: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration::builder().build()
    }
}
