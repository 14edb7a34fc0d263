/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that are used across the validator power window, its persistence, and its owners.
//!
//! Types specific to a single component (for example, the errors a [`Ring`](crate::validators::ring::Ring)
//! returns) live next to that component.

pub mod crypto_primitives;

pub mod data_types;

pub mod validator;
