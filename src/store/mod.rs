/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Versioned persistence of validator powers, and the rebuilding of the validator ring from it.
//!
//! The storage engine is pluggable: implement [`VersionedKVStore`](pluggables::VersionedKVStore) over
//! any key-value store that can keep its committed versions immutable and readable.

pub mod history;

pub mod pluggables;

pub mod variables;

pub mod write_batch;
