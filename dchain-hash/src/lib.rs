// Copyright (c) 2024 DCHAIN LABS

#![warn(missing_docs)]
//! SHA-256 hashes used for message, block and identity ids.
pub use error::DChainHashError;
pub use hash::Hash;
pub use settings::HASH_SIZE_BYTES;

mod error;
mod hash;
mod settings;
