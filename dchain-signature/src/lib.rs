// Copyright (c) 2024 DCHAIN LABS
//! Ed25519 keys and signatures over [`dchain_hash::Hash`] digests.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod error;
mod signature_impl;

pub use error::DChainSignatureError;
pub use signature_impl::{
    KeyPair, PublicKey, Signature, KEYPAIR_SIZE_BYTES, PUBLIC_KEY_SIZE_BYTES,
    SIGNATURE_SIZE_BYTES,
};
