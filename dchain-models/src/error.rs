// Copyright (c) 2024 DCHAIN LABS

use displaydoc::Display;
use thiserror::Error;

/// models result
pub type ModelsResult<T, E = ModelsError> = core::result::Result<T, E>;

/// models error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum ModelsError {
    /// signature error: {0}
    SignatureError(#[from] dchain_signature::DChainSignatureError),
    /// hash error: {0}
    HashError(#[from] dchain_hash::DChainHashError),
    /// time error: {0}
    TimeError(#[from] dchain_time::TimeError),
    /// invalid vm index {0} for {1} federated servers
    InvalidVmIndex(usize, usize),
    /// invalid minute {0}
    InvalidMinute(u8),
    /// invalid credit amount {0}
    InvalidCredits(u8),
    /// hash mismatch: {0}
    HashMismatch(String),
    /// inconsistent block: {0}
    InconsistentBlock(String),
}
