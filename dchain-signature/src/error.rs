// Copyright (c) 2024 DCHAIN LABS

use displaydoc::Display;
use thiserror::Error;

/// signature error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum DChainSignatureError {
    /// parsing error : {0}
    ParsingError(String),
    /// ed25519 engine error: {0}
    EngineError(#[from] ed25519_dalek::SignatureError),
}
