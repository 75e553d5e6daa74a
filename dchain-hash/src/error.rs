// Copyright (c) 2024 DCHAIN LABS

use displaydoc::Display;
use thiserror::Error;

/// hash error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum DChainHashError {
    /// parsing error: {0}
    ParsingError(String),
    /// wrong prefix for hash: expected {0}, got {1}
    WrongPrefix(String, String),
}
