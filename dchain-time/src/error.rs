// Copyright (c) 2024 DCHAIN LABS
use displaydoc::Display;
use thiserror::Error;

/// time error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// Error converting
    ConversionError,
    /// Time overflow error
    TimeOverflowError,
    /// Checked operation error : {0}
    CheckedOperationError(String),
}
