// Copyright (c) 2024 DCHAIN LABS
use displaydoc::Display;
use thiserror::Error;

/// database error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone, PartialEq, Eq)]
pub enum DBError {
    /// database is closed
    Closed,
    /// inconsistent batch: {0}
    InconsistentBatch(String),
    /// block {0} already written with a different keymr
    Conflict(u32),
    /// models error: {0}
    ModelsError(String),
}

impl From<dchain_models::ModelsError> for DBError {
    fn from(err: dchain_models::ModelsError) -> Self {
        DBError::ModelsError(err.to_string())
    }
}
