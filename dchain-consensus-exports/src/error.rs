// Copyright (c) 2024 DCHAIN LABS
use displaydoc::Display;
use thiserror::Error;

use dchain_db_exports::DBError;
use dchain_models::ModelsError;
use dchain_time::TimeError;

/// Result of a consensus operation
pub type ConsensusResult<T, E = ConsensusError> = core::result::Result<T, E>;

/// Consensus error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum ConsensusError {
    /// database error: {0}
    DBError(#[from] DBError),
    /// models error: {0}
    ModelsError(#[from] ModelsError),
    /// time error: {0}
    TimeError(#[from] TimeError),
    /// channel error: {0}
    ChannelError(String),
    /// the query was not answered within {0} ms
    QueryTimeout(u64),
    /// the consensus worker is stopped
    Stopped,
    /// invalid configuration: {0}
    InvalidConfig(String),
    /// container inconsistency: {0}
    ContainerInconsistency(String),
    /// height {0} is beyond the process list lookahead
    HeightOutOfRange(u32),
    /// missing authority: {0}
    MissingAuthority(String),
}
