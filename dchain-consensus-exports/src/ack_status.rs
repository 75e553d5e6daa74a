// Copyright (c) 2024 DCHAIN LABS
use serde::Serialize;

/// Where a message stands on its way into a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AckStatus {
    /// never seen
    Unknown,
    /// seen and waiting in holding
    NotConfirmed,
    /// placed in a process list
    Ack,
    /// part of a saved directory block
    DBlockConfirmed,
    /// rejected as invalid
    Invalid,
}
