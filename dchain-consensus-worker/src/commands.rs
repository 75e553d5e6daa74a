// Copyright (c) 2024 DCHAIN LABS
use dchain_channel::sender::DChainSender;
use dchain_consensus_exports::{error::ConsensusError, AckStatus};
use dchain_hash::Hash;

/// Answer channel of a status query.
pub type StatusResponder = DChainSender<Result<AckStatus, ConsensusError>>;

/// Commands the controller sends to the consensus worker.
pub enum ConsensusCommand {
    /// status of a message, by message hash
    GetAckStatus(Hash, StatusResponder),
    /// status of the commit paying for an entry, by entry hash
    GetEntryCommitAck(Hash, StatusResponder),
    /// stop the worker
    Stop,
}
