// Copyright (c) 2024 DCHAIN LABS
//! Definition and exports of the consensus driver interfaces: configuration,
//! errors, collaborator traits and the controller used by the rest of the node.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod ack_status;
mod authority;
mod channels;
mod controller_trait;
mod network;
mod settings;

pub mod error;

pub use ack_status::AckStatus;
pub use authority::{AuthorityRegistry, StaticAuthorityRegistry};
pub use channels::ConsensusChannels;
pub use controller_trait::{ConsensusController, ConsensusManager};
pub use network::{ChannelNetworkController, NetworkController};
pub use settings::{ConsensusConfig, NodeIdentity};

#[cfg(any(test, feature = "test-exports"))]
pub use authority::MockAuthorityRegistry;
#[cfg(any(test, feature = "test-exports"))]
pub use controller_trait::MockConsensusController;

/// Exports related to tests as mocks and configurations
#[cfg(feature = "test-exports")]
pub mod test_exports;
