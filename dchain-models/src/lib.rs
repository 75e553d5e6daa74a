// Copyright (c) 2024 DCHAIN LABS

#![warn(missing_docs)]
//! Data model shared by the consensus crates: identities, acknowledgements,
//! consensus messages and the blocks a height produces.

pub use ack::Ack;
pub use error::ModelsError;
pub use identity::{Authority, ChainId, EcAddress, IdentityId, ServerType};
pub use messages::{Message, MessageKind};
pub use serialization::{CanonicalSerializer, Serializer};

/// acknowledgements
pub mod ack;
/// directory, admin, entry-credit, factoid and entry blocks
pub mod blocks;
/// protocol constants
pub mod config;
/// models error
pub mod error;
/// identities and authorities
pub mod identity;
/// consensus messages
pub mod messages;
/// canonical byte encoding used for hashing and signing
pub mod serialization;
