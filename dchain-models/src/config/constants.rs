//! DEFAULT VALUES USED TO INITIALIZE DIVERS CONFIGURATIONS STRUCTURES
//!
//! These are protocol values every node must agree on. Values a node operator
//! may tune live in the `ConsensusConfig` of the consensus exports, which takes
//! its defaults from here.
use dchain_hash::Hash;

/// Number of minutes (End-Of-Minute rounds) in one block.
pub const MINUTES_PER_BLOCK: u8 = 10;
/// Maximum number of virtual servers in a process list.
pub const MAX_VMS: usize = 32;
/// Multiplier used to offset the leader rotation by height.
pub const LEADER_MAP_HEIGHT_MULTIPLIER: u32 = 131;
/// Maximum credits a single entry commit may pay.
pub const MAX_ENTRY_CREDITS: u8 = 10;
/// Extra credits paid to create a new chain.
pub const CHAIN_CREATION_CREDITS: u8 = 10;
/// Maximum size in bytes of an entry payload (ext ids + content).
pub const MAX_ENTRY_SIZE: usize = 10 * 1024;
/// Bytes of entry payload bought by one credit.
pub const BYTES_PER_CREDIT: usize = 1024;
/// Default replay window, in minutes either side of now.
pub const REPLAY_RANGE_MINUTES: u64 = 60;
/// How far past the highest known height process lists may be created.
pub const PROCESS_LIST_LOOKAHEAD: u32 = 200;
/// Default payout per server in a coinbase descriptor.
pub const COINBASE_PAYOUT_AMOUNT: u64 = 6_400_000_000;
/// Heights between two coinbase descriptors.
pub const COINBASE_PAYOUT_FREQUENCY: u32 = 25;
/// No coinbase is declared before this height.
pub const COINBASE_DECLARATION_DELAY: u32 = 10;
/// Version written in every directory block header.
pub const DIRECTORY_BLOCK_VERSION: u8 = 0;

/// Chain id of the admin block.
pub const ADMIN_CHAIN_ID: Hash = special_chain(0x0a);
/// Chain id of the entry-credit block.
pub const EC_CHAIN_ID: Hash = special_chain(0x0c);
/// Chain id of the factoid block.
pub const FACTOID_CHAIN_ID: Hash = special_chain(0x0f);

const fn special_chain(last: u8) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[31] = last;
    Hash::from_bytes(&bytes)
}
