// Copyright (c) 2024 DCHAIN LABS

mod admin;
mod directory;
mod entry_block;
mod entry_credit;
mod factoid;
mod finalized;

pub use admin::{AdminBlock, AdminEntry};
pub use directory::{DBEntry, DirectoryBlock, DirectoryBlockHeader};
pub use entry_block::{EBEntry, Entry, EntryBlock};
pub use entry_credit::{ECEntry, EntryCreditBlock};
pub use factoid::FactoidBlock;
pub use finalized::FinalizedBlock;
