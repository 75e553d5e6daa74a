// Copyright (c) 2024 DCHAIN LABS
//! In-memory implementation of the block database.
#![warn(unused_crate_dependencies)]

mod memory_db;

pub use memory_db::MemoryDB;
