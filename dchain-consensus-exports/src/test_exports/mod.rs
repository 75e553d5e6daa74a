// Copyright (c) 2024 DCHAIN LABS
mod config;
mod network;

pub use config::*;
pub use network::*;
