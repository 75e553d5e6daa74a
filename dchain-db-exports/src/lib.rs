// Copyright (c) 2024 DCHAIN LABS
//! Contract of the block database the consensus driver writes finished heights to.
mod constants;
mod controller;
mod db_batch;
mod error;
mod settings;

pub use constants::*;
pub use controller::*;
pub use db_batch::*;
pub use error::*;
pub use settings::*;
