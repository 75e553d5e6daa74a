// Copyright (c) 2024 DCHAIN LABS

/// hard-coded protocol constants
pub mod constants;
pub use constants::*;
