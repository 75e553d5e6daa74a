// Copyright (c) 2024 DCHAIN LABS

/// Hash size
pub const HASH_SIZE_BYTES: usize = 32;
