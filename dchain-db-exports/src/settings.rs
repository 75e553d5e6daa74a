// Copyright (c) 2024 DCHAIN LABS

/// Database configuration
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Number of most recent heights whose entry blocks and entries `trim` keeps.
    /// `None` keeps everything.
    pub keep_heights: Option<u32>,
}
