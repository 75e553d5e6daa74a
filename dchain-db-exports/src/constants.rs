// Errors
pub const CRUD_ERROR: &str = "critical: database crud operation failed";
pub const MISSING_BLOCK_ERROR: &str = "critical: a block below the database head is missing";
pub const CLOSED_ERROR: &str = "database is closed";
