pub mod executor;

// exports so callers don't have to dig
pub use executor::{
    CancelHandle, MigrationExecutor, MigrationOptions, MigrationOutcome, MigrationReport,
    SkipReason,
};
