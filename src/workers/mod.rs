pub mod cleanup;

pub use cleanup::{CleanupConfig, CleanupWorker};
