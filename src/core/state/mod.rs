pub mod lock_file;

pub use lock_file::{LockState, LOCK_FILE};
