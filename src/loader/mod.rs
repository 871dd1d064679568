pub mod scanner;
pub mod watcher;

pub use scanner::{scan_root, ScanError, ScanReport};
pub use watcher::{RescanOutcome, Watcher};
