//! Durable slow-query log
//!
//! ## Layout
//!
//! ```text
//! <log_directory>/
//!   slow-queries-2026-10-18.ndjson                 active file (daily rotation)
//!   slow-queries-2026-10-18-1792324799000.ndjson   archive, rotated on size
//!   slow-queries.ndjson                            active file (daily rotation off)
//! ```
//!
//! One JSON object per line. Writes are at-least-once: a batch that fails to
//! write is requeued and may be duplicated if the process dies mid-retry.

pub mod console;
pub mod reader;
pub mod rotation;
pub mod writer;

pub use console::ConsoleLogLevel;
pub use reader::{read_log_file, LogReader, LogSummary};
pub use rotation::LogFileInfo;
pub use writer::SlowQueryLogger;
