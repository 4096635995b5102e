//! Sink implementations

pub mod console;
pub mod file;
pub mod remote;
pub mod rotating_file;

pub use console::ConsoleAppender;
pub use file::FileAppender;
pub use remote::{build_request_body, HttpLog, LogsRequest, RemoteAppender};
pub use rotating_file::{RotatingFileWriter, RotationPolicy};

pub use crate::core::{Appender, BatchTransport};
