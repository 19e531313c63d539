//! Dial sink implementations
//!
//! Contains StdioSink, FileSink, StreamSink, HttpSink, and WsSink.

mod file;
mod http;
mod stdio;
mod stream;
mod ws;

pub use self::file::FileSink;
pub use self::http::HttpSink;
pub use self::stdio::StdioSink;
pub use self::stream::StreamSink;
pub use self::ws::WsSink;
