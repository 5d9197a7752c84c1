// Console layer - a line-oriented stand-in for the chat server.
// Reads commands from stdin and renders verdicts as text.

pub mod chat_handler;
pub mod commands;
pub mod host;
pub mod session;

pub use host::ConsoleHost;
pub use session::run_session;
