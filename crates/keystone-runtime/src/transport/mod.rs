//! Transports shipped with the runtime.

pub mod console;

pub use console::{ConsoleClient, ConsoleTransport, shutdown_signal};
