//! X11 implementation using Xlib queries and XTest injection.

mod connection;
mod simulate;

pub use connection::XlibWindowSystem;
