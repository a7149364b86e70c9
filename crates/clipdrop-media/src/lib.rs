// crates/clipdrop-media/src/lib.rs
//
// Everything with side effects beyond the filesystem: PNG encode/decode, HTTP
// downloads, child processes, and the built-in handlers built on them.

pub mod codecs;
pub mod fetch;
pub mod handlers;
pub mod mime;
pub mod process;

pub use codecs::builtin_codecs;
pub use fetch::{Fetch, UreqFetch};
pub use handlers::handler_sources;
