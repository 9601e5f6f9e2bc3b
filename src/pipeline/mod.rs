//! Response stream processing.
//!
//! ```text
//! HTTP body chunks ──► StreamDecoder ──► JSON events (arrival order)
//!   (arbitrary         (UTF-8 state,
//!    boundaries)        line buffer)
//! ```
//!
//! | Item | Description |
//! |------|-------------|
//! | [`decode::StreamDecoder`] | Synchronous, per-request incremental decoder |
//! | [`decode::decode_stream`] | Lazy adapter from a byte stream to an event stream |

pub mod decode;


pub use decode::{decode_stream, DecoderState, StreamDecoder};
