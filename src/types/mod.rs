//! Core request/response types.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and content |
//! | [`CompletionRequest`] | Chat completion parameters |
//! | [`ImageRequest`] | Image generation parameters |
//! | [`CompletionOutput`] | Single body or lazy event stream |

pub mod message;
pub mod request;

pub use message::{ContentBlock, ImageUrl, Message, MessageContent, MessageRole};
pub use request::{CompletionOutput, CompletionRequest, ImageRequest};
