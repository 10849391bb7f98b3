//! Streaming Response Pipeline
//!
//! Turns a chat-completion response body into conversation state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  bytes  ┌───────────────┐ events ┌───────────────┐
//! │  ByteStream  │───────► │ StreamDecoder │──────► │ StreamReducer │
//! │ (transport)  │         │ lines, UTF-8  │        │ text, TITLE:  │
//! └──────────────┘         └───────────────┘        └───────┬───────┘
//!                                                           │
//!                          StreamUpdate::Snapshot ◄─────────┤ every delta
//!                          FinishedStream (persist once) ◄──┘ StreamEnd
//! ```
//!
//! # Features
//!
//! - **Chunk-boundary safe**: lines and UTF-8 sequences may be split anywhere
//! - **Best effort**: malformed lines are skipped, never fatal
//! - **Per request**: every response gets its own decoder and reducer
//! - **Cancellable**: [`pump_stream`] stops reading as soon as its token fires
//!
//! # Usage
//!
//! ```ignore
//! let mut decoder = StreamDecoder::new();
//! let mut reducer = StreamReducer::new(conversation);
//! for event in decoder.feed(chunk) {
//!     if let Some(ReducerOutput::Snapshot(msg)) = reducer.apply(event) {
//!         render(&msg);
//!     }
//! }
//! ```

mod decoder;
mod manager;
mod pump;
mod reducer;
mod title;

pub use decoder::{ProtocolEvent, StreamDecoder, DATA_PREFIX, DONE_MARKER};
pub use manager::{
    StreamHandle, StreamManager, StreamManagerConfig, StreamOutcome, StreamRegisterError,
};
pub use pump::{pump_stream, PumpResult};
pub use reducer::{FinishedStream, ReducerOutput, ReducerState, StreamReducer};
pub use title::{extract_title, TitleScan, TITLE_MARKER};
