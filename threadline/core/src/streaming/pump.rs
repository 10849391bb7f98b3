//! Stream pump
//!
//! Pulls chunks from a response body and runs them through a decoder and a
//! reducer. Reading the next chunk is the only suspension point, and every
//! suspension also watches the cancellation token.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::decoder::StreamDecoder;
use super::reducer::{FinishedStream, ReducerOutput, StreamReducer};
use crate::backend::ByteStream;
use crate::error::ChatError;
use crate::messages::{MessageId, StreamUpdate};

/// How a pumped stream ended
#[derive(Debug)]
pub enum PumpResult {
    /// `StreamEnd` was reached
    Finished(FinishedStream),
    /// The token fired or the update receiver went away
    Cancelled {
        /// The discarded assistant message
        message_id: MessageId,
    },
    /// The body failed mid-stream
    Failed {
        /// The discarded assistant message
        message_id: MessageId,
        /// Transport error
        error: ChatError,
        /// Text shown before the failure
        partial_content: String,
    },
}

/// Drive `body` through a fresh decoder and `reducer`
///
/// Sends one `StreamUpdate::Snapshot` per non-empty delta, in decode order.
/// Terminal updates are left to the caller. The body is dropped, releasing
/// the connection, as soon as this returns.
pub async fn pump_stream(
    mut body: ByteStream,
    mut reducer: StreamReducer,
    updates: &mpsc::Sender<StreamUpdate>,
    cancel: &CancellationToken,
) -> PumpResult {
    let mut decoder = StreamDecoder::new();
    let message_id = reducer.message_id().clone();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                reducer.cancel();
                return PumpResult::Cancelled { message_id };
            }
            chunk = body.next() => chunk,
        };

        let events = match next {
            Some(Ok(bytes)) => decoder.feed(&bytes),
            Some(Err(error)) => {
                let partial_content = reducer.display_text();
                reducer.cancel();
                return PumpResult::Failed {
                    message_id,
                    error,
                    partial_content,
                };
            }
            None => decoder.finish(),
        };

        for event in events {
            match reducer.apply(event) {
                Some(ReducerOutput::Snapshot(snapshot)) => {
                    let delivered = tokio::select! {
                        biased;
                        () = cancel.cancelled() => false,
                        sent = updates.send(StreamUpdate::Snapshot(snapshot)) => sent.is_ok(),
                    };
                    if !delivered {
                        // Cancelled, or the receiver was dropped
                        reducer.cancel();
                        return PumpResult::Cancelled { message_id };
                    }
                }
                Some(ReducerOutput::Finished(finished)) => return PumpResult::Finished(finished),
                None => {}
            }
        }
    }
}
