use crate::conversation::Conversation;
use crate::error::ChatError;
use crate::events::StreamEvent;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

/// Lazy, finite, non-restartable sequence of decoded reply text
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Incremental UTF-8 decoder; a multi-byte character split across chunks is
/// held back until the rest of it arrives.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode as much of `chunk` (plus any held-back bytes) as possible
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut text = String::new();
        let mut input: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    text.push_str(valid);
                    input = &[];
                    break;
                }
                Err(error) => {
                    let (valid, rest) = input.split_at(error.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match error.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        // Incomplete sequence at the end: keep it for the next chunk
                        None => {
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }

        let held_back = input.to_vec();
        self.pending = held_back;
        text
    }

    /// Flush at end of stream; a dangling partial character becomes U+FFFD
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Turn a response body into text fragments. Each chunk is decoded and yielded
/// in arrival order; a gap longer than `idle_timeout` ends the stream with
/// [`ChatError::Stalled`].
pub fn decode_body<S, B, E>(body: S, idle_timeout: Duration) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ChatError> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut body = Box::pin(body);
        let mut decoder = Utf8Decoder::default();

        loop {
            let next = match tokio::time::timeout(idle_timeout, body.next()).await {
                Ok(next) => next,
                Err(_) => {
                    yield Err(ChatError::Stalled(idle_timeout));
                    return;
                }
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    yield Err(e.into());
                    return;
                }
                None => break,
            };

            let text = decoder.decode(chunk.as_ref());
            if !text.is_empty() {
                yield Ok(text);
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            yield Ok(tail);
        }
    })
}

/// Consume `fragments` to completion, appending each one to the newest message.
/// `on_fragment` sees every fragment after it has been applied.
pub async fn drain_into(
    mut fragments: FragmentStream,
    conversation: &mut Conversation,
    mut on_fragment: impl FnMut(&str),
) -> Result<(), ChatError> {
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        conversation.apply_fragment(&fragment);
        on_fragment(&fragment);
    }
    Ok(())
}

/// An in-flight turn running on its own task. Dropping the handle aborts the
/// request, so a stale stream never outlives the turn that started it.
pub struct TurnHandle {
    events: mpsc::UnboundedReceiver<StreamEvent>,
    task: JoinHandle<()>,
}

impl TurnHandle {
    /// Run `request` and forward its fragments as [`StreamEvent`]s
    pub fn spawn<F>(request: F) -> Self
    where
        F: Future<Output = Result<FragmentStream, ChatError>> + Send + 'static,
    {
        let (tx, events) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let mut fragments = match request.await {
                Ok(fragments) => fragments,
                Err(e) => {
                    let _ = tx.send(StreamEvent::Failed(e.to_string()));
                    return;
                }
            };

            while let Some(item) = fragments.next().await {
                match item {
                    Ok(fragment) => {
                        if tx.send(StreamEvent::Fragment(fragment)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(StreamEvent::Failed(e.to_string()));
                        return;
                    }
                }
            }

            let _ = tx.send(StreamEvent::Finished);
        });

        Self { events, task }
    }

    /// Next buffered event without waiting
    pub fn try_next(&mut self) -> Result<StreamEvent, TryRecvError> {
        self.events.try_recv()
    }
}

impl Drop for TurnHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
