use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use serde_json::Value;
use tracing::debug;

use crate::error::{OandaError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// No stream response attached yet.
    NotStarted,
    Streaming,
    Terminated,
    /// Source ended on its own, or the consumer dropped the stream.
    Exhausted,
}

struct Signal {
    state: StreamState,
    generation: u64,
    sender: Option<oneshot::Sender<String>>,
}

fn lock(signal: &Mutex<Signal>) -> MutexGuard<'_, Signal> {
    signal.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle used to stop a stream from outside the consuming loop. Clones share
/// the same signal, so one can be moved to another task while the request
/// (and its stream) is consumed elsewhere.
#[derive(Clone)]
pub struct StreamTerminator {
    signal: Arc<Mutex<Signal>>,
}

impl StreamTerminator {
    pub(crate) fn new() -> Self {
        Self {
            signal: Arc::new(Mutex::new(Signal {
                state: StreamState::NotStarted,
                generation: 0,
                sender: None,
            })),
        }
    }

    pub fn state(&self) -> StreamState {
        lock(&self.signal).state
    }

    /// Makes the next poll of the live stream fail with
    /// [`OandaError::StreamTerminated`] carrying `reason`. The connection is
    /// released once the consumer drops the stream.
    pub fn terminate(&self, reason: Option<&str>) -> Result<()> {
        let mut signal = lock(&self.signal);
        if signal.state != StreamState::Streaming {
            return Err(OandaError::no_stream_response());
        }
        signal.state = StreamState::Terminated;
        let reason = reason.unwrap_or_default().to_string();
        debug!("Terminating transactions stream: '{reason}'");
        if let Some(sender) = signal.sender.take() {
            if sender.send(reason).is_err() {
                debug!("Stream consumer is gone, termination not delivered");
            }
        }
        Ok(())
    }

    pub(crate) fn bind(&self, mut stream: TransactionStream) -> TransactionStream {
        if let Some(previous) = stream.binding.take() {
            previous.finish(StreamState::Exhausted);
        }
        let (sender, receiver) = oneshot::channel();
        let mut signal = lock(&self.signal);
        signal.generation += 1;
        signal.state = StreamState::Streaming;
        signal.sender = Some(sender);
        stream.binding = Some(Binding {
            signal: Arc::clone(&self.signal),
            generation: signal.generation,
            receiver,
        });
        stream
    }
}

struct Binding {
    signal: Arc<Mutex<Signal>>,
    generation: u64,
    receiver: oneshot::Receiver<String>,
}

impl Binding {
    /// Leaves `Streaming` for `state` unless a newer stream was bound meanwhile.
    fn finish(&self, state: StreamState) {
        let mut signal = lock(&self.signal);
        if signal.generation == self.generation && signal.state == StreamState::Streaming {
            debug!("Transactions stream is {state:?}");
            signal.state = state;
            signal.sender = None;
        }
    }
}

/// Lazy, single pass sequence of decoded stream events.
///
/// Once terminated it yields the termination error once and then ends. It
/// implements [`Stream`], so blocking consumers can drive it with
/// `futures::executor::block_on_stream`.
pub struct TransactionStream {
    events: BoxStream<'static, Result<Value>>,
    binding: Option<Binding>,
    finished: bool,
}

impl TransactionStream {
    pub fn new<S>(events: S) -> Self
        where
            S: Stream<Item=Result<Value>> + Send + 'static,
    {
        Self {
            events: events.boxed(),
            binding: None,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn poll_signal(&mut self, cx: &mut Context<'_>) -> Option<String> {
        let binding = self.binding.as_mut()?;
        match binding.receiver.poll_unpin(cx) {
            Poll::Ready(Ok(reason)) => Some(reason),
            _ => None,
        }
    }

    // The terminator may win the race against the end of the source, in which
    // case its reason is still waiting in the channel.
    fn exhaust(&mut self) -> Option<String> {
        let binding = self.binding.as_mut()?;
        binding.finish(StreamState::Exhausted);
        binding.receiver.try_recv().ok().flatten()
    }
}

impl Stream for TransactionStream {
    type Item = Result<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        if let Some(reason) = this.poll_signal(cx) {
            this.finished = true;
            return Poll::Ready(Some(Err(OandaError::StreamTerminated(reason))));
        }
        match this.events.poll_next_unpin(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(event)),
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(this.exhaust().map(|reason| Err(OandaError::StreamTerminated(reason))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for TransactionStream {
    fn drop(&mut self) {
        if let Some(binding) = &self.binding {
            binding.finish(StreamState::Exhausted);
        }
    }
}
