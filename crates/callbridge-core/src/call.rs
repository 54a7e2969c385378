//! The live call: a channel pair with the adapter on one side and the
//! transport on the other.
//!
//! Adapters drive the [`CallHandle`]; transport implementations drive the
//! [`TransportCall`] peer. Instructions flow adapter-to-transport over an
//! unbounded channel so teardown is never blocked; events flow back over a
//! bounded channel so a slow consumer applies backpressure to the transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc;

use crate::{CallStatus, RawCallError};

const DEFAULT_EVENT_BUFFER: usize = 64;

fn event_buffer() -> usize {
    std::env::var("CALLBRIDGE_EVENT_BUFFER")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_EVENT_BUFFER)
}

/// Per-invocation lifecycle phase shared by the two adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Not started; the transport call opens on first poll.
    Idle,
    /// Call open, events flowing.
    Open,
    /// Finished emitting, or cancelled and draining; completes without
    /// another value.
    Draining,
    /// Terminal state, reached exactly once. Nothing further is emitted.
    Terminated,
}

/// An event delivered by the transport for one call.
#[derive(Debug)]
pub enum CallEvent<V> {
    /// A response value arrived.
    Data(V),
    /// The call failed. Terminal.
    Error(RawCallError),
    /// The call completed normally. Terminal.
    End,
}

/// An instruction issued by the adapter toward the transport.
#[derive(Debug)]
pub enum CallInstruction<V> {
    /// Forward one request value.
    Write(V),
    /// The request side is done sending.
    CloseSend,
    /// Abort the call with an error raised on this side, e.g. a failed
    /// request stream.
    Fail(CallStatus),
    /// Consumer-initiated cancellation.
    Cancel,
}

/// The adapter-facing half of one in-flight call.
pub struct CallHandle<V> {
    instructions: mpsc::UnboundedSender<CallInstruction<V>>,
    events: mpsc::Receiver<CallEvent<V>>,
    finished: Arc<AtomicBool>,
}

impl<V: Send + 'static> CallHandle<V> {
    /// Create a connected handle/transport pair for one invocation.
    pub fn pair() -> (CallHandle<V>, TransportCall<V>) {
        let (instruction_tx, instruction_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(event_buffer());
        let finished = Arc::new(AtomicBool::new(false));
        (
            CallHandle {
                instructions: instruction_tx,
                events: event_rx,
                finished: finished.clone(),
            },
            TransportCall {
                instructions: instruction_rx,
                events: event_tx,
                finished,
            },
        )
    }

    /// Forward one request value to the transport.
    ///
    /// A failed send means the transport side is gone; the call's own
    /// terminal event is the authoritative failure signal, so this only logs.
    pub fn write(&self, value: V) {
        if self.instructions.send(CallInstruction::Write(value)).is_err() {
            tracing::debug!("write after transport side closed; value dropped");
        }
    }

    /// Signal that the request side is complete.
    pub fn close_send(&self) {
        let _ = self.instructions.send(CallInstruction::CloseSend);
    }

    /// Abort the call with a locally raised error.
    pub fn fail(&self, status: CallStatus) {
        let _ = self.instructions.send(CallInstruction::Fail(status));
    }

    /// Issue a consumer-initiated cancellation.
    pub fn cancel(&self) {
        let _ = self.instructions.send(CallInstruction::Cancel);
    }

    /// True once the transport has delivered its terminal event.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Stop listening for events. Idempotent.
    pub fn destroy(&mut self) {
        self.events.close();
    }

    /// Poll for the next transport event.
    pub fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<CallEvent<V>>> {
        self.events.poll_recv(cx)
    }
}

/// The transport-facing half of one in-flight call.
pub struct TransportCall<V> {
    instructions: mpsc::UnboundedReceiver<CallInstruction<V>>,
    events: mpsc::Sender<CallEvent<V>>,
    finished: Arc<AtomicBool>,
}

impl<V: Send + 'static> TransportCall<V> {
    /// Deliver one response value. Returns `false` when the adapter has
    /// stopped listening.
    pub async fn data(&self, value: V) -> bool {
        self.events.send(CallEvent::Data(value)).await.is_ok()
    }

    /// Complete the call normally. Terminal.
    pub async fn end(&self) {
        self.finished.store(true, Ordering::Release);
        let _ = self.events.send(CallEvent::End).await;
    }

    /// Fail the call. Terminal.
    pub async fn error(&self, raw: RawCallError) {
        self.finished.store(true, Ordering::Release);
        let _ = self.events.send(CallEvent::Error(raw)).await;
    }

    /// Single-response completion: one value, then end.
    pub async fn respond(&self, value: V) {
        let _ = self.data(value).await;
        self.end().await;
    }

    /// Receive the next adapter instruction. `None` once the adapter side is
    /// gone.
    pub async fn next_instruction(&mut self) -> Option<CallInstruction<V>> {
        self.instructions.recv().await
    }

    /// Receive the next instruction without waiting.
    pub fn try_next_instruction(&mut self) -> Option<CallInstruction<V>> {
        self.instructions.try_recv().ok()
    }

    /// True once this side has delivered its terminal event.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}
