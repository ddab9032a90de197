use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::proxy_event::{ProxyEvent, ProxyEventKind};

pub type ProxyEvents = ReceiverStream<ProxyEvent>;

const EVENT_CAPACITY: usize = 50_000;

pub fn event_channel() -> (EventSink, ProxyEvents) {
    let (sender, receiver) = mpsc::channel(EVENT_CAPACITY);
    (EventSink { sender }, ReceiverStream::new(receiver))
}

/// Sending half of the event stream. Emitting never waits: when the stream
/// is full or nobody is listening the event is dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::Sender<ProxyEvent>,
}

impl EventSink {
    pub fn emit(&self, connection_id: Uuid, kind: ProxyEventKind) {
        let _ = self.sender.try_send(ProxyEvent {
            event_id: Uuid::new_v4(),
            connection_id,
            occurred_at: chrono::Utc::now(),
            kind,
        });
    }
}
