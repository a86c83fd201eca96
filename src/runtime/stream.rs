//! Streaming sink for an external progress observer.

use std::sync::Arc;

use futures::{Stream, stream};

use crate::{
    common::Queue,
    events::{Event, StreamItem},
    runtime::Context,
};

impl Context {
    /// Write an event to the stream, or the end-of-stream marker for `None`.
    pub fn write_event_to_stream(
        &self,
        event: Option<Event>,
    ) {
        // sequenced with sends so a snapshot never reads the sink mid-write
        let _log = self.broker_log.lock().unwrap();
        // the sink owns both channel ends, it cannot be closed
        let _ = self.streaming_queue.send(StreamItem::from(event));
    }

    pub fn streaming_queue(&self) -> Arc<Queue<StreamItem>> {
        self.streaming_queue.clone()
    }

    /// Stream of written events, ending at the first end-of-stream marker.
    pub fn stream_events(&self) -> impl Stream<Item = Event> + Send + 'static {
        stream::unfold(self.streaming_queue.clone(), |queue| async move {
            match queue.next_async().await {
                Some(StreamItem::Event(event)) => Some((event, queue)),
                Some(StreamItem::End) | None => None,
            }
        })
    }
}
