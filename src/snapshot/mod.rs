//! Snapshot and restore of a run context.
//!
//! A [`ContextSnapshot`] is the portable form of a [`Context`]: every queue,
//! the shared store, join buffers, in-progress events, the broker log and the
//! run flags. Running-step counters are deliberately left out, they only make
//! sense for live tasks.
//!
//! On restore, the events that were in progress for a step are put back at the
//! front of that step's queue, ahead of the events that were still waiting.

mod codec;

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    Result, StepflowError,
    common::{Queue, Vars},
    events::{Event, EventType, StreamItem},
    model::Workflow,
    runtime::{Context, DEFAULT_WAIT_TIMEOUT},
};

pub use codec::{Base64Codec, CodecKind, EventCodec, JsonCodec};

/// Portable record of a context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// shared store, each value passed through the codec
    #[serde(default)]
    pub globals: BTreeMap<String, Value>,
    /// `null` entries are end-of-stream markers
    #[serde(default)]
    pub streaming_queue: Vec<Value>,
    #[serde(default)]
    pub queues: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    pub stepwise: bool,
    #[serde(default)]
    pub events_buffer: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    pub in_progress: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    pub accepted_events: Vec<(String, String)>,
    #[serde(default)]
    pub broker_log: Vec<Value>,
    /// absent in older snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiter_id: Option<String>,
    #[serde(default)]
    pub is_running: bool,
}

impl ContextSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

fn encode_events<'a>(
    codec: &dyn EventCodec,
    key: &str,
    events: impl IntoIterator<Item = &'a Event>,
) -> Result<Vec<Value>> {
    events
        .into_iter()
        .enumerate()
        .map(|(i, event)| codec.serialize(event).map_err(|e| StepflowError::serialization(format!("{key}[{i}]"), e)))
        .collect()
}

fn decode_events(
    codec: &dyn EventCodec,
    key: &str,
    values: &[Value],
) -> Result<Vec<Event>> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| codec.deserialize(value).map_err(|e| StepflowError::serialization(format!("{key}[{i}]"), e)))
        .collect()
}

impl Context {
    /// Freeze the context into a [`ContextSnapshot`] without consuming any queue.
    ///
    /// Queues are read by draining and refilling them while holding the broker
    /// log lock, the same lock every `send` and stream write holds, so the
    /// queues and the broker log in the record agree with each other. Events
    /// pushed straight into a queue from [`Context::step_queue`] bypass that
    /// lock and must not race with a snapshot.
    pub async fn snapshot(
        &self,
        codec: &dyn EventCodec,
    ) -> Result<ContextSnapshot> {
        let state = self.state.lock().await;

        let globals = state
            .globals
            .iter()
            .map(|(k, v)| match codec.serialize_value(v) {
                Ok(v) => Ok((k.clone(), v)),
                Err(e) => Err(StepflowError::serialization(format!("globals.{k}"), e)),
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let mut in_progress = BTreeMap::new();
        for (step, events) in &state.in_progress {
            in_progress.insert(step.clone(), encode_events(codec, &format!("in_progress.{step}"), events)?);
        }

        // no send or stream write can land until the log is encoded
        let log = self.broker_log.lock().unwrap();

        let mut queues = BTreeMap::new();
        for (id, queue) in &self.queues {
            queues.insert(id.clone(), encode_events(codec, &format!("queues.{id}"), &queue.items())?);
        }

        let streaming_queue = self
            .streaming_queue
            .items()
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let key = format!("streaming_queue[{i}]");
                match item {
                    StreamItem::Event(event) => match codec.serialize(event) {
                        Ok(Value::Null) => Err(StepflowError::Serialization {
                            key,
                            message: "codec encoded an event as null, which marks the end of stream".to_string(),
                        }),
                        Ok(value) => Ok(value),
                        Err(e) => Err(StepflowError::serialization(key, e)),
                    },
                    StreamItem::End => Ok(Value::Null),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let broker_log = encode_events(codec, "broker_log", log.iter())?;
        drop(log);

        let mut events_buffer = BTreeMap::new();
        for (event_type, events) in self.events_buffer.lock().unwrap().iter() {
            events_buffer.insert(event_type.to_string(), encode_events(codec, &format!("events_buffer.{event_type}"), events)?);
        }

        debug!(waiter_id = %self.waiter_id, queues = queues.len(), broker_log = broker_log.len(), "context snapshot taken");

        Ok(ContextSnapshot {
            globals,
            streaming_queue,
            queues,
            stepwise: self.stepwise,
            events_buffer,
            in_progress,
            accepted_events: self.accepted_events(),
            broker_log,
            waiter_id: Some(self.waiter_id.clone()),
            is_running: self.is_running(),
        })
    }

    /// Rebuild a context from a snapshot.
    ///
    /// Each step queue holds that step's in-progress events first, then its
    /// previously queued events. The restored context has nothing in progress
    /// and no running steps.
    pub fn restore(
        workflow: Arc<dyn Workflow>,
        snapshot: &ContextSnapshot,
        codec: &dyn EventCodec,
    ) -> Result<Self> {
        Self::restore_with(workflow, snapshot, codec, DEFAULT_WAIT_TIMEOUT)
    }

    pub(crate) fn restore_with(
        workflow: Arc<dyn Workflow>,
        snapshot: &ContextSnapshot,
        codec: &dyn EventCodec,
        wait_timeout: Duration,
    ) -> Result<Self> {
        let waiter_id = snapshot.waiter_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut ctx = Context::with_parts(workflow, snapshot.stepwise, wait_timeout, waiter_id);

        let globals = snapshot
            .globals
            .iter()
            .map(|(k, v)| match codec.deserialize_value(v) {
                Ok(v) => Ok((k.clone(), v)),
                Err(e) => Err(StepflowError::serialization(format!("globals.{k}"), e)),
            })
            .collect::<Result<Vars>>()?;
        ctx.state.get_mut().globals = globals;

        let streaming_items = snapshot
            .streaming_queue
            .iter()
            .enumerate()
            .map(|(i, value)| match value {
                Value::Null => Ok(StreamItem::End),
                value => codec.deserialize(value).map(StreamItem::Event).map_err(|e| StepflowError::serialization(format!("streaming_queue[{i}]"), e)),
            })
            .collect::<Result<Vec<_>>>()?;
        ctx.streaming_queue = Queue::from_items(streaming_items);

        let mut events_buffer = HashMap::new();
        for (event_type, values) in &snapshot.events_buffer {
            let events = decode_events(codec, &format!("events_buffer.{event_type}"), values)?;
            events_buffer.insert(EventType::from(event_type.as_str()), VecDeque::from(events));
        }
        ctx.events_buffer = Mutex::new(events_buffer);

        ctx.broker_log = Mutex::new(decode_events(codec, "broker_log", &snapshot.broker_log)?);
        ctx.accepted_events = Mutex::new(snapshot.accepted_events.clone());
        ctx.set_running(snapshot.is_running);

        // in-progress events go back to the front of their step's queue
        let ids: BTreeSet<&String> = snapshot.queues.keys().chain(snapshot.in_progress.keys()).collect();
        for id in ids {
            let mut events = match snapshot.in_progress.get(id) {
                Some(values) => decode_events(codec, &format!("in_progress.{id}"), values)?,
                None => Vec::new(),
            };
            if let Some(values) = snapshot.queues.get(id) {
                events.extend(decode_events(codec, &format!("queues.{id}"), values)?);
            }

            if !ctx.queues.contains_key(id.as_str()) {
                debug!(queue = %id, "restoring queue unknown to the workflow");
            }
            ctx.queues.insert(id.clone(), Queue::from_items(events));
        }

        debug!(waiter_id = %ctx.waiter_id, queues = ctx.queues.len(), "context restored");
        Ok(ctx)
    }
}
