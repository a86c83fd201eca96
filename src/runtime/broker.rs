//! Event broker and wait-for-event.
//!
//! The broker routes events to step queues and the waiter queue, and keeps an
//! append-only log of every successful send in global send order.

use std::{sync::Arc, time::Duration};

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::{
    Result, StepflowError,
    common::{Queue, Vars},
    events::{Event, EventType, TypedEvent},
    runtime::Context,
};

impl Context {
    /// Send `event` to `step`, or to every queue when `step` is `None`.
    ///
    /// A targeted send is validated against the workflow: the step must exist
    /// and accept the event's exact type. Targeting the waiter id delivers to
    /// the waiter queue. Only successful sends reach the broker log and, in
    /// stepwise mode, the holding buffer.
    pub fn send(
        &self,
        event: Event,
        step: Option<&str>,
    ) -> Result<()> {
        // the log lock sequences sends, so log order matches every queue's order
        let mut log = self.broker_log.lock().unwrap();

        match step {
            None => {
                trace!(event_type = %event.event_type(), queues = self.queues.len(), "broadcast event");
                for queue in self.queues.values() {
                    queue.send(event.clone())?;
                }
            }
            Some(step) if step == self.waiter_id => {
                self.waiter_queue().send(event.clone())?;
            }
            Some(step) => {
                let accepted = self.workflow.accepted_events(step).ok_or_else(|| StepflowError::UnknownStep(step.to_string()))?;
                if !accepted.contains(event.event_type()) {
                    debug!(step, event_type = %event.event_type(), "event rejected by step");
                    return Err(StepflowError::EventNotAccepted {
                        step: step.to_string(),
                        event_type: event.event_type().to_string(),
                    });
                }

                let queue = self.queues.get(step).ok_or_else(|| StepflowError::UnknownStep(step.to_string()))?;
                trace!(step, event_type = %event.event_type(), "send event");
                queue.send(event.clone())?;
            }
        }

        log.push(event.clone());
        drop(log);

        self.record_holding(event);
        Ok(())
    }

    /// [`Context::send`] for a typed payload.
    pub fn send_typed<T: TypedEvent>(
        &self,
        payload: &T,
        step: Option<&str>,
    ) -> Result<()> {
        self.send(Event::from_typed(payload)?, step)
    }

    /// Every event sent so far, in send order.
    pub fn broker_log(&self) -> Vec<Event> {
        self.broker_log.lock().unwrap().clone()
    }

    /// Inbound queue of `step`, or the waiter queue when given the waiter id.
    pub fn step_queue(
        &self,
        step: &str,
    ) -> Option<Arc<Queue<Event>>> {
        self.queues.get(step).cloned()
    }

    /// Take the next event from `step`'s queue, suspending until one arrives.
    pub async fn receive(
        &self,
        step: &str,
    ) -> Result<Event> {
        let queue = self.step_queue(step).ok_or_else(|| StepflowError::UnknownStep(step.to_string()))?;
        queue.next_async().await.ok_or_else(|| StepflowError::Queue(format!("queue of step {step} is closed")))
    }

    pub(crate) fn waiter_queue(&self) -> Arc<Queue<Event>> {
        // inserted at construction and never removed
        self.queues[&self.waiter_id].clone()
    }

    /// Wait for an event of exactly `event_type` on the waiter queue.
    ///
    /// Every requirement must equal the event's field of the same name (a missing
    /// field is "no value"). Non-matching events are discarded. The timeout,
    /// [`DEFAULT_WAIT_TIMEOUT`](crate::DEFAULT_WAIT_TIMEOUT) unless configured
    /// otherwise, bounds the whole wait. Firing the cancellation signal aborts
    /// the wait with [`StepflowError::Cancelled`].
    pub async fn wait_for_event(
        &self,
        event_type: &EventType,
        requirements: Option<&Vars>,
        timeout: Option<Duration>,
    ) -> Result<Event> {
        let timeout = timeout.unwrap_or(self.wait_timeout);
        let started = Instant::now();
        let deadline = started + timeout;
        let waiter = self.waiter_queue();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.wait() => return Err(StepflowError::Cancelled),
                next = tokio::time::timeout_at(deadline, waiter.next_async()) => next,
            };

            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => return Err(StepflowError::Queue("waiter queue is closed".to_string())),
                Err(_) => {
                    debug!(event_type = %event_type, ?timeout, "wait for event timed out");
                    return Err(StepflowError::WaitTimeout {
                        event_type: event_type.to_string(),
                        elapsed: started.elapsed(),
                    });
                }
            };

            if event.matches(event_type, requirements) {
                return Ok(event);
            }
            trace!(expected = %event_type, got = %event.event_type(), "discard event");
        }
    }

    /// [`Context::wait_for_event`] decoding the matching event into `T`.
    pub async fn wait_for<T: TypedEvent>(
        &self,
        requirements: Option<&Vars>,
        timeout: Option<Duration>,
    ) -> Result<T> {
        self.wait_for_event(&T::event_type(), requirements, timeout).await?.to_typed()
    }
}
