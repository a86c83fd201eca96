use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    Result, StepflowError,
    common::{Queue, Signal, Vars},
    events::{Event, EventType, StreamItem},
    model::Workflow,
    runtime::StepGate,
};

/// Default upper bound for `wait_for_event`, long but never infinite.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(2000);

/// Context-wide state guarded by the single coarse lock.
#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) globals: Vars,
    pub(crate) in_progress: HashMap<String, Vec<Event>>,
    /// never holds a zero count
    pub(crate) running_steps: HashMap<String, usize>,
}

/// Run context shared by every step invocation of one workflow run.
///
/// `globals`, in-progress events and running-step counters share one async
/// mutex. Queues and the broker log synchronize on their own and are not
/// covered by that lock.
pub struct Context {
    pub(crate) workflow: Arc<dyn Workflow>,
    pub(crate) stepwise: bool,
    pub(crate) is_running: AtomicBool,
    pub(crate) wait_timeout: Duration,

    /// Queue id of the waiter, never a step name.
    pub(crate) waiter_id: String,
    pub(crate) queues: HashMap<String, Arc<Queue<Event>>>,
    pub(crate) broker_log: Mutex<Vec<Event>>,

    pub(crate) state: tokio::sync::Mutex<State>,
    /// Join buffers, keyed by event type, behind their own lock.
    pub(crate) events_buffer: Mutex<HashMap<EventType, VecDeque<Event>>>,
    pub(crate) holding_events: Mutex<Option<Vec<Event>>>,
    pub(crate) streaming_queue: Arc<Queue<StreamItem>>,
    pub(crate) accepted_events: Mutex<Vec<(String, String)>>,
    pub(crate) result: RwLock<Option<Value>>,

    pub(crate) cancel: Arc<Signal>,
    pub(crate) gate: Arc<StepGate>,
}

impl std::fmt::Debug for Context {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let mut queues: Vec<&String> = self.queues.keys().collect();
        queues.sort();
        f.debug_struct("Context")
            .field("waiter_id", &self.waiter_id)
            .field("stepwise", &self.stepwise)
            .field("is_running", &self.is_running())
            .field("wait_timeout", &self.wait_timeout)
            .field("queues", &queues)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create a fresh context with one queue per workflow step plus the waiter queue.
    pub fn new(
        workflow: Arc<dyn Workflow>,
        stepwise: bool,
    ) -> Self {
        Self::with_parts(workflow, stepwise, DEFAULT_WAIT_TIMEOUT, uuid::Uuid::new_v4().to_string())
    }

    pub(crate) fn with_parts(
        workflow: Arc<dyn Workflow>,
        stepwise: bool,
        wait_timeout: Duration,
        waiter_id: String,
    ) -> Self {
        let mut queues: HashMap<String, Arc<Queue<Event>>> = workflow.steps().into_iter().map(|step| (step, Queue::new())).collect();
        queues.insert(waiter_id.clone(), Queue::new());

        debug!(waiter_id = %waiter_id, steps = queues.len() - 1, stepwise, "context created");

        Self {
            workflow,
            stepwise,
            is_running: AtomicBool::new(false),
            wait_timeout,
            waiter_id,
            queues,
            broker_log: Mutex::new(Vec::new()),
            state: tokio::sync::Mutex::new(State::default()),
            events_buffer: Mutex::new(HashMap::new()),
            holding_events: Mutex::new(None),
            streaming_queue: Queue::new(),
            accepted_events: Mutex::new(Vec::new()),
            result: RwLock::new(None),
            cancel: Arc::new(Signal::new()),
            gate: Arc::new(StepGate::new()),
        }
    }

    /// Store `value` under `key`; the last write wins.
    pub async fn set<V: Serialize>(
        &self,
        key: impl Into<String>,
        value: V,
    ) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value)?;

        let mut state = self.state.lock().await;
        trace!(key = %key, "set global");
        state.globals.set(&key, value);
        Ok(())
    }

    /// Get the value stored under `key`.
    ///
    /// Falls back to `default` when the key is missing, and fails with
    /// [`StepflowError::KeyNotFound`] when no default was supplied.
    pub async fn get<V: DeserializeOwned>(
        &self,
        key: &str,
        default: Option<V>,
    ) -> Result<V> {
        let value = {
            let state = self.state.lock().await;
            state.globals.get_value(key).cloned()
        };

        match (value, default) {
            (Some(v), _) => Ok(serde_json::from_value(v)?),
            (None, Some(default)) => Ok(default),
            (None, None) => Err(StepflowError::KeyNotFound(key.to_string())),
        }
    }

    /// Atomically read, transform and write back the value under `key`.
    ///
    /// The whole read-modify-write runs inside the context lock, so `f` must be
    /// quick and must not touch the context itself.
    pub async fn update<V, F>(
        &self,
        key: &str,
        default: Option<V>,
        f: F,
    ) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce(V) -> V,
    {
        let mut state = self.state.lock().await;

        let current = match (state.globals.get_value(key), default) {
            (Some(v), _) => serde_json::from_value(v.clone())?,
            (None, Some(default)) => default,
            (None, None) => return Err(StepflowError::KeyNotFound(key.to_string())),
        };

        let updated = f(current);
        state.globals.set(key, serde_json::to_value(&updated)?);
        Ok(updated)
    }

    /// Copy of every value in the shared store.
    pub async fn globals(&self) -> Vars {
        self.state.lock().await.globals.clone()
    }

    pub fn workflow(&self) -> Arc<dyn Workflow> {
        self.workflow.clone()
    }

    pub fn waiter_id(&self) -> &str {
        &self.waiter_id
    }

    pub fn is_stepwise(&self) -> bool {
        self.stepwise
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn set_running(
        &self,
        running: bool,
    ) {
        self.is_running.store(running, Ordering::SeqCst);
    }

    /// Terminal value of the run, written by the scheduler.
    pub fn set_result(
        &self,
        result: Value,
    ) {
        *self.result.write().unwrap() = Some(result);
    }

    pub fn result(&self) -> Option<Value> {
        self.result.read().unwrap().clone()
    }

    /// Record that `step` accepted an event of `event_type`.
    pub fn record_accepted_event(
        &self,
        step: &str,
        event_type: &EventType,
    ) {
        self.accepted_events.lock().unwrap().push((step.to_string(), event_type.to_string()));
    }

    pub fn accepted_events(&self) -> Vec<(String, String)> {
        self.accepted_events.lock().unwrap().clone()
    }

    /// Run-wide cancellation signal. The scheduler fires it, long waits observe it.
    pub fn cancel_signal(&self) -> Arc<Signal> {
        self.cancel.clone()
    }

    /// Step-advance primitives for a stepwise scheduler.
    pub fn step_gate(&self) -> Arc<StepGate> {
        self.gate.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::WorkflowModel;

    pub(crate) fn create_test_context(stepwise: bool) -> Context {
        let workflow = WorkflowModel::new("test").step("a", ["ping", "pong"]).step("b", ["pong"]);
        Context::new(Arc::new(workflow), stepwise)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let ctx = create_test_context(false);
        ctx.set("name", "Alice").await.unwrap();
        ctx.set("count", 3).await.unwrap();
        ctx.set("data", json!({"nested": [1, 2]})).await.unwrap();

        assert_eq!(ctx.get::<String>("name", None).await.unwrap(), "Alice");
        assert_eq!(ctx.get::<i64>("count", None).await.unwrap(), 3);
        assert_eq!(ctx.get::<Value>("data", None).await.unwrap(), json!({"nested": [1, 2]}));
    }

    #[tokio::test]
    async fn test_set_last_write_wins() {
        let ctx = create_test_context(false);
        ctx.set("k", 1).await.unwrap();
        ctx.set("k", 2).await.unwrap();
        assert_eq!(ctx.get::<i64>("k", None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let ctx = create_test_context(false);

        let err = ctx.get::<i64>("missing", None).await.unwrap_err();
        assert_eq!(err, StepflowError::KeyNotFound("missing".to_string()));

        assert_eq!(ctx.get("missing", Some(42)).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_get_wrong_type() {
        let ctx = create_test_context(false);
        ctx.set("k", "text").await.unwrap();
        assert!(matches!(ctx.get::<i64>("k", None).await, Err(StepflowError::Convert(_))));
    }

    #[tokio::test]
    async fn test_update_is_atomic() {
        let ctx = Arc::new(create_test_context(false));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move { ctx.update("counter", Some(0), |n: i64| n + 1).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(ctx.get::<i64>("counter", None).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_update_missing_without_default() {
        let ctx = create_test_context(false);
        let err = ctx.update("x", None, |n: i64| n + 1).await.unwrap_err();
        assert_eq!(err, StepflowError::KeyNotFound("x".to_string()));
    }

    #[test]
    fn test_new_context_queues() {
        let ctx = create_test_context(false);
        assert_eq!(ctx.queues.len(), 3);
        assert!(ctx.queues.contains_key(ctx.waiter_id()));
        assert!(!ctx.workflow().steps().contains(&ctx.waiter_id().to_string()));
    }

    #[test]
    fn test_context_debug() {
        let ctx = create_test_context(true);
        let text = format!("{ctx:?}");

        assert!(text.starts_with("Context {"));
        assert!(text.contains(ctx.waiter_id()));
        assert!(text.contains("stepwise: true"));
        assert!(text.contains(r#""a""#) && text.contains(r#""b""#));
        assert!(text.ends_with(".. }"));
    }

    #[test]
    fn test_waiter_id_unique_per_context() {
        let a = create_test_context(false);
        let b = create_test_context(false);
        assert_ne!(a.waiter_id(), b.waiter_id());
    }

    #[test]
    fn test_result_and_running_flag() {
        let ctx = create_test_context(false);
        assert!(!ctx.is_running());
        assert_eq!(ctx.result(), None);

        ctx.set_running(true);
        ctx.set_result(json!("done"));

        assert!(ctx.is_running());
        assert_eq!(ctx.result(), Some(json!("done")));
    }

    #[test]
    fn test_accepted_events_audit() {
        let ctx = create_test_context(false);
        ctx.record_accepted_event("a", &"ping".into());
        assert_eq!(ctx.accepted_events(), vec![("a".to_string(), "ping".to_string())]);
    }
}
