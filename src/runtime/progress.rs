//! Step progress tracking.
//!
//! Running counters are only meaningful while a run is live and are never
//! persisted. In-progress events are persisted so a restored run can redeliver
//! them.

use tracing::{trace, warn};

use crate::{Result, StepflowError, events::Event, runtime::Context};

impl Context {
    /// Record `event` as the input of an invocation of `step` that just started.
    pub async fn mark_in_progress(
        &self,
        step: &str,
        event: Event,
    ) {
        let mut state = self.state.lock().await;
        trace!(step, event_type = %event.event_type(), "mark in progress");
        state.in_progress.entry(step.to_string()).or_default().push(event);
    }

    /// Remove every in-progress entry of `step` equal to `event`.
    pub async fn remove_from_in_progress(
        &self,
        step: &str,
        event: &Event,
    ) {
        let mut state = self.state.lock().await;
        if let Some(events) = state.in_progress.get_mut(step) {
            events.retain(|e| e != event);
            if events.is_empty() {
                state.in_progress.remove(step);
            }
        }
    }

    /// Input events of the unfinished invocations of `step`, oldest first.
    pub async fn in_progress(
        &self,
        step: &str,
    ) -> Vec<Event> {
        self.state.lock().await.in_progress.get(step).cloned().unwrap_or_default()
    }

    pub async fn add_running_step(
        &self,
        step: &str,
    ) {
        let mut state = self.state.lock().await;
        *state.running_steps.entry(step.to_string()).or_insert(0) += 1;
    }

    /// Decrement the running counter of `step`, dropping it at zero.
    ///
    /// Fails when `step` is not running: increments and decrements must be paired.
    pub async fn remove_running_step(
        &self,
        step: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let Some(count) = state.running_steps.get_mut(step) else {
            warn!(step, "unpaired running step decrement");
            return Err(StepflowError::Runtime(format!("step {step} is not running")));
        };

        *count -= 1;
        if *count == 0 {
            state.running_steps.remove(step);
        }
        Ok(())
    }

    /// Names of the steps with at least one active invocation, sorted.
    pub async fn running_steps(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut steps: Vec<String> = state.running_steps.keys().cloned().collect();
        steps.sort();
        steps
    }
}

#[cfg(test)]
mod tests {
    use crate::{StepflowError, Vars, events::Event, runtime::create_test_context};

    #[tokio::test]
    async fn test_running_steps_inc_dec() {
        let ctx = create_test_context(false);

        for _ in 0..3 {
            ctx.add_running_step("s").await;
        }
        assert_eq!(ctx.running_steps().await, vec!["s"]);
        assert_eq!(ctx.state.lock().await.running_steps.get("s"), Some(&3));

        for _ in 0..3 {
            ctx.remove_running_step("s").await.unwrap();
            assert!(!ctx.state.lock().await.running_steps.values().any(|c| *c == 0));
        }
        assert!(ctx.running_steps().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_running_step_unpaired() {
        let ctx = create_test_context(false);
        let err = ctx.remove_running_step("ghost").await.unwrap_err();
        assert!(matches!(err, StepflowError::Runtime(_)));
        assert!(ctx.running_steps().await.is_empty());
    }

    #[tokio::test]
    async fn test_running_steps_sorted() {
        let ctx = create_test_context(false);
        ctx.add_running_step("b").await;
        ctx.add_running_step("a").await;
        assert_eq!(ctx.running_steps().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_in_progress_removed_by_equality() {
        let ctx = create_test_context(false);
        let first = Event::new("ping", Vars::new().with("id", 1));
        let second = Event::new("ping", Vars::new().with("id", 2));

        ctx.mark_in_progress("a", first.clone()).await;
        ctx.mark_in_progress("a", second.clone()).await;
        assert_eq!(ctx.in_progress("a").await, vec![first.clone(), second.clone()]);

        ctx.remove_from_in_progress("a", &first).await;
        assert_eq!(ctx.in_progress("a").await, vec![second.clone()]);

        // removing an event that is not tracked changes nothing
        ctx.remove_from_in_progress("a", &Event::empty("other")).await;
        assert_eq!(ctx.in_progress("a").await, vec![second.clone()]);

        ctx.remove_from_in_progress("a", &second).await;
        assert!(ctx.in_progress("a").await.is_empty());
    }
}
