//! Join collector and stepwise holding buffer.

use tracing::trace;

use crate::{
    events::{Event, EventType},
    runtime::Context,
};

impl Context {
    /// Buffer `event` and try to complete a join over `expected`.
    ///
    /// Returns one event per expected type, in the order of `expected`, once
    /// every type has at least one buffered event; the returned events leave
    /// their buffers. Otherwise every buffer is left as it was, plus `event`,
    /// and `None` is returned.
    pub fn collect_events(
        &self,
        event: Event,
        expected: &[EventType],
    ) -> Option<Vec<Event>> {
        let mut buffer = self.events_buffer.lock().unwrap();
        buffer.entry(event.event_type().clone()).or_default().push_back(event);

        let mut collected = Vec::with_capacity(expected.len());
        for event_type in expected {
            if let Some(e) = buffer.get_mut(event_type).and_then(|events| events.pop_front()) {
                collected.push(e);
            }
        }

        if collected.len() == expected.len() {
            trace!(events = collected.len(), "join complete");
            return Some(collected);
        }

        // restore the popped events to the front, last popped first
        for e in collected.into_iter().rev() {
            buffer.entry(e.event_type().clone()).or_default().push_front(e);
        }
        None
    }

    /// Events currently buffered for `event_type`, oldest first.
    pub fn buffered_events(
        &self,
        event_type: &EventType,
    ) -> Vec<Event> {
        self.events_buffer.lock().unwrap().get(event_type).map(|events| events.iter().cloned().collect()).unwrap_or_default()
    }

    /// Record an event produced during the current manual step. No-op unless stepwise.
    pub fn record_holding(
        &self,
        event: Event,
    ) {
        if self.stepwise {
            self.holding_events.lock().unwrap().get_or_insert_with(Vec::new).push(event);
        }
    }

    /// Copy of the events recorded during the current manual step.
    pub fn holding_events(&self) -> Vec<Event> {
        self.holding_events.lock().unwrap().clone().unwrap_or_default()
    }

    /// Take the recorded events, leaving the buffer empty for the next manual step.
    pub fn take_holding_events(&self) -> Vec<Event> {
        self.holding_events.lock().unwrap().take().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        Vars,
        events::{Event, EventType},
        runtime::create_test_context,
    };

    fn types(names: &[&str]) -> Vec<EventType> {
        names.iter().map(|n| EventType::from(*n)).collect()
    }

    #[test]
    fn test_collect_two_types() {
        let ctx = create_test_context(false);
        let expected = types(&["a", "b"]);
        let e1 = Event::new("a", Vars::new().with("n", 1));
        let e2 = Event::new("b", Vars::new().with("n", 2));

        assert_eq!(ctx.collect_events(e1.clone(), &expected), None);
        assert_eq!(ctx.buffered_events(&"a".into()), vec![e1.clone()]);

        assert_eq!(ctx.collect_events(e2.clone(), &expected), Some(vec![e1, e2]));
        assert!(ctx.buffered_events(&"a".into()).is_empty());
        assert!(ctx.buffered_events(&"b".into()).is_empty());

        let e3 = Event::new("a", Vars::new().with("n", 3));
        assert_eq!(ctx.collect_events(e3.clone(), &expected), None);
        assert_eq!(ctx.buffered_events(&"a".into()), vec![e3]);
        assert!(ctx.buffered_events(&"b".into()).is_empty());
    }

    #[test]
    fn test_collect_result_in_expected_order() {
        let ctx = create_test_context(false);
        let expected = types(&["a", "b"]);
        let b = Event::empty("b");
        let a = Event::empty("a");

        assert_eq!(ctx.collect_events(b.clone(), &expected), None);
        assert_eq!(ctx.collect_events(a.clone(), &expected), Some(vec![a, b]));
    }

    #[test]
    fn test_failed_join_keeps_buffer_order() {
        let ctx = create_test_context(false);
        let expected = types(&["a", "b", "c"]);
        let a1 = Event::new("a", Vars::new().with("n", 1));
        let a2 = Event::new("a", Vars::new().with("n", 2));
        let b1 = Event::new("b", Vars::new().with("n", 1));

        assert_eq!(ctx.collect_events(a1.clone(), &expected), None);
        assert_eq!(ctx.collect_events(a2.clone(), &expected), None);
        assert_eq!(ctx.collect_events(b1.clone(), &expected), None);

        assert_eq!(ctx.buffered_events(&"a".into()), vec![a1.clone(), a2.clone()]);
        assert_eq!(ctx.buffered_events(&"b".into()), vec![b1.clone()]);

        let c1 = Event::empty("c");
        assert_eq!(ctx.collect_events(c1.clone(), &expected), Some(vec![a1, b1, c1]));
        assert_eq!(ctx.buffered_events(&"a".into()), vec![a2]);
    }

    #[test]
    fn test_collect_repeated_type() {
        let ctx = create_test_context(false);
        let expected = types(&["a", "a"]);
        let a1 = Event::new("a", Vars::new().with("n", 1));
        let a2 = Event::new("a", Vars::new().with("n", 2));

        assert_eq!(ctx.collect_events(a1.clone(), &expected), None);
        assert_eq!(ctx.buffered_events(&"a".into()), vec![a1.clone()]);
        assert_eq!(ctx.collect_events(a2.clone(), &expected), Some(vec![a1, a2]));
    }

    #[test]
    fn test_holding_only_in_stepwise() {
        let ctx = create_test_context(false);
        ctx.send(Event::empty("ping"), None).unwrap();
        assert!(ctx.holding_events().is_empty());

        let ctx = create_test_context(true);
        assert!(ctx.holding_events().is_empty());
        ctx.send(Event::empty("ping"), None).unwrap();
        ctx.send(Event::empty("pong"), Some("b")).unwrap();

        assert_eq!(ctx.holding_events(), vec![Event::empty("ping"), Event::empty("pong")]);
        // peeking does not clear
        assert_eq!(ctx.holding_events().len(), 2);

        assert_eq!(ctx.take_holding_events().len(), 2);
        assert!(ctx.holding_events().is_empty());
    }
}
