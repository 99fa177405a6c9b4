use tracing::warn;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Handle returned by [`EventBus::subscribe`]; pass it back to
/// [`EventBus::unsubscribe`] to deterministically remove the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

/// Ordered fan-out of typed events to subscriber callbacks.
///
/// Subscribers run in subscription order. One subscriber's failure never
/// prevents the rest of the same dispatch from running; errors are
/// collected and reported after the full fan-out completes.
pub struct EventBus<E> {
    next_id: u64,
    subscribers: Vec<(u64, Box<dyn FnMut(&E) -> HandlerResult + Send>)>,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, handler: F) -> Subscription
    where
        F: FnMut(&E) -> HandlerResult + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, Box::new(handler)));
        Subscription(id)
    }

    /// Returns whether the subscription was still present.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(id, _)| *id != subscription.0);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Dispatch to every subscriber, returning the failures alongside the
    /// subscription they came from.
    pub fn emit(&mut self, event: &E) -> Vec<(Subscription, Box<dyn std::error::Error + Send + Sync>)> {
        let mut failures = Vec::new();
        for (id, handler) in &mut self.subscribers {
            if let Err(error) = handler(event) {
                failures.push((Subscription(*id), error));
            }
        }
        for (subscription, error) in &failures {
            warn!(?subscription, "event subscriber failed: {error}");
        }
        failures
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
