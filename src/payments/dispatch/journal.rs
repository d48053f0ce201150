use async_trait::async_trait;

/// Record of webhook deliveries that were fully processed.
///
/// Lets a retried delivery be acknowledged without touching the order store.
/// It is an optimization only: implementations may forget, and a failure to
/// read must report "not delivered".
#[async_trait]
pub trait DeliveryJournal: Send + Sync {
    async fn is_delivered(&self, event: &str, reference: &str) -> bool;

    async fn mark_delivered(&self, event: &str, reference: &str);
}

/// Journal that remembers nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJournal;

#[async_trait]
impl DeliveryJournal for NoJournal {
    async fn is_delivered(&self, _event: &str, _reference: &str) -> bool {
        false
    }

    async fn mark_delivered(&self, _event: &str, _reference: &str) {}
}
