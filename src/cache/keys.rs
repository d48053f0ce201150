//! Cache key builders
//!
//! Keys are namespaced `notchpay:{kind}:...` so the gateway can share a Redis
//! instance with the host application.

const NAMESPACE: &str = "notchpay";

/// Marker for a fully processed webhook delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryKey<'a> {
    pub event: &'a str,
    pub reference: &'a str,
}

impl<'a> DeliveryKey<'a> {
    pub fn new(event: &'a str, reference: &'a str) -> Self {
        Self { event, reference }
    }

    pub fn pattern() -> String {
        format!("{}:webhook:*", NAMESPACE)
    }
}

impl std::fmt::Display for DeliveryKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:webhook:{}:{}", NAMESPACE, self.event, self.reference)
    }
}
