/// Classification for retry policy.
///
/// Used by price discovery to decide what to do after a provider error.
///
/// # Behavior Summary
///
/// | Class | Retry same provider? | Try next provider? | Record circuit breaker failure? |
/// |-------|----------------------|--------------------|--------------------------------|
/// | `Never` | No | No | No |
/// | `WithBackoff` | Yes | Yes, once exhausted | Yes |
/// | `NextProvider` | No | Yes | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Terminal failure, nothing else to try.
    Never,

    /// Transient failure (timeout, 5xx, 429, connection reset).
    /// Retried with exponential backoff; counts against the circuit breaker.
    WithBackoff,

    /// This provider cannot serve the request but another one might.
    NextProvider,
}
