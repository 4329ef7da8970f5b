/// Whether a failed operation is worth retrying from the caller's side.
/// Carried on every `ErrorCode`; the HTTP layer advertises it through the
/// public error body and a `Retry-After` header on transient failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryClass {
    /// Retrying cannot change the outcome (validation, auth, missing
    /// resources).
    None,
    /// The condition clears on its own (quota windows, provider outages);
    /// safe to retry after a backoff.
    Transient,
    /// Needs operator attention before a retry can succeed.
    Permanent,
}

impl RetryClass {
    pub const fn is_transient(self) -> bool {
        matches!(self, RetryClass::Transient)
    }
}
