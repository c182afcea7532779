use tokio_util::sync::CancellationToken;

/// Context provided to a task action on every invocation.
///
/// The token is a child of the scheduler's root token. It is cancelled only
/// when a stop is forced (deadline exceeded or interrupted), never by a
/// regular graceful stop, which lets the current invocation finish.
#[derive(Clone, Debug)]
pub struct JobContext {
    /// Token to check for forced shutdown requests.
    pub cancellation_token: CancellationToken,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken) -> Self {
        Self { cancellation_token }
    }

    /// Check if cancellation has been requested.
    ///
    /// Long-running actions should check this between units of work
    /// and return early with `JobError::Cancelled` if true.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.cancellation_token.cancelled().await
    }
}
