//! Retry-aware operation execution.
//!
//! # Responsibilities
//! - Run a caller's directory operation against the live session
//! - Feed failures into the manager's failure path
//! - Retry Transient failures after the reconnect, up to `max_retries`
//!
//! # Design Decisions
//! - The session is lent to the operation for the duration of one call, with
//!   the manager lock held, so operations never overlap
//! - Operations are closures returning a boxed future borrowing the session;
//!   the borrow cannot escape the call

use futures_util::future::BoxFuture;
use std::fmt::Display;

use crate::connection::events::FailureOrigin;
use crate::connection::manager::{ConnectionManager, Inner, Shared};
use crate::connection::session::DirectoryConnector;
use crate::error::{ConnectionError, ConnectionResult};
use crate::resilience::timeouts::with_deadline;

enum OperationFailure {
    Failed(String),
    Closed,
}

impl<C: DirectoryConnector> ConnectionManager<C> {
    /// Run `operation` with the live session.
    ///
    /// Opens the session when disconnected and waits out a reconnect in
    /// progress. A Transient failure hands the session to the reconnect
    /// cycle and the operation is retried once the session is back, at most
    /// `max_retries` times. Authentication failures are never retried.
    ///
    /// ```ignore
    /// let entry = manager
    ///     .execute(|session| Box::pin(session.read_entry("cn=admin,dc=example,dc=com")))
    ///     .await?;
    /// ```
    pub async fn execute<T, E, F>(&self, mut operation: F) -> ConnectionResult<T>
    where
        F: for<'s> FnMut(&'s mut C::Session) -> BoxFuture<'s, Result<T, E>> + Send,
        T: Send,
        E: Display + Send,
    {
        let shared = &self.shared;
        let max_retries = shared.config.retry.max_retries;
        let mut retried = 0u32;

        loop {
            let mut inner = shared.acquire().await?;

            let message = match shared.run_operation(&mut inner, &mut operation).await {
                Ok(value) => return Ok(value),
                Err(OperationFailure::Closed) => return Err(ConnectionError::ManagerClosed),
                Err(OperationFailure::Failed(message)) => message,
            };

            let error = shared
                .handle_failure(&mut inner, FailureOrigin::Operation, message)
                .await;
            if error.is_terminal() || retried >= max_retries {
                return Err(error);
            }

            retried += 1;
            tracing::debug!(
                retry = retried,
                max_retries,
                error = %error,
                "Retrying operation after reconnect"
            );
        }
    }
}

impl<C: DirectoryConnector> Shared<C> {
    async fn run_operation<T, E, F>(
        &self,
        inner: &mut Inner<C::Session>,
        operation: &mut F,
    ) -> Result<T, OperationFailure>
    where
        F: for<'s> FnMut(&'s mut C::Session) -> BoxFuture<'s, Result<T, E>>,
        E: Display,
    {
        let Some(session) = inner.session.as_mut() else {
            tracing::error!(state = %inner.state, "No live session while connected");
            return Err(OperationFailure::Failed("no live session".to_string()));
        };

        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            result = with_deadline("operation", self.config.timeouts.operation, operation(session)) => {
                result.map_err(OperationFailure::Failed)
            }
            _ = shutdown.recv() => Err(OperationFailure::Closed),
        }
    }
}
