//! Caller-supplied cancellation and deadline
//!
//! A [`Context`] travels through every network-calling operation. Wrapping a
//! future with [`Context::run`] races it against the cancellation token and
//! the optional deadline, so a fired signal returns promptly instead of
//! waiting for the registry or the secret store.

use crate::error::Error;
use std::future::Future;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped an operation
///
/// Implements `std::error::Error` so it can travel inside `anyhow` chains and
/// be recovered with `downcast_ref`.
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl Interrupt {
    /// Convert into the matching error kind for `image` at `stage`
    pub fn into_error(self, image: impl Into<String>, stage: impl Into<String>) -> Error {
        match self {
            Interrupt::Cancelled => Error::Cancelled {
                image: image.into(),
                stage: stage.into(),
            },
            Interrupt::DeadlineExceeded => Error::DeadlineExceeded {
                image: image.into(),
                stage: stage.into(),
            },
        }
    }
}

/// Cancellation token plus optional deadline
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Build a context driven by an existing cancellation token
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child context that also expires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child context that also expires at `deadline`
    ///
    /// The earlier of the parent's and the new deadline wins. Cancelling the
    /// parent cancels the child, not the other way round.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and every context derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The token backing this context
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some` once the context has been cancelled or its deadline has passed
    pub fn err(&self) -> Option<Interrupt> {
        if self.token.is_cancelled() {
            Some(Interrupt::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(Interrupt::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Drive `fut` to completion unless the context fires first
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        if let Some(interrupt) = self.err() {
            return Err(interrupt);
        }

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Interrupt::Cancelled),
            _ = expired => Err(Interrupt::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
