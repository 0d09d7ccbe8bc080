//! Two-step writes across services that share no transaction.
//!
//! The primary write has already committed when a [`Compensation`] is built.
//! If the dependent write fails, the compensation is spawned once and left to
//! finish on its own; its failure is only logged.

use std::future::Future;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::backend::ServiceError;

pub struct Compensation {
    label: String,
    undo: BoxFuture<'static, Result<(), ServiceError>>,
}

impl Compensation {
    pub fn new<F>(label: impl Into<String>, undo: F) -> Self
    where
        F: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            undo: Box::pin(undo),
        }
    }

    /// Spawn the undo. Never retried; the caller does not wait for it.
    pub fn fire(self) -> JoinHandle<()> {
        let Compensation { label, undo } = self;
        tracing::warn!("dependent write failed, compensating: {}", label);
        tokio::spawn(async move {
            match undo.await {
                Ok(()) => tracing::info!("compensation completed: {}", label),
                Err(e) => tracing::error!(
                    "compensation failed, manual cleanup required: {}: {}",
                    label,
                    e
                ),
            }
        })
    }
}

/// Run the dependent write; on failure fire `compensation` and hand back the
/// dependent error unchanged. On success the compensation is dropped unrun.
pub async fn run_dependent<T, E, F>(dependent: F, compensation: Compensation) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match dependent.await {
        Ok(value) => Ok(value),
        Err(err) => {
            compensation.fire();
            Err(err)
        }
    }
}
