use crate::domain::jobs::JobDispatcherApi;
use crate::error::{AppError, AppResult};
use crate::infrastructure::config::MAX_WORKERS;
use crate::infrastructure::messaging::MessageBus;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Feeds messages from one subject to the job dispatcher.
pub struct WorkerController {
    bus: Arc<dyn MessageBus>,
    dispatcher: Arc<dyn JobDispatcherApi>,
    subject: String,
    concurrency: usize,
}

impl WorkerController {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        dispatcher: Arc<dyn JobDispatcherApi>,
        subject: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            bus,
            dispatcher,
            subject: subject.into(),
            concurrency: concurrency.clamp(1, MAX_WORKERS),
        }
    }

    /// Handle messages until `cancel` fires or the subscription ends, then
    /// wait for in-flight handlers. Returns the number of messages received.
    pub async fn run(&self, cancel: CancellationToken) -> AppResult<usize> {
        let mut subscription = self.bus.subscribe(&self.subject).await.map_err(|e| {
            AppError::Internal(format!("failed to subscribe to {}: {}", self.subject, e))
        })?;

        tracing::info!(
            subject = %self.subject,
            concurrency = self.concurrency,
            "Worker listening"
        );

        let slots = Arc::new(Semaphore::new(self.concurrency));
        let mut handlers = JoinSet::new();
        let mut received = 0;

        loop {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = subscription.next() => match message {
                    Some(message) => message,
                    None => {
                        tracing::info!(subject = %self.subject, "Subscription closed");
                        break;
                    }
                },
            };
            received += 1;

            let dispatcher = self.dispatcher.clone();
            handlers.spawn(async move {
                let _permit = permit;
                // Failures are logged by the dispatcher
                let _ = dispatcher.handle_message(&message).await;
            });

            // Reap finished handlers so the set stays small
            while handlers.try_join_next().is_some() {}
        }

        if !handlers.is_empty() {
            tracing::info!(in_flight = handlers.len(), "Draining in-flight jobs");
        }
        while let Some(joined) = handlers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Job handler panicked");
            }
        }

        tracing::info!(subject = %self.subject, received = received, "Worker stopped");
        Ok(received)
    }
}
