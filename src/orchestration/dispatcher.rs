//! # Capability Dispatcher
//!
//! Background consumer that takes request messages off the queue, runs the
//! registered handler for the receiver on its own task, acknowledges the
//! request, and hands the correlated reply to the [`ResponseTable`].
//!
//! A handler error or panic negatively acknowledges the request so the queue
//! redelivers it; once the message's retry budget is gone the waiting step gets
//! a failure reply instead of waiting out its timeout.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::response_table::{DeliveryOutcome, ResponseTable};
use crate::messaging::{CapabilityResponse, Message, MessageQueue, MessageStatus, MessageType};
use crate::registry::CapabilityRegistry;

#[derive(Debug, Clone)]
pub struct CapabilityDispatcher {
    queue: Arc<MessageQueue>,
    registry: CapabilityRegistry,
    responses: Arc<ResponseTable>,
    poll_timeout: Duration,
}

/// Running dispatcher; dropping it leaves the task running until the runtime stops
#[derive(Debug)]
pub struct DispatcherHandle {
    shutdown_sender: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal shutdown and wait for the receive loop to exit
    ///
    /// Handler tasks already spawned run to completion on their own.
    pub async fn shutdown(self) {
        let _ = self.shutdown_sender.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Dispatcher task ended abnormally");
        }
    }
}

impl CapabilityDispatcher {
    pub fn new(
        queue: Arc<MessageQueue>,
        registry: CapabilityRegistry,
        responses: Arc<ResponseTable>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            registry,
            responses,
            poll_timeout,
        }
    }

    /// Spawn the receive loop
    pub fn start(self) -> DispatcherHandle {
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_receiver));
        info!("🚀 Capability dispatcher started");
        DispatcherHandle {
            shutdown_sender,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                received = self.queue.receive(self.poll_timeout) => match received {
                    Ok(Some(message)) => self.route(message).await,
                    Ok(None) => {}
                    Err(e) => {
                        error!(error = %e, "Queue receive failed");
                        tokio::time::sleep(self.poll_timeout).await;
                    }
                },
            }
        }
        info!("🛑 Capability dispatcher stopped");
    }

    async fn route(&self, message: Message) {
        match message.message_type {
            MessageType::Request => self.dispatch_request(message).await,
            MessageType::Response => {
                let message_id = message.id.clone();
                let outcome = self.responses.deliver(message);
                debug!(message_id = %message_id, outcome = ?outcome, "Queued response routed");
                self.acknowledge(&message_id).await;
            }
            MessageType::Status => {
                debug!(message_id = %message.id, sender = %message.sender, "Status message consumed");
                self.acknowledge(&message.id).await;
            }
        }
    }

    async fn dispatch_request(&self, message: Message) {
        let Some(handler) = self.registry.get(&message.receiver) else {
            warn!(
                message_id = %message.id,
                capability = %message.receiver,
                "No handler registered, dropping request"
            );
            let reason = format!("Capability '{}' is not registered", message.receiver);
            if let Err(e) = self.queue.reject(&message.id, false).await {
                warn!(message_id = %message.id, error = %e, "Reject failed");
            }
            self.reply_failure(&message, reason);
            return;
        };

        let dispatcher = self.clone();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(handler.handle(&message)).catch_unwind().await;
            let result = match outcome {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("capability handler panicked")),
            };

            match result {
                Ok(response) => {
                    dispatcher.acknowledge(&message.id).await;
                    let reply = message.reply(response.to_payload());
                    if dispatcher.responses.deliver(reply) != DeliveryOutcome::Delivered {
                        debug!(message_id = %message.id, "Reply had no waiting step");
                    }
                }
                Err(err) => dispatcher.handle_transport_error(&message, err).await,
            }
        });
    }

    async fn handle_transport_error(&self, message: &Message, err: anyhow::Error) {
        warn!(
            message_id = %message.id,
            capability = %message.receiver,
            retry_count = message.retry_count,
            error = %err,
            "Capability handler error, rejecting request"
        );

        match self.queue.reject(&message.id, true).await {
            Ok(MessageStatus::Failed) => {
                self.reply_failure(message, format!("capability error: {err:#}"));
            }
            Ok(status) => {
                debug!(message_id = %message.id, status = %status, "Request requeued");
            }
            Err(e) => warn!(message_id = %message.id, error = %e, "Reject failed"),
        }
    }

    fn reply_failure(&self, request: &Message, reason: String) {
        let reply = request.reply(CapabilityResponse::failure(reason).to_payload());
        self.responses.deliver(reply);
    }

    async fn acknowledge(&self, message_id: &str) {
        if let Err(e) = self.queue.acknowledge(message_id).await {
            warn!(message_id = message_id, error = %e, "Acknowledge failed");
        }
    }
}
