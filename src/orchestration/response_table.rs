//! # Response Table
//!
//! Correlates capability responses with the step attempt waiting on them.
//! Waiters are keyed by `(capability, step_id)` and hold the id of the request
//! they sent; a response whose `in_reply_to` names an older request is stale
//! and discarded.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::messaging::Message;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResponseKey {
    capability: String,
    step_id: String,
}

impl ResponseKey {
    fn new(capability: &str, step_id: &str) -> Self {
        Self {
            capability: capability.to_string(),
            step_id: step_id.to_string(),
        }
    }
}

#[derive(Debug)]
struct PendingResponse {
    request_id: String,
    sender: oneshot::Sender<Message>,
}

/// Outcome of offering a response to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Answers a request nobody waits on any more
    Stale,
    /// No waiter for this capability and step
    Unmatched,
    /// Response lacks the correlation fields needed to route it
    Uncorrelated,
}

#[derive(Debug, Default)]
pub struct ResponseTable {
    waiters: Mutex<HashMap<ResponseKey, PendingResponse>>,
}

impl ResponseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the waiter for one step attempt, replacing any earlier attempt's waiter
    pub fn register(
        &self,
        capability: &str,
        step_id: &str,
        request_id: &str,
    ) -> oneshot::Receiver<Message> {
        let (sender, receiver) = oneshot::channel();
        let previous = self.waiters.lock().insert(
            ResponseKey::new(capability, step_id),
            PendingResponse {
                request_id: request_id.to_string(),
                sender,
            },
        );
        if let Some(previous) = previous {
            debug!(
                capability = capability,
                step_id = step_id,
                replaced_request_id = %previous.request_id,
                "Replaced response waiter"
            );
        }
        receiver
    }

    /// Route a response message to its waiter
    ///
    /// The capability is the response's sender and the step id its `correlation_id`.
    pub fn deliver(&self, response: Message) -> DeliveryOutcome {
        let (Some(step_id), Some(in_reply_to)) =
            (response.correlation_id.clone(), response.in_reply_to.clone())
        else {
            debug!(message_id = %response.id, "Response without correlation discarded");
            return DeliveryOutcome::Uncorrelated;
        };
        let key = ResponseKey::new(&response.sender, &step_id);

        let pending = {
            let mut waiters = self.waiters.lock();
            let expected = waiters.get(&key).map(|p| p.request_id.clone());
            match expected {
                None => None,
                Some(expected) if expected != in_reply_to => {
                    debug!(
                        capability = %key.capability,
                        step_id = %step_id,
                        in_reply_to = %in_reply_to,
                        expected = %expected,
                        "Stale response discarded"
                    );
                    return DeliveryOutcome::Stale;
                }
                Some(_) => waiters.remove(&key),
            }
        };

        match pending {
            Some(pending) => {
                if pending.sender.send(response).is_err() {
                    // Waiter gave up between lookup and send
                    return DeliveryOutcome::Stale;
                }
                DeliveryOutcome::Delivered
            }
            None => {
                debug!(capability = %key.capability, step_id = %step_id, "No waiter for response");
                DeliveryOutcome::Unmatched
            }
        }
    }

    /// Drop the waiter for a step, e.g. after its attempt timed out
    pub fn cancel(&self, capability: &str, step_id: &str) -> bool {
        self.waiters
            .lock()
            .remove(&ResponseKey::new(capability, step_id))
            .is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.waiters.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{CapabilityResponse, Payload};

    fn request(step_id: &str) -> Message {
        Message::request("orchestrator", "cad_agent", Payload::new()).with_correlation_id(step_id)
    }

    #[tokio::test]
    async fn test_delivers_matching_response() {
        let table = ResponseTable::new();
        let request = request("step-1");
        let receiver = table.register("cad_agent", "step-1", &request.id);

        let reply = request.reply(CapabilityResponse::success(Payload::new()).to_payload());
        assert_eq!(table.deliver(reply.clone()), DeliveryOutcome::Delivered);

        let received = receiver.await.unwrap();
        assert_eq!(received.id, reply.id);
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_reply_does_not_satisfy_retry() {
        let table = ResponseTable::new();
        let first = request("step-1");
        let _first_rx = table.register("cad_agent", "step-1", &first.id);

        let second = request("step-1");
        let mut second_rx = table.register("cad_agent", "step-1", &second.id);

        let late = first.reply(CapabilityResponse::failure("too late").to_payload());
        assert_eq!(table.deliver(late), DeliveryOutcome::Stale);
        assert!(second_rx.try_recv().is_err());

        let fresh = second.reply(CapabilityResponse::success(Payload::new()).to_payload());
        assert_eq!(table.deliver(fresh), DeliveryOutcome::Delivered);
        assert!(second_rx.await.is_ok());
    }

    #[test]
    fn test_unmatched_and_uncorrelated() {
        let table = ResponseTable::new();
        let reply = request("step-9").reply(Payload::new());
        assert_eq!(table.deliver(reply), DeliveryOutcome::Unmatched);

        let bare = Message::request("cad_agent", "orchestrator", Payload::new());
        assert_eq!(table.deliver(bare), DeliveryOutcome::Uncorrelated);
    }

    #[test]
    fn test_cancel_removes_waiter() {
        let table = ResponseTable::new();
        let _rx = table.register("slicer_agent", "step-2", "req-1");
        assert!(table.cancel("slicer_agent", "step-2"));
        assert!(!table.cancel("slicer_agent", "step-2"));
    }
}
