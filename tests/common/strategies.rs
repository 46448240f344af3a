use fabflow_core::messaging::MessagePriority;
use proptest::prelude::*;

/// Strategy for generating any priority class
pub fn priority_strategy() -> impl Strategy<Value = MessagePriority> {
    prop_oneof![
        Just(MessagePriority::Critical),
        Just(MessagePriority::High),
        Just(MessagePriority::Normal),
        Just(MessagePriority::Low),
        Just(MessagePriority::Background),
    ]
}

/// Strategy for generating a batch of priorities to enqueue in order
pub fn priority_batch_strategy() -> impl Strategy<Value = Vec<MessagePriority>> {
    prop::collection::vec(priority_strategy(), 1..40)
}

/// Strategy for generating capability names
pub fn capability_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,31}"
}

/// Strategy for generating a sequence of ack (true) / requeueing nack (false) decisions
pub fn settlement_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..20)
}
