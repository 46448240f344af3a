use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use fabflow_core::messaging::{Message, MessagePriority, MessageQueue, Payload};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn mixed_priority_batch(size: usize) -> Vec<Message> {
    (0..size)
        .map(|i| {
            Message::request("orchestrator", "cad_agent", Payload::new())
                .with_priority(MessagePriority::ALL[i % MessagePriority::ALL.len()])
        })
        .collect()
}

fn benchmark_send(c: &mut Criterion) {
    let rt = runtime();
    c.bench_function("queue_send_1000", |b| {
        b.iter_batched(
            || (MessageQueue::in_memory(None), mixed_priority_batch(1000)),
            |(queue, batch)| {
                rt.block_on(async {
                    for message in batch {
                        queue.send(message).await.unwrap();
                    }
                    black_box(queue.size().await)
                })
            },
            BatchSize::SmallInput,
        )
    });
}

fn benchmark_send_receive_ack(c: &mut Criterion) {
    let rt = runtime();
    c.bench_function("queue_send_receive_ack_1000", |b| {
        b.iter_batched(
            || (MessageQueue::in_memory(None), mixed_priority_batch(1000)),
            |(queue, batch)| {
                rt.block_on(async {
                    for message in batch {
                        queue.send(message).await.unwrap();
                    }
                    while let Some(message) = queue.receive(Duration::ZERO).await.unwrap() {
                        queue.acknowledge(&message.id).await.unwrap();
                    }
                    black_box(queue.stats().await)
                })
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, benchmark_send, benchmark_send_receive_ack);
criterion_main!(benches);
