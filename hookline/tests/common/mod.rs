//! Shared helpers for integration tests.

#![allow(dead_code)]

use futures::StreamExt;
use hookline::{BusClient, Coordinator, ErrorReply, InMemoryBus, MessageStream, RawMessage, codec};
use std::time::Duration;

/// Start `coordinator` on a fresh in-memory bus.
pub async fn start(coordinator: &Coordinator) -> InMemoryBus {
    let bus = InMemoryBus::new();
    coordinator.start(&bus).await.unwrap();
    bus
}

/// Poll `condition` until it holds or a second passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

/// Subscribe to a reply subject.
pub async fn inbox(bus: &InMemoryBus, subject: &str) -> MessageStream {
    bus.subscribe(subject, &Default::default()).await.unwrap()
}

/// Next message on `stream`, if one arrives soon.
pub async fn next(stream: &mut MessageStream) -> Option<RawMessage> {
    tokio::time::timeout(Duration::from_millis(300), stream.next())
        .await
        .ok()
        .flatten()
}

/// Next message on `stream`, decoded as an error reply.
pub async fn next_error(stream: &mut MessageStream) -> ErrorReply {
    let message = next(stream).await.expect("no reply received");
    codec::decode_as(&message.payload).unwrap()
}

/// Publish `payload` to `subject` with `reply` as the reply target.
pub async fn send(bus: &InMemoryBus, subject: &str, reply: &str, payload: &[u8]) {
    bus.publish_with_reply(subject, reply, bytes::Bytes::copy_from_slice(payload))
        .await
        .unwrap();
}
