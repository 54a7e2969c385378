//! End-to-end call semantics over the mock transport: one test per
//! observable property of the response stream contract.

use std::sync::Arc;

use futures::FutureExt;

use callbridge::{
    CallArgs, CallClient, CallError, CallInstruction, CallStatus, ErrorCode, Metadata,
    RawCallError, ServiceSchema, StreamExt,
};
use callbridge_testkit::{init_tracing, request_channel, request_values, MockTransport};

#[derive(Debug, Clone, PartialEq)]
struct User {
    id: u32,
    name: String,
}

fn schema() -> ServiceSchema {
    ServiceSchema::new("UserService")
        .unary("GetUser")
        .server_streaming("WatchOrders")
        .client_streaming("UploadStats")
        .bidi_streaming("Chat")
}

fn client<V: Send + 'static>(transport: &Arc<MockTransport<V>>) -> CallClient<MockTransport<V>> {
    CallClient::new(schema(), transport.clone())
}

// ============================================================================
// Unary
// ============================================================================

#[tokio::test]
async fn unary_emits_its_single_value_then_completes() {
    init_tracing();
    let transport = MockTransport::<User>::new();
    let client = client(&transport);

    let request = User {
        id: 7,
        name: String::new(),
    };
    let mut stream = client.invoke("GetUser", CallArgs::Value(request)).unwrap();

    // Lazy start: nothing opens until the first poll.
    assert_eq!(transport.opened_count(), 0);
    assert!(stream.next().now_or_never().is_none());

    let opened = transport.take_call();
    assert_eq!(opened.method.full_name(), "UserService/GetUser");
    assert_eq!(opened.request.as_ref().map(|u| u.id), Some(7));

    opened
        .call
        .respond(User {
            id: 7,
            name: "Ada".into(),
        })
        .await;

    assert_eq!(
        stream.next().await,
        Some(Ok(User {
            id: 7,
            name: "Ada".into(),
        }))
    );
    assert_eq!(stream.next().await, None);
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn unary_never_emits_a_second_value() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("GetUser", CallArgs::Value(7)).unwrap();
    assert!(stream.next().now_or_never().is_none());

    let opened = transport.take_call();
    opened.call.data(1).await;
    opened.call.data(2).await;
    opened.call.end().await;

    assert_eq!(stream.next().await, Some(Ok(1)));
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn unary_completes_empty_when_call_ends_without_a_value() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("GetUser", CallArgs::Value(7)).unwrap();
    assert!(stream.next().now_or_never().is_none());

    transport.take_call().call.end().await;
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn unary_consumer_cancel_suppresses_the_cancellation_error() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("GetUser", CallArgs::Value(7)).unwrap();
    assert!(stream.next().now_or_never().is_none());
    let mut opened = transport.take_call();

    stream.cancel();
    match opened.call.next_instruction().await {
        Some(CallInstruction::Cancel) => {}
        other => panic!("expected cancel, got {other:?}"),
    }

    opened
        .call
        .error(RawCallError::with_code(
            ErrorCode::Cancelled as u32,
            "cancelled",
        ))
        .await;
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn unary_peer_cancellation_is_surfaced_as_an_error() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("GetUser", CallArgs::Value(7)).unwrap();
    assert!(stream.next().now_or_never().is_none());

    let opened = transport.take_call();
    opened
        .call
        .error(RawCallError::with_code(
            ErrorCode::Cancelled as u32,
            "call cancelled by server",
        ))
        .await;

    match stream.next().await {
        Some(Err(status)) => {
            assert_eq!(status.code, ErrorCode::Cancelled);
            assert!(status.is_cancellation());
        }
        other => panic!("expected cancellation error, got {other:?}"),
    }
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn unary_value_buffered_before_finish_is_not_emitted_after_cancel() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("GetUser", CallArgs::Value(7)).unwrap();
    assert!(stream.next().now_or_never().is_none());

    let mut opened = transport.take_call();
    opened.call.respond(7).await;

    stream.cancel();
    assert!(opened.call.try_next_instruction().is_none());
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn open_failure_arrives_as_the_terminal_error() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    transport.reject_next_open(CallError::Status(CallStatus::new(
        ErrorCode::Unavailable,
        "endpoint down",
    )));

    let mut stream = client.invoke("GetUser", CallArgs::Value(7)).unwrap();
    assert_eq!(
        stream.next().await,
        Some(Err(CallStatus::new(ErrorCode::Unavailable, "endpoint down")))
    );
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn metadata_reaches_the_transport() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let metadata = Metadata::new().with("authorization", "Bearer token-1");
    let mut stream = client
        .invoke_with_metadata("GetUser", CallArgs::Value(7), metadata)
        .unwrap();
    assert!(stream.next().now_or_never().is_none());

    let opened = transport.take_call();
    assert_eq!(opened.metadata.get("authorization"), Some("Bearer token-1"));
}

// ============================================================================
// Server streaming
// ============================================================================

#[tokio::test]
async fn server_streaming_forwards_values_in_order_then_completes() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("WatchOrders", CallArgs::Value(1)).unwrap();
    assert!(stream.next().now_or_never().is_none());

    let opened = transport.take_call();
    opened.call.data(10).await;
    opened.call.data(11).await;
    opened.call.end().await;

    assert_eq!(stream.next().await, Some(Ok(10)));
    assert_eq!(stream.next().await, Some(Ok(11)));
    assert_eq!(stream.next().await, None);
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn streaming_error_is_normalized_and_terminal() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("WatchOrders", CallArgs::Value(1)).unwrap();
    assert!(stream.next().now_or_never().is_none());

    let opened = transport.take_call();
    opened.call.data(10).await;
    opened
        .call
        .error(RawCallError::with_code(13, "upstream gone").details("transient"))
        .await;

    assert_eq!(stream.next().await, Some(Ok(10)));
    match stream.next().await {
        Some(Err(status)) => {
            assert_eq!(status.code, ErrorCode::Unavailable);
            assert_eq!(status.message, "upstream gone");
            assert_eq!(status.details.as_deref(), Some("transient"));
        }
        other => panic!("expected terminal error, got {other:?}"),
    }
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn peer_cancellation_is_surfaced_as_an_error() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("WatchOrders", CallArgs::Value(1)).unwrap();
    assert!(stream.next().now_or_never().is_none());

    let opened = transport.take_call();
    opened.call.data(10).await;
    opened
        .call
        .error(RawCallError::with_code(
            ErrorCode::Cancelled as u32,
            "call cancelled by server",
        ))
        .await;

    assert_eq!(stream.next().await, Some(Ok(10)));
    match stream.next().await {
        Some(Err(status)) => {
            assert_eq!(status.code, ErrorCode::Cancelled);
            assert!(status.is_cancellation());
        }
        other => panic!("expected cancellation error, got {other:?}"),
    }
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn consumer_cancel_issues_exactly_one_cancel_and_suppresses_the_error() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("WatchOrders", CallArgs::Value(1)).unwrap();
    assert!(stream.next().now_or_never().is_none());

    let mut opened = transport.take_call();
    opened.call.data(10).await;
    assert_eq!(stream.next().await, Some(Ok(10)));

    stream.cancel();
    stream.cancel();

    match opened.call.next_instruction().await {
        Some(CallInstruction::Cancel) => {}
        other => panic!("expected cancel, got {other:?}"),
    }
    assert!(opened.call.try_next_instruction().is_none());

    // Late data is dropped; the cancellation error completes cleanly.
    opened.call.data(11).await;
    opened
        .call
        .error(RawCallError::with_code(
            ErrorCode::Cancelled as u32,
            "call cancelled",
        ))
        .await;
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn cancel_after_finish_is_a_silent_noop() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("WatchOrders", CallArgs::Value(1)).unwrap();
    assert!(stream.next().now_or_never().is_none());

    let mut opened = transport.take_call();
    opened.call.end().await;

    stream.cancel();
    assert!(opened.call.try_next_instruction().is_none());
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn streaming_value_buffered_before_finish_is_not_emitted_after_cancel() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("WatchOrders", CallArgs::Value(1)).unwrap();
    assert!(stream.next().now_or_never().is_none());

    let mut opened = transport.take_call();
    opened.call.data(10).await;
    opened.call.end().await;

    stream.cancel();
    assert!(opened.call.try_next_instruction().is_none());
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn dropping_the_stream_cancels_an_inflight_call() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client.invoke("WatchOrders", CallArgs::Value(1)).unwrap();
    assert!(stream.next().now_or_never().is_none());
    let mut opened = transport.take_call();

    drop(stream);
    match opened.call.next_instruction().await {
        Some(CallInstruction::Cancel) => {}
        other => panic!("expected cancel, got {other:?}"),
    }
}

// ============================================================================
// Client streaming and bidi
// ============================================================================

#[tokio::test]
async fn client_streaming_opens_once_and_forwards_every_value() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let mut stream = client
        .invoke("UploadStats", CallArgs::Stream(request_values(vec![1, 2, 3])))
        .unwrap();
    assert!(stream.next().now_or_never().is_none());
    assert_eq!(transport.opened_count(), 1);

    let mut opened = transport.take_call();
    assert!(opened.request.is_none());

    for expected in [1, 2, 3] {
        match opened.call.next_instruction().await {
            Some(CallInstruction::Write(value)) => assert_eq!(value, expected),
            other => panic!("expected write, got {other:?}"),
        }
    }
    match opened.call.next_instruction().await {
        Some(CallInstruction::CloseSend) => {}
        other => panic!("expected close-send, got {other:?}"),
    }
    assert!(opened.call.try_next_instruction().is_none());
    assert_eq!(transport.opened_count(), 0);

    opened.call.respond(6).await;
    assert_eq!(stream.next().await, Some(Ok(6)));
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn client_streaming_upstream_error_aborts_the_call() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let (tx, rx) = request_channel();
    let mut stream = client.invoke("UploadStats", CallArgs::Stream(rx)).unwrap();
    assert!(stream.next().now_or_never().is_none());
    let mut opened = transport.take_call();

    tx.send(Ok(1)).await.unwrap();
    tx.send(Err(CallStatus::new(ErrorCode::ResourceExhausted, "disk full")))
        .await
        .unwrap();

    assert_eq!(
        stream.next().await,
        Some(Err(CallStatus::new(
            ErrorCode::ResourceExhausted,
            "disk full"
        )))
    );
    assert_eq!(stream.next().await, None);

    match opened.call.next_instruction().await {
        Some(CallInstruction::Write(1)) => {}
        other => panic!("expected write, got {other:?}"),
    }
    match opened.call.next_instruction().await {
        Some(CallInstruction::Fail(status)) => {
            assert_eq!(status.code, ErrorCode::ResourceExhausted)
        }
        other => panic!("expected fail, got {other:?}"),
    }
}

#[tokio::test]
async fn bidi_upstream_error_aborts_the_call_and_surfaces_once() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    let (tx, rx) = request_channel();
    let mut stream = client.invoke("Chat", CallArgs::Stream(rx)).unwrap();
    assert!(stream.next().now_or_never().is_none());
    let mut opened = transport.take_call();

    tx.send(Ok(5)).await.unwrap();
    tx.send(Err(CallStatus::new(ErrorCode::Aborted, "sensor failed")))
        .await
        .unwrap();

    assert_eq!(
        stream.next().await,
        Some(Err(CallStatus::new(ErrorCode::Aborted, "sensor failed")))
    );
    assert_eq!(stream.next().await, None);

    match opened.call.next_instruction().await {
        Some(CallInstruction::Write(5)) => {}
        other => panic!("expected write, got {other:?}"),
    }
    match opened.call.next_instruction().await {
        Some(CallInstruction::Fail(status)) => assert_eq!(status.code, ErrorCode::Aborted),
        other => panic!("expected fail, got {other:?}"),
    }
}

// ============================================================================
// Dispatch errors
// ============================================================================

#[tokio::test]
async fn method_not_found_is_synchronous() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    match client.invoke("Missing", CallArgs::Value(0)) {
        Err(CallError::MethodNotFound { method }) => assert_eq!(method, "UserService/Missing"),
        Ok(_) => panic!("expected an error"),
        Err(other) => panic!("unexpected: {other}"),
    }
    assert_eq!(transport.opened_count(), 0);
}

#[tokio::test]
async fn stream_args_require_a_streaming_request_side() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    match client.invoke("GetUser", CallArgs::Stream(request_values(vec![1]))) {
        Err(CallError::InvalidRequest { method, .. }) => assert_eq!(method, "UserService/GetUser"),
        Ok(_) => panic!("expected an error"),
        Err(other) => panic!("unexpected: {other}"),
    }
    assert_eq!(transport.opened_count(), 0);
}

#[tokio::test]
async fn publish_and_subscribe_fail_fast() {
    init_tracing();
    let transport = MockTransport::<u32>::new();
    let client = client(&transport);

    match client.publish("orders", 1) {
        Err(CallError::Unsupported { operation }) => assert_eq!(operation, "publish"),
        other => panic!("unexpected: {other:?}"),
    }
    let error = client.subscribe("orders").unwrap_err();
    assert!(matches!(
        error,
        CallError::Unsupported {
            operation: "subscribe"
        }
    ));
    assert!(error.to_string().contains("not supported"));
}
