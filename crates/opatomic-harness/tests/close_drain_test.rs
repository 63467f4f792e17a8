//! Shutdown semantics: close drains every tracked request exactly once,
//! and wire violations are fatal.

use opatomic_client::{Client, ClientError, ReqErrReason, RequestBuilder};
use opatomic_harness::{PipeEnd, RecordingHandler, SimServer, pair};
use opatomic_proto::ProtocolError;

fn connect() -> (Client<PipeEnd, RecordingHandler>, SimServer) {
    let (client_end, server_end) = pair();
    (Client::new(client_end, RecordingHandler::new()), SimServer::new(server_end))
}

fn build(command: &str, context: u64) -> opatomic_client::Request {
    let mut builder = RequestBuilder::new();
    builder.add_str(command);
    let mut request = builder.finish().expect("valid request");
    request.set_context(context);
    request
}

#[test]
fn close_drains_every_tracked_request_exactly_once() {
    let (client, mut server) = connect();

    // Sent and awaiting its ordered reply.
    client.queue_request(build("PING", 1));
    // Sent async one-shot and persistent, awaiting replies.
    client.queue_async(build("FETCH", 3), false);
    client.queue_async(build("SUBSCRIBE", 4), true);
    client.send_requests();
    assert_eq!(server.poll_requests().len(), 3);

    // Still sitting in the to-send queue.
    client.queue_request(build("LATER", 2));

    client.close();
    assert!(!client.is_open());

    let mut contexts: Vec<u64> = client
        .handler()
        .req_errs()
        .iter()
        .map(|&(context, reason)| {
            assert_eq!(reason, ReqErrReason::Closed);
            context
        })
        .collect();
    contexts.sort_unstable();
    assert_eq!(contexts, vec![1, 2, 3, 4], "each request errored exactly once");

    // Queuing after close reports Closed immediately.
    client.queue_request(build("TOOLATE", 9));
    assert_eq!(client.handler().req_errs().len(), 5);
    assert_eq!(client.handler().req_errs()[4], (9, ReqErrReason::Closed));

    // Close is idempotent.
    client.close();
    assert_eq!(client.handler().req_errs().len(), 5);
}

#[test]
fn extra_response_is_fatal() {
    let (client, mut server) = connect();

    server.respond_raw(b"[S\x04pongN]");
    client.parse_responses();

    assert_eq!(client.handler().client_errs(), vec![ClientError::ExtraResponse]);
    assert!(!client.is_open());
    assert_eq!(client.last_error(), Some(ClientError::ExtraResponse));

    // Further queuing reports Closed through req_err.
    client.queue_request(build("PING", 1));
    assert_eq!(client.handler().req_errs(), vec![(1, ReqErrReason::Closed)]);
}

#[test]
fn malformed_response_is_fatal() {
    let (client, mut server) = connect();

    client.queue_request(build("PING", 1));
    client.send_requests();
    server.poll_requests();
    server.respond_raw(b"x");
    client.parse_responses();

    assert_eq!(
        client.handler().client_errs(),
        vec![ClientError::Protocol(ProtocolError::UnknownTag(b'x'))]
    );
    assert!(!client.is_open());
}

#[test]
fn error_with_nonnull_result_is_fatal() {
    let (client, mut server) = connect();

    client.queue_request(build("PING", 1));
    client.send_requests();
    server.poll_requests();
    // Both result and err carry data: contract violation.
    server.respond_raw(b"[S\x02ok[D\x01S\x03bad]]");
    client.parse_responses();

    assert_eq!(client.handler().client_errs().len(), 1);
    assert!(matches!(
        client.handler().client_errs()[0],
        ClientError::Protocol(ProtocolError::Malformed(_))
    ));
    assert!(!client.is_open());
}
