//! Async-id correlation: out-of-order responses, persistent
//! subscriptions, unknown ids.

use opatomic_client::{Client, ReqErrReason, RequestBuilder};
use opatomic_harness::{PipeEnd, RecordingHandler, SimServer, pair};
use opatomic_proto::{Value, decode_value};

fn connect() -> (Client<PipeEnd, RecordingHandler>, SimServer) {
    let (client_end, server_end) = pair();
    (Client::new(client_end, RecordingHandler::new()), SimServer::new(server_end))
}

fn build(command: &str, arg: &str, context: u64) -> opatomic_client::Request {
    let mut builder = RequestBuilder::new();
    builder.add_str(command);
    builder.add_str(arg);
    let mut request = builder.finish().expect("valid request");
    request.set_context(context);
    request
}

#[test]
fn out_of_order_async_responses_match_their_requests() {
    let (client, mut server) = connect();

    let id1 = client.queue_async(build("ECHO", "one", 1), false);
    let id2 = client.queue_async(build("ECHO", "two", 2), false);
    let id3 = client.queue_async(build("ECHO", "three", 3), false);
    assert_eq!((id1, id2, id3), (1, 2, 3));
    client.send_requests();

    let requests = server.poll_requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].id_bytes, [b'D', 1]);

    // Respond 3, 1, 2.
    for index in [2usize, 0, 1] {
        let echo = Value::Array(requests[index].args.clone());
        server.respond(&requests[index], &echo);
    }
    client.parse_responses();

    let responses = client.handler().take_responses();
    assert_eq!(responses.len(), 3);
    let expected = [("three", 3u64, 3i64), ("one", 1, 1), ("two", 2, 2)];
    for (response, (arg, context, id)) in responses.iter().zip(expected) {
        assert_eq!(response.context(), context);
        assert_eq!(response.async_id(), Some(id));
        let (value, _) =
            decode_value(response.response().expect("received")).expect("decodes");
        assert_eq!(value, Value::Array(vec![Value::from(arg)]));
    }

    // All three one-shot entries were removed on delivery, so close has
    // nothing left to drain.
    client.close();
    assert!(client.handler().req_errs().is_empty());
}

#[test]
fn persistent_subscription_stays_registered() {
    let (client, mut server) = connect();

    let id = client.queue_async(build("SUBSCRIBE", "events", 11), true);
    assert_eq!(id, -1);
    client.send_requests();

    let requests = server.poll_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].id_bytes, [b'E', 1]);

    server.respond(&requests[0], &Value::from("event-a"));
    server.respond(&requests[0], &Value::from("event-b"));
    client.parse_responses();

    let responses = client.handler().take_responses();
    assert_eq!(responses.len(), 2);
    for response in &responses {
        assert_eq!(response.async_id(), Some(-1));
        assert_eq!(response.context(), 11);
    }

    // Unregister, then a late event falls through to unknown_async_id.
    let pending = client.remove_persistent(id).expect("still registered");
    assert_eq!(pending.context(), 11);
    server.respond(&requests[0], &Value::from("event-c"));
    client.parse_responses();
    assert_eq!(client.handler().response_count(), 0);
    assert_eq!(client.handler().unknown_responses().len(), 1);
    assert!(client.is_open(), "unknown ids are dropped, not fatal");
}

#[test]
fn unknown_async_id_is_reported_not_fatal() {
    let (client, mut server) = connect();

    // [result="ok", err=null, async id 99] with nothing queued.
    server.respond_raw(b"[S\x02okND\x63]");
    client.parse_responses();

    assert_eq!(client.handler().unknown_responses().len(), 1);
    assert!(client.handler().client_errs().is_empty());
    assert!(client.is_open());
}

#[test]
fn queue_async_assigns_fresh_ids_per_mode() {
    let (client, mut server) = connect();

    // One-shot and persistent requests draw from the same counter, on
    // opposite signs.
    assert_eq!(client.queue_async(build("ECHO", "a", 1), false), 1);
    assert_eq!(client.queue_async(build("SUBSCRIBE", "b", 2), true), -2);
    assert_eq!(client.queue_async(build("ECHO", "c", 3), false), 3);
    client.send_requests();
    assert_eq!(server.poll_requests().len(), 3);
    assert!(client.handler().req_errs().is_empty());

    client.close();
    let errs = client.handler().req_errs();
    assert_eq!(errs.len(), 3);
    assert!(errs.iter().all(|(_, reason)| *reason == ReqErrReason::Closed));
}
