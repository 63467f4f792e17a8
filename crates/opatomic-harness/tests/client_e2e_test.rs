//! End-to-end request/response scenarios over the in-memory pipe.

use opatomic_client::{Client, RequestBuilder};
use opatomic_harness::{PipeEnd, RecordingHandler, SimServer, pair};
use opatomic_proto::{Value, decode_value};

fn connect() -> (Client<PipeEnd, RecordingHandler>, SimServer) {
    let (client_end, server_end) = pair();
    (Client::new(client_end, RecordingHandler::new()), SimServer::new(server_end))
}

fn build(command: &str, args: &[&str], context: u64) -> opatomic_client::Request {
    let mut builder = RequestBuilder::new();
    builder.add_str(command);
    for arg in args {
        builder.add_str(arg);
    }
    let mut request = builder.finish().expect("valid request");
    request.set_context(context);
    request
}

#[test]
fn ping_round_trip() {
    let (client, mut server) = connect();

    client.queue_request(build("PING", &[], 7));
    client.send_requests();
    assert_eq!(client.handler().sent_contexts(), vec![7]);

    let handled = server.auto_reply();
    assert_eq!(handled.len(), 1);
    assert_eq!(handled[0].command, "PING");
    assert_eq!(handled[0].id_bytes, b"N");
    assert!(handled[0].args.is_empty());
    assert!(handled[0].expects_response);

    client.parse_responses();
    let responses = client.handler().take_responses();
    assert_eq!(responses.len(), 1);
    let response = &responses[0];
    assert_eq!(response.context(), 7);
    assert_eq!(response.response_is_err(), Some(false));
    let value_bytes = response.response().expect("response received");
    assert_eq!(value_bytes.first(), Some(&b'S'));
    let (value, _) = decode_value(value_bytes).expect("decodes");
    assert_eq!(value, Value::from("pong"));
}

#[test]
fn synchronous_responses_pair_in_fifo_order() {
    let (client, mut server) = connect();

    client.queue_request(build("ECHO", &["first"], 1));
    client.queue_request(build("ECHO", &["second"], 2));
    client.send_requests();

    server.auto_reply();
    client.parse_responses();

    let responses = client.handler().take_responses();
    assert_eq!(responses.len(), 2);
    for (response, (context, arg)) in
        responses.iter().zip([(1u64, "first"), (2u64, "second")])
    {
        assert_eq!(response.context(), context);
        let (value, _) =
            decode_value(response.response().expect("received")).expect("decodes");
        assert_eq!(value, Value::Array(vec![Value::from(arg)]));
    }
}

#[test]
fn partial_writes_park_and_resume() {
    let (client_end, server_end) = pair();
    let client = Client::new(client_end.clone(), RecordingHandler::new());
    let mut server = SimServer::new(server_end);

    let request = build("ECHO", &["a longer argument to split across writes"], 9);
    let total = request.request_bytes().len();
    client_end.set_write_budget(5);
    client.queue_request(request);
    client.send_requests();

    // Five bytes went out; the request is parked in the partial-send slot.
    assert!(server.poll_requests().is_empty());
    assert!(client.handler().sent_contexts().is_empty());

    // Drip the rest of the budget a few bytes at a time.
    let mut remaining = total - 5;
    while remaining > 0 {
        let grant = remaining.min(7);
        client_end.set_write_budget(grant);
        client.send_requests();
        remaining -= grant;
    }
    assert_eq!(client.handler().sent_contexts(), vec![9]);

    let handled = server.auto_reply();
    assert_eq!(handled.len(), 1);
    client.parse_responses();
    assert_eq!(client.handler().response_count(), 1);
}

#[test]
fn chunked_response_delivery() {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    let (client_end, server_end) = pair();
    let client = Client::new(client_end.clone(), RecordingHandler::new());
    let mut server = SimServer::new(server_end);

    client.queue_request(build("ECHO", &["payload that spans several reads"], 3));
    client.send_requests();
    server.auto_reply();

    // Deliver the response in small random reads.
    let mut rng = StdRng::seed_from_u64(0x09A7_E571);
    while client.handler().response_count() == 0 {
        client_end.set_max_io(rng.gen_range(1..5));
        client.parse_responses();
    }
    let responses = client.handler().take_responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].context(), 3);
}

#[test]
fn fire_and_forget_gets_no_response() {
    let (client, mut server) = connect();

    client.queue_no_response(build("ECHO", &["quiet"], 4));
    client.queue_request(build("PING", &[], 5));
    client.send_requests();

    let handled = server.auto_reply();
    assert_eq!(handled.len(), 2);
    assert_eq!(handled[0].id_bytes, b"F");
    assert!(!handled[0].expects_response);

    client.parse_responses();
    let responses = client.handler().take_responses();
    // Only the PING got a response; the fire-and-forget was dropped.
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].context(), 5);
}

#[test]
fn error_responses_load_the_error_object() {
    let (client, mut server) = connect();

    client.queue_request(build("NOSUCH", &[], 6));
    client.send_requests();
    server.auto_reply();
    client.parse_responses();

    let responses = client.handler().take_responses();
    assert_eq!(responses.len(), 1);
    let response = &responses[0];
    assert_eq!(response.response_is_err(), Some(true));
    let error = response.load_error().expect("well-formed error");
    assert_eq!(error.code, -1);
    assert_eq!(error.message, Some("unknown command"));
    assert_eq!(error.data, None);
}
