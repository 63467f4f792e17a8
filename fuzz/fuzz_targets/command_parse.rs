//! Fuzz target for the user command parser.
//!
//! Any input must either fail cleanly or produce a request whose bytes are
//! a well-formed array the framer accepts in one piece.

#![no_main]

use libfuzzer_sys::fuzz_target;
use opatomic_client::parse_user_command;
use opatomic_proto::Framer;

fuzz_target!(|data: &str| {
    if let Ok(request) = parse_user_command(data) {
        let bytes = request.request_bytes();
        let mut framer = Framer::default();
        let end = framer.find_end(bytes).expect("request is well formed");
        assert_eq!(end, Some(bytes.len()));
    }
});
