//! Fuzz target: `parse_request` + `dispatch`
//!
//! Feeds arbitrary bytes to the control-surface request parser, in one
//! piece and split at an arbitrary point the way a socket read would, and
//! routes whatever parses.  The parser must never panic, never borrow past
//! the buffer, and agree with itself across the split.
//!
//! cargo fuzz run fuzz_http_request

#![no_main]

use libfuzzer_sys::fuzz_target;
use pulseox::app::commands::{ControlCommand, ControlReply};
use pulseox::http::{MAX_REQUEST_SIZE, Parse, dispatch, parse_request};
use pulseox::session::MeasurementSession;

fuzz_target!(|data: &[u8]| {
    let Some((&split, data)) = data.split_first() else {
        return;
    };

    let whole = parse_request(data);
    if let Ok(Parse::Complete(req)) = &whole {
        assert!(req.body.len() <= MAX_REQUEST_SIZE);
        assert!(req.path.starts_with('/'));

        let mut session = MeasurementSession::new();
        let resp = dispatch(req, &mut |cmd: ControlCommand| match cmd {
            ControlCommand::Begin { label } => {
                session.begin(label.as_deref());
                ControlReply::Ack
            }
            ControlCommand::Cancel => {
                session.request_cancel();
                ControlReply::Ack
            }
            ControlCommand::Status => ControlReply::Status(session.snapshot()),
        });
        assert!(!resp.status_line.is_empty());
    }

    // Once a prefix parses, the rest of the bytes cannot change the request.
    let cut = usize::from(split) % (data.len() + 1);
    if let Ok(Parse::Complete(prefix)) = parse_request(&data[..cut]) {
        assert_eq!(whole, Ok(Parse::Complete(prefix)));
    }
});
