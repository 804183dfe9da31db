//! Fuzz target for the session state machine
//!
//! Feeds arbitrary lines to a session that is mid-registration with SASL
//! enabled. Errors are expected; panics are not.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

use ircv3_engine::{AccountConfig, Session};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = str::from_utf8(data) else {
        return;
    };

    let config = AccountConfig::new("nick", "irc.example.com")
        .with_tls(false)
        .with_plain_sasl_in_clear(true)
        .with_password("secret");
    let mut session = Session::new(config);
    session.start();

    for line in input.split('\n').take(64) {
        let _ = session.handle_line(line);
        session.drain_outgoing().for_each(drop);
        session.drain_events().for_each(drop);
    }
});
