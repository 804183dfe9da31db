//! Fuzz target for IRC line parsing
//!
//! Parsing must never panic, and anything that parses must survive a trip
//! through its canonical form unchanged.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

use ircv3_engine::ParsedMessage;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = str::from_utf8(data) {
        if input.is_empty() || input.len() > 8191 {
            return;
        }

        if let Ok(msg) = ParsedMessage::parse(input) {
            let canonical = msg.to_string();
            if let Ok(reparsed) = ParsedMessage::parse(&canonical) {
                assert_eq!(reparsed, msg, "canonical form changed: {:?}", canonical);
            }
        }
    }
});
