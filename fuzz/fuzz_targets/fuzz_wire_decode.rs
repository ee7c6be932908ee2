//! Fuzz target for the binary payload decoder.
//!
//! Decoding, measuring and message decoding must never panic, and a
//! successful decode must agree with the measured length.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replication_recovery::message::{MessageKind, ReplicationMessage};
use replication_recovery::wire::{decode_struct, struct_len};

fuzz_target!(|data: &[u8]| {
    let decoded = decode_struct(data);
    let measured = struct_len(data);
    if let (Ok((_, used)), Ok(len)) = (&decoded, &measured) {
        assert_eq!(used, len);
    }

    let _ = ReplicationMessage::decode(MessageKind::History, data);
    let _ = ReplicationMessage::decode(MessageKind::Visibility, data);
});
