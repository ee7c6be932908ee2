//! Fuzz target for dump framing.
//!
//! Splitting arbitrary bytes must never panic, and every frame produced
//! starts with the format marker.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replication_recovery::splitter::FrameSplitter;

fuzz_target!(|data: &[u8]| {
    // First byte picks a chunk size so chunk boundaries get exercised too.
    let Some((&size, rest)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(size).max(1);

    let Ok(mut splitter) = FrameSplitter::new() else {
        return;
    };
    for piece in rest.chunks(chunk) {
        match splitter.push(piece) {
            Ok(frames) => assert!(frames.iter().all(|f| f.has_marker())),
            Err(_) => return,
        }
    }
    if let Ok(frames) = splitter.finish() {
        assert!(frames.iter().all(|f| f.has_marker()));
    }
});
