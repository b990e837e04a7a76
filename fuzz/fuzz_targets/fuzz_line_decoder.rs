//! Fuzz target: `LineDecoder::feed`
//!
//! Drives arbitrary bytes into the line decoder, split at a fuzzer-chosen
//! point, and checks that every yielded line respects the length cap.
//!
//! cargo fuzz run fuzz_line_decoder

#![no_main]

use ibcfill::api::codec::{LineDecoder, MAX_LINE_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let split = data.first().map_or(0, |&b| usize::from(b)).min(data.len());
    let (head, tail) = data.split_at(split);

    let mut decoder = LineDecoder::new();
    for chunk in [head, tail] {
        for line in decoder.feed(chunk) {
            assert!(line.len() <= MAX_LINE_LEN, "line exceeds MAX_LINE_LEN");
            assert!(!line.contains('\n'));
        }
    }

    decoder.reset();
    let _ = decoder.feed(data);
});
