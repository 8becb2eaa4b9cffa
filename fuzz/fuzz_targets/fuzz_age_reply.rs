// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use agesort::buckets::AgeBuckets;
use agesort::estimator::{parse_age_reply, MAX_PLAUSIBLE_AGE};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    reply: &'a str,
    enforce_detection: bool,
    width: u8,
}

fuzz_target!(|input: Input<'_>| {
    if let Ok(estimate) = parse_age_reply(input.reply, input.enforce_detection) {
        assert!((0.0..=MAX_PLAUSIBLE_AGE).contains(&estimate.age));

        let buckets = AgeBuckets::new(u32::from(input.width.max(1)));
        let bucket = buckets.bucket_for(estimate.years());
        assert!(bucket.contains(estimate.years().max(1)));
    }
});
