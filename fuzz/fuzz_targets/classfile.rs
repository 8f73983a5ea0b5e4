#![no_main]

use libfuzzer_sys::fuzz_target;
use mcsc::patcher::{inject, InjectOptions};

fuzz_target!(|data: &[u8]| {
    // Parses the class, then decodes and re-encodes `main` if it exists
    let _ = inject(data, &InjectOptions::default());
});
