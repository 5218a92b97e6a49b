#![no_main]

use hcl::{parse_native, Pos};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }
    let (file, _diags) = parse_native(data, "fuzz.hcl", Pos::INITIAL);
    let _ = file.body.just_attributes();
});
