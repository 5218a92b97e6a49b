#![no_main]

use hcl::parse_json;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }
    let (file, _diags) = parse_json(data, "fuzz.json");
    let (attrs, _) = file.body.just_attributes();
    for attr in attrs.values() {
        let _ = attr.expr.value(None);
    }
});
