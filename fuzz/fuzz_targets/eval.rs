#![no_main]

use std::sync::Arc;

use hcl::{parse_expression, EvalContext, Pos, Value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Evaluation cost grows with nesting, so only small expressions are tried.
    if data.len() > 4 * 1024 {
        return;
    }
    let (expr, diags) = parse_expression(data, "fuzz.hcl", Pos::INITIAL);
    if diags.has_errors() {
        return;
    }
    let mut ctx = EvalContext::new();
    ctx.set_variable("x", Value::int(1));
    ctx.set_variable("s", Value::string("fuzz"));
    let ctx = Arc::new(ctx);
    let _ = expr.value(Some(&ctx));
});
