//! Canonical, order-independent stringification and the FNV-1a hash built
//! on top of it, used for cache keys (spec §6 "Cache key format").
//!
//! `serde_json::Map` is backed by a `BTreeMap` in this workspace (the
//! `preserve_order` feature is never enabled), so object keys are already
//! visited in sorted order; `stable_stringify` does not need a separate
//! sort pass. Arrays keep their element order — order is semantically
//! meaningful for arrays, only object key order is incidental.
//!
//! JSON values are a tree, not a graph, so cyclic input is structurally
//! impossible here; the "reject circular inputs" requirement from the
//! original spec is satisfied vacuously for any value this crate can
//! construct.

use serde_json::Value as JsonValue;

/// Produce a canonical string for a JSON value: sorted object keys,
/// consistent number/string formatting, recursing into arrays and objects.
/// Two JSON values with the same key/value sets (in any insertion order)
/// always produce identical output.
pub fn stable_stringify(value: &JsonValue) -> String {
    let mut out = String::new();
    write_stable(value, &mut out);
    out
}

fn write_stable(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Null => out.push_str("null"),
        JsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        JsonValue::Number(n) => out.push_str(&n.to_string()),
        JsonValue::String(s) => {
            out.push('"');
            out.push_str(&s.replace('\\', "\\\\").replace('"', "\\\""));
            out.push('"');
        }
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_stable(item, out);
            }
            out.push(']');
        }
        JsonValue::Object(map) => {
            out.push('{');
            for (i, (key, val)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('"');
                out.push_str(&key.replace('\\', "\\\\").replace('"', "\\\""));
                out.push_str("\":");
                write_stable(val, out);
            }
            out.push('}');
        }
    }
}

/// FNV-1a, 32-bit, rendered as 8 lowercase hex digits. Deterministic:
/// identical input bytes always produce the identical digest.
pub fn fnv1a_hex(data: &str) -> String {
    const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let mut hash = FNV_OFFSET_BASIS;
    for byte in data.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:08x}")
}
