use rand::{thread_rng, Rng};

use beatmarket_store::{FieldOp, Value};

/// Characters used in generated license codes.
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random uppercase alphanumeric code.
pub(crate) fn random_code(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .take(length)
        .collect()
}

/// Pushes a set operation for every patch field that is present.
pub(crate) fn push_set(ops: &mut Vec<FieldOp>, field: &str, value: Option<impl Into<Value>>) {
    if let Some(value) = value {
        ops.push(FieldOp::Set(field.to_string(), value.into()));
    }
}
