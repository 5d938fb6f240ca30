//! Obfuscated identifiers used in shareable replay links.
//!
//! The web client never puts raw account ids or log ids in a URL. Account
//! ids go through an affine+xor transform, and "version 2" log ids rotate
//! every digit and lowercase letter by an amount that depends on its
//! position. Both transforms are exact inverses of their encoders.

const ACCOUNT_MUL: u64 = 7;
const ACCOUNT_ADD: u64 = 1_117_113;
const ACCOUNT_XOR: u64 = 86_216_345;
const ACCOUNT_OFFSET: u64 = 1_358_437;

const LOG_SHIFT: i64 = 55;

/// Obfuscates an account id for use in a replay link (`_a<encoded>`).
pub fn encode_account_id(account_id: u64) -> u64 {
    (account_id
        .wrapping_mul(ACCOUNT_MUL)
        .wrapping_add(ACCOUNT_ADD)
        ^ ACCOUNT_XOR)
        .wrapping_add(ACCOUNT_OFFSET)
}

/// Reverses [`encode_account_id`].
///
/// Garbage in, garbage out: a value that was never produced by the encoder
/// decodes to some unrelated number rather than an error.
pub fn decode_account_id(encoded: u64) -> u64 {
    ((encoded.wrapping_sub(ACCOUNT_OFFSET) ^ ACCOUNT_XOR).wrapping_sub(ACCOUNT_ADD)) / ACCOUNT_MUL
}

/// Decodes a version-2 log id (the form carried by `<uuid>_a<id>_2` links).
pub fn decode_log_id(log_id: &str) -> String {
    rotate(log_id, |i| LOG_SHIFT - i)
}

/// Reverses [`decode_log_id`].
pub fn encode_log_id(log_id: &str) -> String {
    rotate(log_id, |i| i - LOG_SHIFT)
}

fn rotate(s: &str, shift: impl Fn(i64) -> i64) -> String {
    s.chars()
        .enumerate()
        .map(|(i, c)| {
            let by = shift(i as i64);
            match c {
                '0'..='9' => shift_in(c, b'0', 10, by),
                'a'..='z' => shift_in(c, b'a', 26, by),
                _ => c,
            }
        })
        .collect()
}

fn shift_in(c: char, base: u8, modulus: i64, by: i64) -> char {
    let offset = (c as i64 - base as i64 + by).rem_euclid(modulus);
    char::from(base + offset as u8)
}
