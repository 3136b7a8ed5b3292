use std::sync::Once;

use rand::rngs::OsRng;
use rand::RngCore;

pub(crate) const CORRELATION_ID_LEN: usize = 21;
pub(crate) const ALPHABET: &[u8; 62] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// Largest multiple of the alphabet size representable in a byte, for
// rejection sampling.
const REJECTION_BOUND: u8 = ((256 / ALPHABET.len()) * ALPHABET.len()) as u8;

static DEGRADED_RNG_WARNING: Once = Once::new();

/// Generate a fresh correlation token for one upstream attempt.
///
/// The token is an opaque 21-symbol alphanumeric identity value expected by
/// the upstream providers, not a security credential. Symbols come from the
/// OS random source; if that source fails, the affected symbols fall back to
/// a non-cryptographic generator and a warning is logged once per process.
#[must_use]
pub fn correlation_id() -> String {
    let mut id = String::with_capacity(CORRELATION_ID_LEN);
    for _ in 0..CORRELATION_ID_LEN {
        id.push(char::from(draw_symbol()));
    }
    id
}

fn draw_symbol() -> u8 {
    match secure_symbol() {
        Some(symbol) => symbol,
        None => {
            DEGRADED_RNG_WARNING.call_once(|| {
                tracing::warn!(
                    "OS random source failed, using a non-cryptographic fallback for correlation ids"
                );
            });
            ALPHABET[fastrand::usize(..ALPHABET.len())]
        }
    }
}

fn secure_symbol() -> Option<u8> {
    let mut byte = [0_u8; 1];
    loop {
        OsRng.try_fill_bytes(&mut byte).ok()?;
        if byte[0] < REJECTION_BOUND {
            return Some(ALPHABET[usize::from(byte[0]) % ALPHABET.len()]);
        }
    }
}
