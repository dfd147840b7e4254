//! Client-side record id generation.

use rand::rngs::OsRng;
use rand::Rng;

/// Alphabet for generated ids.
const ID_ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated ids.
pub const ID_LENGTH: usize = 15;

/// Create a 15 character lowercase alphanumeric id.
///
/// Characters are sampled uniformly from the OS random source, so ids can be
/// chosen by the client and used as primary keys for optimistic creates.
pub fn new_record_id() -> String {
    let mut rng = OsRng;
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
