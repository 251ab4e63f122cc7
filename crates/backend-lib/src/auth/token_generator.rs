// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
/** Reset secret generation
This module produces the temporary passwords handed out by the
forgot-password flow. The value works as a login credential, so it is
drawn from a cryptographically secure generator and must be hashed
before it is stored. */
use rand::Rng;
use zeroize::Zeroizing;

/// Characters a reset secret is drawn from. `0 O 1 I l` are left out so the
/// value survives being read aloud or copied by hand.
pub const RESET_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";

/// Default reset secret length in characters
pub const DEFAULT_RESET_LENGTH: usize = 10;

/** Generate a reset secret of exactly `length` characters
Uses the thread-local CSPRNG, which is seeded from the OS and shared by all
callers on a thread without locking.
# Returns
The secret, wiped from memory when dropped */
pub fn generate_reset_secret(length: usize) -> Zeroizing<String> {
    let mut rng = rand::rng();
    let secret: String = (0..length)
        .map(|_| RESET_ALPHABET[rng.random_range(0..RESET_ALPHABET.len())] as char)
        .collect();
    Zeroizing::new(secret)
}
