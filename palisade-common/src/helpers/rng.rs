use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Returns an OS-seeded ChaCha20 generator for security-sensitive
/// randomness (password salts, generated secrets, upload names).
/// Callers get a fresh instance each time rather than sharing one
/// behind a lock.
pub fn crypto_rng() -> ChaCha20Rng {
    ChaCha20Rng::from_entropy()
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn two_generators_do_not_share_a_stream() {
        let a: [u8; 32] = crypto_rng().gen();
        let b: [u8; 32] = crypto_rng().gen();
        assert_ne!(a, b);
    }
}
