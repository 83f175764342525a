//! Random slug generation for paste identifiers.
//!
//! Slugs are drawn uniformly from a fixed alphanumeric alphabet. They are
//! not cryptographically secure; uniqueness is enforced by the storage
//! layer's exclusive directory creation, not by entropy.

use rand::Rng;

/// Alphabet slugs are drawn from. Safe both in URLs and as directory names.
const SYMBOLS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draw one random symbol from the alphabet.
fn random_symbol<R: Rng>(rng: &mut R) -> char {
    SYMBOLS[rng.gen_range(0..SYMBOLS.len())] as char
}

/// Generate a random slug of the given length.
///
/// Uses the thread-local generator, so concurrent connection handlers
/// never share seed state.
pub fn generate(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length).map(|_| random_symbol(&mut rng)).collect()
}

/// Append one more random symbol to an existing slug.
///
/// Used by the storage layer to grow a colliding slug instead of
/// rerolling it, so allocation always terminates even when the namespace
/// at the configured length is exhausted.
pub fn extend(slug: &mut String) {
    let mut rng = rand::thread_rng();
    slug.push(random_symbol(&mut rng));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_length() {
        for length in [1, 4, 16] {
            assert_eq!(generate(length).len(), length);
        }
        assert_eq!(generate(0), "");
    }

    #[test]
    fn test_generate_uses_alphabet() {
        let slug = generate(256);
        assert!(slug.bytes().all(|b| SYMBOLS.contains(&b)));
    }

    #[test]
    fn test_extend_grows_by_one() {
        let mut slug = generate(4);
        extend(&mut slug);
        assert_eq!(slug.len(), 5);
        assert!(slug.bytes().all(|b| SYMBOLS.contains(&b)));
    }

    #[test]
    fn test_slugs_vary() {
        // 62^16 possibilities; two equal draws would mean a broken generator.
        assert_ne!(generate(16), generate(16));
    }
}
