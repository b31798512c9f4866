//! Content hashing and preview helpers shared by every layer.

use sha2::{Digest, Sha256};

/// Lowercase hex sha256 of UTF-8 text.
pub fn sha256_hex(text: &str) -> String {
    hex_digest(text.as_bytes())
}

/// Lowercase hex sha256 of raw bytes.
pub fn hex_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Raw 32-byte sha256 over several `:`-separated parts.
///
/// Used to derive RNG seeds; the separator keeps `("ab", "c")` and
/// `("a", "bc")` apart.
pub fn seed_material(parts: &[&str]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            hasher.update(b":");
        }
        hasher.update(part.as_bytes());
    }
    hasher.finalize().into()
}

/// First `max_chars` characters of `text`, with `...` when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::{hex_digest, preview, seed_material, sha256_hex};

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hex_digest_of_raw_bytes_matches_known_vector() {
        assert_eq!(
            hex_digest(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        let digest = hex_digest(&[0xff, 0x00, 0x10]);
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch)));
    }

    #[test]
    fn seed_material_separates_parts() {
        assert_ne!(seed_material(&["ab", "c"]), seed_material(&["a", "bc"]));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("þeþeþe", 3), "þeþ...");
        assert_eq!(preview("short", 10), "short");
    }
}
