//! Hash functions for SiteBlockr
//!
//! Rule identifiers are derived from the filter pattern with Murmur3 32-bit,
//! so a site keeps the same rule id no matter where it sits in the list.
//!
//! # Identifier Range
//!
//! The browser engine requires ids >= 1 that fit a signed 32-bit integer.
//! Hashes are folded into `1..=MAX_RULE_ID`.

/// Largest rule id handed out.
pub const MAX_RULE_ID: u32 = 0x7FFF_FFFE;

const RULE_ID_SEED: u32 = 0x9e3779b9; // Golden ratio

/// Murmur3 32-bit hash implementation.
/// Optimized for short strings (typical domain lengths).
#[inline]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let len = data.len();
    let mut h = seed;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h ^= scramble(k);
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    // Tail bytes
    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k: u32 = 0;
        for (shift, &b) in tail.iter().enumerate() {
            k ^= (b as u32) << (8 * shift);
        }
        h ^= scramble(k);
    }

    // Finalization
    h ^= len as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;

    h
}

#[inline]
fn scramble(k: u32) -> u32 {
    k.wrapping_mul(0xcc9e2d51)
        .rotate_left(15)
        .wrapping_mul(0x1b873593)
}

/// Preferred rule id for a filter pattern.
///
/// Case-insensitive, since the engine matches filters case-insensitively.
#[inline]
pub fn rule_id_for(url_filter: &str) -> u32 {
    let lowered = url_filter.to_ascii_lowercase();
    fold_rule_id(murmur3_32(lowered.as_bytes(), RULE_ID_SEED))
}

/// Map any 32-bit value into the valid id range.
#[inline]
pub fn fold_rule_id(h: u32) -> u32 {
    h % MAX_RULE_ID + 1
}

/// Next id to probe after `id` collided, wrapping inside the valid range.
#[inline]
pub fn next_rule_id(id: u32) -> u32 {
    if id >= MAX_RULE_ID {
        1
    } else {
        id + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_id_stable_per_filter() {
        let facebook = rule_id_for("||facebook.com^");
        assert_eq!(facebook, rule_id_for("||facebook.com^"));
        assert_ne!(facebook, rule_id_for("||facebook.org^"));
        assert_ne!(murmur3_32(b"||facebook.com^", 0), murmur3_32(b"||facebook.com^", 1));
    }

    #[test]
    fn test_murmur3_known_vectors() {
        // Reference values of the canonical x86_32 variant
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"", 1), 0x514e28b7);
        assert_eq!(murmur3_32(b"hello", 0), 0x248bfa47);
        assert_eq!(murmur3_32(b"Hello, world!", 1234), 0xfaf6cdb3);
    }

    #[test]
    fn test_rule_id_in_range() {
        for filter in ["||a^", "||facebook.com^", "reddit.com/r/all", ""] {
            let id = rule_id_for(filter);
            assert!(id >= 1 && id <= MAX_RULE_ID, "{filter} -> {id}");
        }
        assert_eq!(fold_rule_id(u32::MAX), u32::MAX % MAX_RULE_ID + 1);
        assert!(fold_rule_id(u32::MAX) <= MAX_RULE_ID);
        assert_eq!(fold_rule_id(0), 1);
    }

    #[test]
    fn test_rule_id_case_insensitive() {
        assert_eq!(rule_id_for("||Example.COM^"), rule_id_for("||example.com^"));
    }

    #[test]
    fn test_next_rule_id_wraps() {
        assert_eq!(next_rule_id(5), 6);
        assert_eq!(next_rule_id(MAX_RULE_ID), 1);
    }
}
