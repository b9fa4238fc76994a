//! Utility functions for PC/SC operations

/// Match an ATR against a pattern with an optional mask
///
/// Only the first `pattern.len()` bytes of the ATR are compared. If a mask
/// is provided, only the bits set in the mask are compared.
pub fn match_atr(atr: &[u8], pattern: &[u8], mask: Option<&[u8]>) -> bool {
    // If pattern is longer than ATR, it can't match
    if pattern.len() > atr.len() {
        return false;
    }

    match mask {
        // Mask must be at least as long as pattern
        Some(mask) if mask.len() < pattern.len() => false,
        Some(mask) => atr
            .iter()
            .zip(pattern)
            .zip(mask)
            .all(|((a, p), m)| a & m == p & m),
        None => atr.starts_with(pattern),
    }
}
