//! Jitter for retry backoff

use rand::Rng;

/// Uniform jitter in `0..=max_jitter_ms`
pub fn generate_jitter_ms(max_jitter_ms: u64) -> u64 {
    if max_jitter_ms == 0 {
        return 0;
    }
    rand::rng().random_range(0..=max_jitter_ms)
}

/// Jitter of up to `jitter_percent` of `base_value`
///
/// ```
/// use birdnet_datastore::utils::jitter::generate_jitter_percent;
///
/// let jitter = generate_jitter_percent(1000, 25);
/// assert!(jitter <= 250);
/// ```
pub fn generate_jitter_percent(base_value: u64, jitter_percent: u8) -> u64 {
    if jitter_percent == 0 || base_value == 0 {
        return 0;
    }
    generate_jitter_ms(base_value * jitter_percent as u64 / 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..200 {
            assert!(generate_jitter_ms(100) <= 100);
            assert!(generate_jitter_percent(1000, 25) <= 250);
        }
    }

    #[test]
    fn test_zero_inputs() {
        assert_eq!(generate_jitter_ms(0), 0);
        assert_eq!(generate_jitter_percent(0, 50), 0);
        assert_eq!(generate_jitter_percent(1000, 0), 0);
    }
}
