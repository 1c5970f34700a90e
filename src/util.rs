use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic pseudo-random pair in `[-1, 1]` derived from `key`.
pub fn stable_pair<K: Hash + ?Sized>(key: &K) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

/// Linear map of `value` from `domain` onto `range`, clamped to the range.
pub fn linear_clamped(value: f32, domain: (f32, f32), range: (f32, f32)) -> f32 {
    let span = domain.1 - domain.0;
    let t = if span.abs() <= f32::EPSILON {
        1.0
    } else {
        ((value - domain.0) / span).clamp(0.0, 1.0)
    };
    range.0 + (range.1 - range.0) * t
}

pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_owned();
    }
    let mut truncated = label.chars().take(max_chars.saturating_sub(1)).collect::<String>();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_pair_is_deterministic_and_bounded() {
        let a = stable_pair("1:2");
        assert_eq!(a, stable_pair("1:2"));
        assert!((-1.0..=1.0).contains(&a.0) && (-1.0..=1.0).contains(&a.1));
    }

    #[test]
    fn linear_scale_clamps_to_range() {
        assert_eq!(linear_clamped(0.0, (1.0, 2.0), (10.0, 20.0)), 10.0);
        assert_eq!(linear_clamped(1.5, (1.0, 2.0), (10.0, 20.0)), 15.0);
        assert_eq!(linear_clamped(9.0, (1.0, 2.0), (10.0, 20.0)), 20.0);
        assert_eq!(linear_clamped(5.0, (1.0, 2.0), (20.0, 10.0)), 10.0);
    }

    #[test]
    fn truncates_long_labels() {
        assert_eq!(truncate_label("short", 10), "short");
        assert_eq!(truncate_label("a very long label", 6), "a ver…");
    }
}
