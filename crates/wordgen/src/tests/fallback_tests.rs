use super::*;
use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashSet;

#[test]
fn pool_is_large_enough_and_unique() {
    let unique: HashSet<_> = FALLBACK_WORDS.iter().collect();
    assert_eq!(unique.len(), FALLBACK_WORDS.len());
    assert!(FALLBACK_WORDS.len() >= 25);
    assert!(FALLBACK_WORDS
        .iter()
        .all(|w| w.chars().all(|c| c.is_ascii_uppercase())));
}

#[test]
fn draw_returns_distinct_pool_words() {
    let mut rng = StdRng::seed_from_u64(11);
    let words = draw_with(25, &mut rng);
    assert_eq!(words.len(), 25);
    let unique: HashSet<_> = words.iter().collect();
    assert_eq!(unique.len(), 25);
}

#[test]
fn draw_varies_with_the_rng() {
    let first = draw_with(25, &mut StdRng::seed_from_u64(1));
    let second = draw_with(25, &mut StdRng::seed_from_u64(2));
    assert_ne!(first, second);
}

#[test]
fn draw_caps_at_pool_size() {
    let words = draw(FALLBACK_WORDS.len() + 5);
    assert_eq!(words.len(), FALLBACK_WORDS.len());
}
