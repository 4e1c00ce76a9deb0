use rand::{seq::SliceRandom, Rng};

/// Built-in pool used when no generator is configured or generation fails.
pub const FALLBACK_WORDS: &[&str] = &[
    "RIVER", "BRIDGE", "FOREST", "CASTLE", "MOON", "STAR", "MOUNTAIN", "DRAGON", "SWORD",
    "SHIELD", "KING", "QUEEN", "WIZARD", "GHOST", "TREASURE", "MAP", "SHIP", "PIRATE", "ISLAND",
    "OCEAN", "DESERT", "WATERFALL", "STORM", "LIGHTNING", "VOLCANO", "PLANET", "GALAXY",
    "ROCKET", "ALIEN", "ROBOT", "COMPUTER", "BOOK", "POTION", "SPELL", "GIANT", "DWARF", "ELF",
    "WARRIOR", "BOW", "ARROW", "ANCHOR", "LANTERN", "COMPASS", "TOWER", "CROWN", "MIRROR",
    "KEY", "CLOCK", "GARDEN", "WHALE", "EAGLE", "WOLF", "BEAR", "SNAKE", "PIANO", "DRUM",
    "CANDLE", "HONEY", "GLACIER", "TRAIN",
];

/// Draws `count` distinct words uniformly from the pool. Returns the whole pool,
/// shuffled, when `count` exceeds its size.
pub fn draw(count: usize) -> Vec<String> {
    draw_with(count, &mut rand::thread_rng())
}

pub fn draw_with<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<String> {
    FALLBACK_WORDS
        .choose_multiple(rng, count)
        .map(|word| word.to_string())
        .collect()
}

#[cfg(test)]
#[path = "tests/fallback_tests.rs"]
mod tests;
