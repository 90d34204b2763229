use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;
use rand::{Rng, SeedableRng as _};

use crate::model::Timestamp;

/// A range of percentages and the cumulative probability up to and including it.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub threshold: f64,
    pub range: RangeInclusive<u8>,
}

/// Skewed towards high scores: most names are quite a lot of cat.
pub static BUCKETS: [Bucket; 5] = [
    Bucket { threshold: 0.05, range: 1..=20 },
    Bucket { threshold: 0.15, range: 21..=50 },
    Bucket { threshold: 0.40, range: 51..=75 },
    Bucket { threshold: 0.80, range: 76..=95 },
    Bucket { threshold: 1.00, range: 96..=100 },
];

pub const PHRASES: [&str; 10] = [
    "Meow! A real cat! 🐱",
    "There is a cat soul in you! 😻",
    "A cat like this could rule the world! 👑",
    "Born to purr! 💕",
    "Wow! A rare cat! 🎯",
    "An almost perfect cat! ✨",
    "Cat detected! Meow-meow! 🐾",
    "Just a fluffy ball of happiness! 🌟",
    "A true mouse hunter! 🐭",
    "Master of purring and lying on keyboards! ⌨️",
];

/// The bucket selected by a uniform draw `r` in `[0, 1)`.
pub fn bucket_for(r: f64) -> &'static Bucket {
    BUCKETS
        .iter()
        .find(|bucket| r < bucket.threshold)
        .unwrap_or(&BUCKETS[BUCKETS.len() - 1])
}

/// Seed for a name at a given moment: the sum of the lowercase character codes plus the
/// Unix time in seconds.
pub fn seed_for(name: &str, now: Timestamp) -> u64 {
    name.to_lowercase()
        .chars()
        .map(u64::from)
        .fold(0_u64, u64::wrapping_add)
        .wrapping_add_signed(now.timestamp())
}

/// Draws a bucket, then a percentage uniformly inside it.
pub fn score_with<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    let r: f64 = rng.gen();
    let bucket = bucket_for(r);
    rng.gen_range(bucket.range.clone())
}

/// How much of a cat `name` is at `now`, in `1..=100`.
///
/// The seed includes the current second, so the same name scores differently over time.
pub fn score(name: &str, now: Timestamp) -> u8 {
    let mut rng = StdRng::seed_from_u64(seed_for(name, now));
    score_with(&mut rng)
}

pub fn phrase<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    PHRASES.choose(rng).copied().unwrap_or(PHRASES[0])
}
