use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::node::NodeId;

pub const DEFAULT_ID_LENGTH: usize = 10;
pub const DEFAULT_ID_ALPHABET: &str =
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Source of fresh node ids.
///
/// Passed explicitly to every operation that creates nodes, so a mutation never depends
/// on hidden global state.
pub trait IdGenerator {
    fn next_id(&mut self) -> NodeId;
}

impl<F> IdGenerator for F
where
    F: FnMut() -> NodeId,
{
    fn next_id(&mut self) -> NodeId {
        self()
    }
}

/// Random alphanumeric ids (collision odds are irrelevant at flow sizes)
#[derive(Debug, Clone)]
pub struct RandomIds {
    rng: StdRng,
    alphabet: Vec<char>,
    length: usize,
}

impl RandomIds {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible sequence, for tests and benchmarks
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            alphabet: DEFAULT_ID_ALPHABET.chars().collect(),
            length: DEFAULT_ID_LENGTH,
        }
    }

    pub fn with_alphabet(mut self, alphabet: &str, length: usize) -> Self {
        let alphabet: Vec<char> = alphabet.chars().collect();
        if !alphabet.is_empty() {
            self.alphabet = alphabet;
        }
        self.length = length.max(1);
        self
    }
}

impl Default for RandomIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> NodeId {
        (0..self.length)
            .map(|_| self.alphabet[self.rng.gen_range(0..self.alphabet.len())])
            .collect()
    }
}

/// Sequential ids of the form `<seed>-<n>`
#[derive(Debug, Clone)]
pub struct SequentialIds {
    seed: String,
    count: u32,
}

impl SequentialIds {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            count: 0,
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> NodeId {
        self.count += 1;
        format!("{}-{}", self.seed, self.count)
    }
}
