use crate::keywords::tokenize;
use std::collections::BTreeMap;

const DEFAULT: usize = 384;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// 64-bit FNV-1a. Bucket assignment depends only on this function, so it
/// must stay stable for vectors to remain comparable.
pub fn stable_hash(token: &str) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Hashed bag-of-words embedding.
///
/// Every distinct word lands in bucket `stable_hash(word) % dimensions` with
/// weight `1 + ln(tf)`, and the result is L2-normalized. Text without any
/// alphanumeric word yields the zero vector.
#[derive(Debug, Clone, Copy)]
pub struct HashedWordEmbedder {
    pub dimensions: usize,
}

impl Default for HashedWordEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl Embedder for HashedWordEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        if vector.is_empty() {
            return vector;
        }

        // Ordered so accumulation is bit-for-bit reproducible.
        let mut frequencies = BTreeMap::<String, u32>::new();
        for token in tokenize(text) {
            *frequencies.entry(token).or_default() += 1;
        }

        for (token, count) in frequencies {
            let bucket = (stable_hash(&token) % vector.len() as u64) as usize;
            vector[bucket] += 1.0 + (count as f32).ln();
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}
