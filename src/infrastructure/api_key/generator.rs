//! API key value generation
//!
//! Values are drawn from the operating system's secure random source and
//! rendered as dash-separated groups of lowercase hex.

use std::fmt::Debug;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::domain::api_key::{KEY_SEGMENT_LEN, KEY_VALUE_BYTES};
use crate::domain::DomainError;

/// Source of cryptographically secure random bytes
pub trait EntropySource: Send + Sync + Debug {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error>;
}

/// Operating system random source
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        OsRng.try_fill_bytes(dest)
    }
}

/// Generator for API key values
#[derive(Debug, Clone)]
pub struct KeyValueGenerator {
    entropy: Arc<dyn EntropySource>,
    /// Number of random bytes behind each value
    key_bytes: usize,
    /// Hex characters per segment
    segment_len: usize,
}

impl KeyValueGenerator {
    /// Create a generator backed by the OS random source
    pub fn new() -> Self {
        Self {
            entropy: Arc::new(OsEntropy),
            key_bytes: KEY_VALUE_BYTES,
            segment_len: KEY_SEGMENT_LEN,
        }
    }

    /// Use a different random source
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    /// Set the number of random bytes
    pub fn with_key_bytes(mut self, bytes: usize) -> Self {
        self.key_bytes = bytes;
        self
    }

    /// Generate a new key value
    pub fn generate(&self) -> Result<String, DomainError> {
        let mut random_bytes = vec![0u8; self.key_bytes];

        self.entropy.fill(&mut random_bytes).map_err(|e| {
            DomainError::generation(format!("Secure random source unavailable: {}", e))
        })?;

        Ok(group_segments(&hex::encode(random_bytes), self.segment_len))
    }
}

impl Default for KeyValueGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn group_segments(encoded: &str, segment_len: usize) -> String {
    let mut grouped = String::with_capacity(encoded.len() + encoded.len() / segment_len);

    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % segment_len == 0 {
            grouped.push('-');
        }
        grouped.push(c);
    }

    grouped
}
