//! Embedding function (spec §1, §5): `embed(text) -> fixed-length float
//! vector`. The embedding model itself is an external collaborator out of
//! scope for this spec; what this module owns is the *interface* —
//! lazy initialization, a pre-warm hook, and a deterministic stand-in
//! implementation so the rest of the system has something real to call.
//!
//! Lazy init mirrors spec §5: "initialised lazily on first use and can be
//! 'pre-warmed' after the MCP handshake completes."

use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::config::EMBEDDING_DIM;

/// A loaded (or stand-in) embedding model handle.
pub struct EmbeddingModel {
    name: String,
    dim: usize,
}

impl EmbeddingModel {
    fn load(name: &str) -> Self {
        tracing::info!(model = name, dim = EMBEDDING_DIM, "embedding model initialized");
        Self { name: name.to_string(), dim: EMBEDDING_DIM }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Deterministic bag-of-hashed-tokens embedding. Stands in for a real
    /// model: same text always yields the same vector, similar texts yield
    /// vectors with positive cosine similarity (shared tokens hash to the
    /// same dimensions), which is the property the search engine's ranking
    /// and validation logic (spec §4.6) actually relies on.
    #[must_use]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dim];
        let mut any = false;
        for token in text.to_lowercase().split_whitespace() {
            if token.is_empty() {
                continue;
            }
            any = true;
            let hash = fnv1a(token.as_bytes());
            let idx = (hash as usize) % self.dim;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        if any {
            normalize(&mut vector);
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine distance (0 = identical direction, 2 = opposite). The search
/// engine drops semantic results whose distance exceeds 0.8 (spec §4.6.2).
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 2.0;
    }
    let cosine_similarity = (dot / (na * nb)).clamp(-1.0, 1.0);
    1.0 - cosine_similarity
}

static MODEL: OnceCell<Arc<EmbeddingModel>> = OnceCell::new();

/// Returns the (lazily initialized) shared embedding model handle.
pub fn model(model_name: &str) -> Arc<EmbeddingModel> {
    MODEL.get_or_init(|| Arc::new(EmbeddingModel::load(model_name))).clone()
}

/// Pre-warm the embedding model; call after the MCP handshake completes
/// (spec §5). Idempotent.
pub fn prewarm(model_name: &str) {
    let _ = model(model_name);
}

/// Convenience wrapper used throughout the engine/search modules.
#[must_use]
pub fn embed(model_name: &str, text: &str) -> Vec<f32> {
    model(model_name).embed(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_is_deterministic() {
        let a = embed("local-hash-384", "build search engine");
        let b = embed("local-hash-384", "build search engine");
        assert_eq!(a, b);
    }

    #[test]
    fn embed_has_configured_dimension() {
        let v = embed("local-hash-384", "hello world");
        assert_eq!(v.len(), EMBEDDING_DIM);
    }

    #[test]
    fn similar_texts_are_closer_than_unrelated() {
        let a = embed("local-hash-384", "search engine ranking");
        let b = embed("local-hash-384", "search engine ranking improvements");
        let c = embed("local-hash-384", "zzz totally unrelated qqq");
        assert!(cosine_distance(&a, &b) < cosine_distance(&a, &c));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let v = embed("local-hash-384", "");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
