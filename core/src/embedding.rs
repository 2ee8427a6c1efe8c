use sha2::{Digest, Sha256};

pub fn deterministic_embedding(text: &str, model_id: &str, dims: usize) -> Vec<f32> {
    deterministic_embedding_bytes(text.as_bytes(), model_id, dims)
}

/// Same derivation as [`deterministic_embedding`] over raw bytes (image files).
pub fn deterministic_embedding_bytes(content: &[u8], model_id: &str, dims: usize) -> Vec<f32> {
    let dims = dims.max(1);

    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(content);
    let seed = hasher.finalize();

    // Re-hash per 32-byte block so that wide vectors do not repeat one digest.
    let mut out = Vec::with_capacity(dims);
    let mut block = 0u32;
    while out.len() < dims {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(block.to_le_bytes());
        let digest = hasher.finalize();
        for byte in digest.iter().take(dims - out.len()) {
            out.push((*byte as f32 / 127.5) - 1.0);
        }
        block += 1;
    }

    out
}

pub fn zero_embedding(dims: usize) -> Vec<f32> {
    vec![0.0; dims]
}
