//! Binary codec for embeddings stored as a BLOB in the metadata store: a
//! flat little-endian `f32` array, no length prefix (the column carries no
//! other variable-length payload, so the byte count alone determines the
//! dimension).

pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_vector() {
        let vector = vec![1.0_f32, -2.5, 0.0, 3.14159];
        let encoded = encode_embedding(&vector);
        let decoded = decode_embedding(&encoded);
        assert_eq!(decoded, vector);
    }

    #[test]
    fn empty_vector_round_trips() {
        assert!(decode_embedding(&encode_embedding(&[])).is_empty());
    }
}
