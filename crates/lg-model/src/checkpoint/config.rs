use std::io::Read;

use crate::error::Result;

/// Model hyperparameters, parsed from the 7 little-endian `i32` header at the
/// start of a checkpoint file.
///
/// A negative `vocab_size` in the file means the classifier weights are
/// stored unshared (a trailing `wcls` tensor follows `freq_cis_imag`); a
/// positive value means the token embedding table doubles as the classifier.
/// `CheckpointConfig::vocab_size` is always the absolute value; callers check
/// `shared_weights` instead.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointConfig {
    pub dim: usize,
    pub hidden_dim: usize,
    pub n_layers: usize,
    pub n_heads: usize,
    pub n_kv_heads: usize,
    pub vocab_size: usize,
    pub seq_len: usize,
    pub shared_weights: bool,
}

impl CheckpointConfig {
    pub const HEADER_BYTES: usize = 7 * 4;

    pub fn parse(reader: &mut impl Read) -> Result<CheckpointConfig> {
        let mut raw = [0i32; 7];
        for slot in raw.iter_mut() {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            *slot = i32::from_le_bytes(buf);
        }

        let [dim, hidden_dim, n_layers, n_heads, n_kv_heads, vocab_size_raw, seq_len] = raw;

        Ok(CheckpointConfig {
            dim: dim as usize,
            hidden_dim: hidden_dim as usize,
            n_layers: n_layers as usize,
            n_heads: n_heads as usize,
            n_kv_heads: n_kv_heads as usize,
            vocab_size: vocab_size_raw.unsigned_abs() as usize,
            seq_len: seq_len as usize,
            shared_weights: vocab_size_raw > 0,
        })
    }

    pub fn head_dim(&self) -> usize {
        self.dim / self.n_heads
    }

    pub fn kv_dim(&self) -> usize {
        self.n_kv_heads * self.head_dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(fields: [i32; 7]) -> Vec<u8> {
        fields.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn parses_shared_weights() {
        let bytes = encode([288, 768, 6, 6, 6, 32000, 256]);
        let cfg = CheckpointConfig::parse(&mut bytes.as_slice()).unwrap();
        assert_eq!(cfg.dim, 288);
        assert_eq!(cfg.vocab_size, 32000);
        assert!(cfg.shared_weights);
        assert_eq!(cfg.head_dim(), 48);
    }

    #[test]
    fn negative_vocab_size_means_unshared() {
        let bytes = encode([288, 768, 6, 6, 6, -32000, 256]);
        let cfg = CheckpointConfig::parse(&mut bytes.as_slice()).unwrap();
        assert_eq!(cfg.vocab_size, 32000);
        assert!(!cfg.shared_weights);
    }
}
