use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

/// Token vocabulary loaded from a `tokenizer.bin` file: a `u32`
/// `max_token_length`, then for each vocab entry (in id order) an `f32`
/// merge score, an `i32` byte length, and that many raw bytes.
pub struct Vocab {
    pub max_token_length: u32,
    pub tokens: Vec<String>,
    pub scores: Vec<f32>,
    pub token_to_id: HashMap<String, u32>,
}

impl Vocab {
    pub fn load(path: &Path, vocab_size: usize) -> Result<Vocab> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);

        let mut buf4 = [0u8; 4];
        reader.read_exact(&mut buf4)?;
        let max_token_length = u32::from_le_bytes(buf4);

        let mut tokens = Vec::with_capacity(vocab_size);
        let mut scores = Vec::with_capacity(vocab_size);
        let mut token_to_id = HashMap::with_capacity(vocab_size);

        for id in 0..vocab_size {
            reader.read_exact(&mut buf4)?;
            let score = f32::from_le_bytes(buf4);

            reader.read_exact(&mut buf4)?;
            let byte_len = i32::from_le_bytes(buf4);
            let byte_len = usize::try_from(byte_len).map_err(|_| {
                crate::error::ModelError::InvalidTokenizer(format!("negative token length at id {}", id))
            })?;

            let mut bytes = vec![0u8; byte_len];
            reader.read_exact(&mut bytes)?;
            let token = String::from_utf8_lossy(&bytes).into_owned();

            token_to_id.insert(token.clone(), id as u32);
            tokens.push(token);
            scores.push(score);
        }

        Ok(Vocab {
            max_token_length,
            tokens,
            scores,
            token_to_id,
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn id_of(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }
}
