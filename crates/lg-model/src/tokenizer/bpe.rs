use super::vocab::Vocab;

/// SentencePiece-style byte-pair-encoding tokenizer, loaded from a
/// `tokenizer.bin` vocabulary of (token, score) pairs.
///
/// Unlike a merge-rank list, there is no separate merge table: the "can these
/// two tokens merge" question is answered by looking up the concatenated
/// string directly in the vocabulary, and ties between simultaneously
/// mergeable pairs are broken by comparing the merged token's own score.
pub struct BpeTokenizer {
    pub vocab: Vocab,
    bos_id: u32,
    eos_id: u32,
}

impl BpeTokenizer {
    pub fn new(vocab: Vocab, bos_id: u32, eos_id: u32) -> BpeTokenizer {
        BpeTokenizer { vocab, bos_id, eos_id }
    }

    pub fn bos_id(&self) -> u32 {
        self.bos_id
    }

    pub fn eos_id(&self) -> u32 {
        self.eos_id
    }

    /// Encode `text` into token ids, greedily merging the highest-scoring
    /// adjacent pair at each step until no pair in the vocabulary applies.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut pieces: Vec<String> = Vec::new();
        for ch in text.chars() {
            let s = ch.to_string();
            if self.vocab.id_of(&s).is_some() {
                pieces.push(s);
            } else {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).as_bytes() {
                    pieces.push(format!("<0x{:02X}>", byte));
                }
            }
        }

        loop {
            if pieces.len() < 2 {
                break;
            }

            let mut best_score = f32::NEG_INFINITY;
            let mut best_idx = None;
            let mut best_id = 0u32;

            for i in 0..pieces.len() - 1 {
                let merged = format!("{}{}", pieces[i], pieces[i + 1]);
                if let Some(id) = self.vocab.id_of(&merged) {
                    let score = self.vocab.scores[id as usize];
                    if score > best_score {
                        best_score = score;
                        best_idx = Some(i);
                        best_id = id;
                    }
                }
            }

            let Some(idx) = best_idx else { break };
            let _ = best_id;
            let merged = format!("{}{}", pieces[idx], pieces[idx + 1]);
            pieces[idx] = merged;
            pieces.remove(idx + 1);
        }

        pieces.iter().filter_map(|p| self.vocab.id_of(p)).collect()
    }

    /// Single-token piece for streaming output, matching the per-token
    /// logic `decode` applies when walking a full sequence: BOS-leading-space
    /// stripping keyed off `prev`, and `<0xHH>` byte-fallback conversion.
    pub fn piece_for(&self, prev: u32, id: u32) -> String {
        let idx = id as usize;
        if idx >= self.vocab.tokens.len() {
            return String::new();
        }
        let mut piece: &str = &self.vocab.tokens[idx];

        if prev == self.bos_id && piece.starts_with(' ') {
            piece = &piece[1..];
        }

        if piece.len() == 6 && piece.starts_with("<0x") && piece.ends_with('>') {
            if let Ok(byte_val) = u8::from_str_radix(&piece[3..5], 16) {
                return String::from_utf8_lossy(&[byte_val]).into_owned();
            }
        }

        piece.to_string()
    }

    /// Decode token ids to text. Byte-fallback tokens of the form `<0xHH>`
    /// are converted back to the raw byte. If the previous token was BOS and
    /// the next piece begins with a leading space, that space is stripped
    /// (SentencePiece always emits a leading space after BOS which is not
    /// part of the original text).
    pub fn decode(&self, tokens: &[u32]) -> String {
        let mut bytes: Vec<u8> = Vec::new();
        let mut prev: Option<u32> = None;

        for &id in tokens {
            let idx = id as usize;
            if idx >= self.vocab.tokens.len() {
                prev = Some(id);
                continue;
            }
            let mut piece: &str = &self.vocab.tokens[idx];

            if prev == Some(self.bos_id) && piece.starts_with(' ') {
                piece = &piece[1..];
            }

            if piece.len() == 6 && piece.starts_with("<0x") && piece.ends_with('>') {
                if let Ok(byte_val) = u8::from_str_radix(&piece[3..5], 16) {
                    bytes.push(byte_val);
                    prev = Some(id);
                    continue;
                }
            }

            bytes.extend_from_slice(piece.as_bytes());
            prev = Some(id);
        }

        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn toy_vocab() -> Vocab {
        let tokens = vec![
            "<unk>".to_string(),
            "<s>".to_string(),
            "</s>".to_string(),
            " ".to_string(),
            "h".to_string(),
            "i".to_string(),
            "hi".to_string(),
        ];
        let scores = vec![0.0, 0.0, 0.0, 0.0, -1.0, -1.0, 0.5];
        let mut token_to_id = HashMap::new();
        for (id, t) in tokens.iter().enumerate() {
            token_to_id.insert(t.clone(), id as u32);
        }
        Vocab { max_token_length: 8, tokens, scores, token_to_id }
    }

    #[test]
    fn encode_merges_highest_scoring_pair() {
        let tok = BpeTokenizer::new(toy_vocab(), 1, 2);
        let ids = tok.encode("hi");
        assert_eq!(ids, vec![6]);
    }

    #[test]
    fn decode_strips_leading_space_after_bos() {
        let tok = BpeTokenizer::new(toy_vocab(), 1, 2);
        let text = tok.decode(&[1, 3, 4]);
        assert_eq!(text, "h");
    }

    #[test]
    fn decode_keeps_space_when_not_after_bos() {
        let tok = BpeTokenizer::new(toy_vocab(), 1, 2);
        let text = tok.decode(&[4, 3, 5]);
        assert_eq!(text, "h i");
    }
}
