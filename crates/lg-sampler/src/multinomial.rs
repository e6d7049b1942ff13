/// Inverse-CDF draw over an already softmax-normalized distribution.
/// Returns `n-1` if rounding leaves `r` past the end of the accumulated mass.
pub fn sample(probs: &[f32], r: f32) -> usize {
    let mut cumulative = 0.0f32;
    for (i, &p) in probs.iter().enumerate() {
        cumulative += p;
        if r < cumulative {
            return i;
        }
    }
    probs.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_index_whose_cdf_exceeds_draw() {
        let probs = vec![0.2, 0.3, 0.5];
        assert_eq!(sample(&probs, 0.1), 0);
        assert_eq!(sample(&probs, 0.25), 1);
        assert_eq!(sample(&probs, 0.9), 2);
    }

    #[test]
    fn rounding_past_end_returns_last_index() {
        let probs = vec![0.3, 0.3, 0.3];
        assert_eq!(sample(&probs, 0.999), 2);
    }
}
