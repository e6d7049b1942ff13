/// One candidate in a nucleus-sampling scan: a token id paired with its
/// softmax probability.
#[derive(Debug, Clone, Copy)]
struct ProbIndex {
    prob: f32,
    index: u32,
}

/// Nucleus (top-p) sampling over an already softmax-normalized distribution.
///
/// Sorts descending by probability, keeps the smallest prefix whose
/// cumulative mass exceeds `topp`, then draws uniformly over that prefix's
/// cumulative range. Unlike the source this was distilled from, the sampled
/// index from the inverse-CDF draw is the final answer: nothing overwrites
/// it with `probindex[last_idx].index` afterward. That overwrite ignored the
/// draw entirely and always returned the nucleus's least-probable member; the
/// fallback below only fires on the genuine rounding-error path, when
/// float accumulation leaves the draw past the end of the scanned range.
pub fn sample_topp(probs: &[f32], topp: f32, r: f32) -> usize {
    debug_assert!((0.0..=1.0).contains(&topp) && topp > 0.0);

    let n = probs.len();
    let mut candidates: Vec<ProbIndex> = probs
        .iter()
        .enumerate()
        .map(|(i, &p)| ProbIndex { prob: p, index: i as u32 })
        .collect();
    candidates.sort_by(|a, b| b.prob.partial_cmp(&a.prob).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumulative = 0.0f32;
    let mut last_idx = n - 1;
    for (i, c) in candidates.iter().enumerate() {
        cumulative += c.prob;
        if cumulative > topp {
            last_idx = i;
            break;
        }
    }

    let draw = r * cumulative;
    let mut running = 0.0f32;
    for c in &candidates[..=last_idx] {
        running += c.prob;
        if draw < running {
            return c.index as usize;
        }
    }
    candidates[last_idx].index as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_smallest_prefix_exceeding_topp() {
        let probs = vec![0.5, 0.3, 0.1, 0.1];
        // r close to 0 should land in the highest-probability bucket.
        assert_eq!(sample_topp(&probs, 0.9, 0.0), 0);
    }

    #[test]
    fn draw_past_prefix_falls_back_to_last_idx() {
        let probs = vec![0.5, 0.3, 0.2];
        // r == 1.0 pushes the draw to the edge of the cumulative range.
        let idx = sample_topp(&probs, 0.8, 0.999_999);
        assert!(idx < probs.len());
    }

    #[test]
    fn single_candidate_is_always_chosen() {
        let probs = vec![1.0];
        assert_eq!(sample_topp(&probs, 0.9, 0.5), 0);
    }
}
