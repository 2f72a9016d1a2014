//! Beam search decoding.
//!
//! Model-agnostic: the caller supplies a step function that maps a decoded
//! prefix to log-probabilities over the vocabulary for the next token. Greedy
//! decoding is the `num_beams == 1` case.

/// Token id type.
pub type TokenId = u32;

/// Beam search settings.
#[derive(Debug, Clone, Copy)]
pub struct BeamConfig {
    /// Number of hypotheses kept per step.
    pub num_beams: usize,

    /// Maximum number of generated tokens, excluding the start token.
    pub max_length: usize,

    /// Token that starts every hypothesis.
    pub start_token: TokenId,

    /// Token that finishes a hypothesis.
    pub eos_token: TokenId,
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<TokenId>,
    score: f32,
}

impl Hypothesis {
    /// Length-normalised score used to rank finished hypotheses.
    fn normalized(&self) -> f32 {
        self.score / self.tokens.len().max(1) as f32
    }
}

/// Run beam search and return the generated tokens of the best hypothesis.
///
/// The returned sequence excludes the start token and the end-of-sequence token.
pub fn beam_search<F, E>(config: BeamConfig, mut step: F) -> Result<Vec<TokenId>, E>
where
    F: FnMut(&[TokenId]) -> Result<Vec<f32>, E>,
{
    let num_beams = config.num_beams.max(1);
    let mut live = vec![Hypothesis {
        tokens: vec![config.start_token],
        score: 0.0,
    }];
    let mut finished: Vec<Hypothesis> = Vec::new();

    for _ in 0..config.max_length {
        let mut candidates: Vec<Hypothesis> = Vec::with_capacity(live.len() * num_beams);

        for hyp in &live {
            let log_probs = step(&hyp.tokens)?;
            for (token, log_prob) in top_k(&log_probs, num_beams) {
                let mut tokens = hyp.tokens.clone();
                tokens.push(token);
                candidates.push(Hypothesis {
                    tokens,
                    score: hyp.score + log_prob,
                });
            }
        }

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        live.clear();
        for cand in candidates {
            if live.len() >= num_beams {
                break;
            }
            if cand.tokens.last() == Some(&config.eos_token) {
                finished.push(cand);
            } else {
                live.push(cand);
            }
        }

        // Stop once no live hypothesis can still beat the best finished one.
        // Scores only decrease, so a live score normalised by the longest
        // reachable length bounds what that hypothesis can still rank at.
        if let Some(best_finished) = finished.iter().map(Hypothesis::normalized).reduce(f32::max) {
            let longest = (config.max_length + 1) as f32;
            if live.iter().all(|h| h.score / longest < best_finished) {
                break;
            }
        }
        if live.is_empty() {
            break;
        }
    }

    finished.extend(live);
    let best = finished
        .into_iter()
        .max_by(|a, b| a.normalized().total_cmp(&b.normalized()));

    Ok(best
        .map(|h| {
            h.tokens
                .into_iter()
                .skip(1)
                .filter(|&t| t != config.eos_token)
                .collect()
        })
        .unwrap_or_default())
}

/// Indices and values of the `k` largest entries, highest first.
fn top_k(values: &[f32], k: usize) -> Vec<(TokenId, f32)> {
    let mut indexed: Vec<(TokenId, f32)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| (i as TokenId, v))
        .collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);
    indexed
}
