// Copyright 2020 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Corpus-level BLEU following the sacreBLEU defaults: `13a` tokenization, n-grams up to order 4,
//! exponential smoothing of zero-match orders, brevity penalty on the closest reference length
//! and scores reported on a 0-100 scale.

use crate::common::error::FineTuneError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MAX_NGRAM_ORDER: usize = 4;

lazy_static! {
    static ref TOKENIZATION_RULES: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"([{-~\[-` -&(-+:-@/])").unwrap(), " ${1} "),
        (Regex::new(r"([^0-9])([\.,])").unwrap(), "${1} ${2} "),
        (Regex::new(r"([\.,])([^0-9])").unwrap(), " ${1} ${2}"),
        (Regex::new(r"([0-9])(-)").unwrap(), "${1} ${2} "),
    ];
}

/// Splits a sentence following the `mteval-v13a` rules (punctuation split from words, periods
/// and commas kept inside numbers).
pub fn tokenize_13a(line: &str) -> Vec<String> {
    let mut line = line
        .replace("<skipped>", "")
        .replace("-\n", "")
        .replace('\n', " ");
    if line.contains('&') {
        line = line
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");
    }
    let mut line = format!(" {} ", line);
    for (pattern, replacement) in TOKENIZATION_RULES.iter() {
        line = pattern.replace_all(&line, *replacement).into_owned();
    }
    line.split_whitespace().map(str::to_string).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// # Corpus BLEU result with its sufficient statistics
pub struct BleuScore {
    /// BLEU score on a 0-100 scale
    pub score: f64,
    /// Clipped n-gram matches for orders 1 to 4
    pub counts: [usize; MAX_NGRAM_ORDER],
    /// Hypothesis n-grams for orders 1 to 4
    pub totals: [usize; MAX_NGRAM_ORDER],
    /// Smoothed n-gram precisions (percentages)
    pub precisions: [f64; MAX_NGRAM_ORDER],
    pub brevity_penalty: f64,
    /// Total hypothesis length in tokens
    pub sys_len: usize,
    /// Total closest-reference length in tokens
    pub ref_len: usize,
}

fn ngram_counts(tokens: &[String], max_order: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    for order in 1..=max_order {
        for window in tokens.windows(order) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

fn closest_reference_length(hypothesis_length: usize, references: &[Vec<String>]) -> usize {
    references
        .iter()
        .map(Vec::len)
        .min_by_key(|&length| {
            (
                (length as isize - hypothesis_length as isize).unsigned_abs(),
                length,
            )
        })
        .unwrap_or(0)
}

fn smoothed_log(value: f64) -> f64 {
    if value == 0.0 {
        -9_999_999_999.0
    } else {
        value.ln()
    }
}

/// Computes corpus BLEU for a set of hypotheses, each paired with one or more references.
///
/// Statistics are accumulated over the full corpus before the score is computed: reordering
/// (hypothesis, references) pairs jointly does not change the result.
///
/// # Arguments
///
/// * `hypotheses` - system outputs
/// * `references` - for each hypothesis, the list of its reference translations
///
/// # Example
///
/// ```
/// use translation_finetune::metrics::corpus_bleu;
/// # fn main() -> Result<(), translation_finetune::FineTuneError> {
/// let hypotheses = vec!["Das ist ein kleiner Test .".to_string()];
/// let references = vec![vec!["Das ist ein kleiner Test .".to_string()]];
/// let bleu = corpus_bleu(&hypotheses, &references)?;
/// assert!((bleu.score - 100.0).abs() < 1e-9);
/// # Ok(())
/// # }
/// ```
pub fn corpus_bleu<S>(hypotheses: &[S], references: &[Vec<S>]) -> Result<BleuScore, FineTuneError>
where
    S: AsRef<str>,
{
    if hypotheses.len() != references.len() {
        return Err(FineTuneError::ValueError(format!(
            "Got {} hypotheses for {} reference sets",
            hypotheses.len(),
            references.len()
        )));
    }

    let mut counts = [0usize; MAX_NGRAM_ORDER];
    let mut totals = [0usize; MAX_NGRAM_ORDER];
    let mut sys_len = 0usize;
    let mut ref_len = 0usize;

    for (hypothesis, hypothesis_references) in hypotheses.iter().zip(references.iter()) {
        if hypothesis_references.is_empty() {
            return Err(FineTuneError::ValueError(
                "Every hypothesis needs at least one reference".to_string(),
            ));
        }
        let hypothesis_tokens = tokenize_13a(hypothesis.as_ref());
        let reference_tokens = hypothesis_references
            .iter()
            .map(|reference| tokenize_13a(reference.as_ref()))
            .collect::<Vec<Vec<String>>>();

        let mut max_reference_counts: HashMap<&[String], usize> = HashMap::new();
        for tokens in reference_tokens.iter() {
            for (ngram, count) in ngram_counts(tokens, MAX_NGRAM_ORDER) {
                let entry = max_reference_counts.entry(ngram).or_insert(0);
                *entry = (*entry).max(count);
            }
        }

        for (ngram, count) in ngram_counts(&hypothesis_tokens, MAX_NGRAM_ORDER) {
            let clipped = count.min(max_reference_counts.get(ngram).copied().unwrap_or(0));
            counts[ngram.len() - 1] += clipped;
        }
        for (order, total) in totals.iter_mut().enumerate() {
            *total += (hypothesis_tokens.len() + 1).saturating_sub(order + 1);
        }

        sys_len += hypothesis_tokens.len();
        ref_len += closest_reference_length(hypothesis_tokens.len(), &reference_tokens);
    }

    Ok(compute_bleu(counts, totals, sys_len, ref_len))
}

fn compute_bleu(
    counts: [usize; MAX_NGRAM_ORDER],
    totals: [usize; MAX_NGRAM_ORDER],
    sys_len: usize,
    ref_len: usize,
) -> BleuScore {
    let brevity_penalty = if sys_len < ref_len {
        if sys_len > 0 {
            (1.0 - ref_len as f64 / sys_len as f64).exp()
        } else {
            0.0
        }
    } else {
        1.0
    };

    let mut precisions = [0.0f64; MAX_NGRAM_ORDER];
    // No match at any order: the score is 0 and the precisions are left unsmoothed.
    if counts.iter().all(|&count| count == 0) {
        return BleuScore {
            score: 0.0,
            counts,
            totals,
            precisions,
            brevity_penalty,
            sys_len,
            ref_len,
        };
    }

    let mut smooth_mteval = 1.0;
    for order in 0..MAX_NGRAM_ORDER {
        if totals[order] == 0 {
            break;
        }
        precisions[order] = if counts[order] == 0 {
            smooth_mteval *= 2.0;
            100.0 / (smooth_mteval * totals[order] as f64)
        } else {
            100.0 * counts[order] as f64 / totals[order] as f64
        };
    }

    let mean_log =
        precisions.iter().map(|&p| smoothed_log(p)).sum::<f64>() / MAX_NGRAM_ORDER as f64;
    let score = brevity_penalty * mean_log.exp();

    BleuScore {
        score,
        counts,
        totals,
        precisions,
        brevity_penalty,
        sys_len,
        ref_len,
    }
}
