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

use crate::common::error::FineTuneError;
use crate::common::round_to;
use crate::data::{resolve_labels, LabelId, Seq2SeqTokenizer};
use crate::metrics::bleu::corpus_bleu;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tch::Tensor;

const METRIC_DECIMALS: i32 = 4;

/// # Output of the model for an evaluation pass
/// Generation returns token ids only. Without generation, the arg-max token ids are returned
/// together with the raw logits they were computed from.
#[derive(Debug)]
pub enum ModelPredictions {
    /// Generated token ids, one sequence per example
    Sequences(Vec<Vec<i64>>),
    /// Token ids with auxiliary model outputs (per-batch logits of shape (*batch size*, *sequence_length*, *vocab_size*))
    WithAuxiliary {
        sequences: Vec<Vec<i64>>,
        auxiliary: Vec<Tensor>,
    },
}

impl ModelPredictions {
    pub fn sequences(&self) -> &[Vec<i64>] {
        match self {
            ModelPredictions::Sequences(sequences) => sequences,
            ModelPredictions::WithAuxiliary { sequences, .. } => sequences,
        }
    }

    pub fn into_sequences(self) -> Vec<Vec<i64>> {
        match self {
            ModelPredictions::Sequences(sequences) => sequences,
            ModelPredictions::WithAuxiliary { sequences, .. } => sequences,
        }
    }

    pub fn len(&self) -> usize {
        self.sequences().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// # Metrics computed at an evaluation checkpoint
/// All values are rounded to 4 decimals.
pub struct EvaluationResult {
    /// Corpus BLEU (0-100)
    pub bleu: f64,
    /// Mean number of non-padding tokens per prediction
    pub gen_len: f64,
    /// Mean evaluation loss, when computed by the trainer
    pub eval_loss: Option<f64>,
}

impl EvaluationResult {
    /// Metric name to value mapping, as reported in logs and trainer state files
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("bleu".to_string(), self.bleu);
        metrics.insert("gen_len".to_string(), self.gen_len);
        if let Some(eval_loss) = self.eval_loss {
            metrics.insert("eval_loss".to_string(), eval_loss);
        }
        metrics
    }
}

/// Trims predictions and references, and wraps each reference in its own list (BLEU accepts
/// several references per prediction).
///
/// # Example
///
/// ```
/// use translation_finetune::metrics::postprocess_text;
/// let (predictions, references) = postprocess_text(&["  hi  "], &["  hallo  "]);
/// assert_eq!(predictions, vec!["hi".to_string()]);
/// assert_eq!(references, vec![vec!["hallo".to_string()]]);
/// ```
pub fn postprocess_text<S, R>(predictions: &[S], labels: &[R]) -> (Vec<String>, Vec<Vec<String>>)
where
    S: AsRef<str>,
    R: AsRef<str>,
{
    let predictions = predictions
        .iter()
        .map(|prediction| prediction.as_ref().trim().to_string())
        .collect();
    let labels = labels
        .iter()
        .map(|label| vec![label.as_ref().trim().to_string()])
        .collect();
    (predictions, labels)
}

/// Mean number of non-padding tokens per sequence.
///
/// # Errors
///
/// `FineTuneError::EmptyPredictions` for an empty set of sequences.
pub fn generated_length(sequences: &[Vec<i64>], pad_id: i64) -> Result<f64, FineTuneError> {
    if sequences.is_empty() {
        return Err(FineTuneError::EmptyPredictions);
    }
    let total = sequences
        .iter()
        .map(|sequence| sequence.iter().filter(|&&token| token != pad_id).count())
        .sum::<usize>();
    Ok(total as f64 / sequences.len() as f64)
}

/// # Translation metrics computation
/// Decodes predictions and labels with the tokenizer, computes corpus BLEU and the mean
/// generated length.
pub struct MetricEvaluator<'a, T: Seq2SeqTokenizer + ?Sized> {
    tokenizer: &'a T,
}

impl<'a, T: Seq2SeqTokenizer + ?Sized> MetricEvaluator<'a, T> {
    pub fn new(tokenizer: &'a T) -> MetricEvaluator<'a, T> {
        MetricEvaluator { tokenizer }
    }

    /// Computes BLEU and the mean generated length for one evaluation pass.
    ///
    /// # Arguments
    ///
    /// * `predictions` - model output for every evaluation example
    /// * `labels` - reference label ids for every evaluation example, possibly padded with ignored positions
    ///
    /// # Returns
    ///
    /// * `EvaluationResult` with `bleu` and `gen_len` rounded to 4 decimals (`eval_loss` is left empty)
    pub fn compute(
        &self,
        predictions: ModelPredictions,
        labels: &[Vec<LabelId>],
    ) -> Result<EvaluationResult, FineTuneError> {
        let predictions = predictions.into_sequences();
        if predictions.is_empty() {
            return Err(FineTuneError::EmptyPredictions);
        }
        if predictions.len() != labels.len() {
            return Err(FineTuneError::ValueError(format!(
                "Got {} predictions for {} labels",
                predictions.len(),
                labels.len()
            )));
        }
        let pad_id = self.tokenizer.pad_id();

        let decoded_predictions = self.tokenizer.batch_decode(&predictions, true);
        let resolved_labels = labels
            .iter()
            .map(|label| resolve_labels(label, pad_id))
            .collect::<Vec<Vec<i64>>>();
        let decoded_labels = self.tokenizer.batch_decode(&resolved_labels, true);

        let (decoded_predictions, decoded_labels) =
            postprocess_text(&decoded_predictions, &decoded_labels);

        let bleu = corpus_bleu(&decoded_predictions, &decoded_labels)?;
        let gen_len = generated_length(&predictions, pad_id)?;

        Ok(EvaluationResult {
            bleu: round_to(bleu.score, METRIC_DECIMALS),
            gen_len: round_to(gen_len, METRIC_DECIMALS),
            eval_loss: None,
        })
    }
}
