//! # Translation evaluation metrics
//!
//! Post-processing of decoded predictions and references, sacreBLEU-compatible corpus BLEU and
//! the mean generated length statistic reported after each evaluation pass.

mod bleu;
mod evaluator;

pub use bleu::{corpus_bleu, tokenize_13a, BleuScore, MAX_NGRAM_ORDER};
pub use evaluator::{
    generated_length, postprocess_text, EvaluationResult, MetricEvaluator, ModelPredictions,
};
