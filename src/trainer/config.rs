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
use crate::data::TranslationPreprocessor;
use rust_bert::Config;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Fallible counterpart of `Config::from_file`
fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, FineTuneError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// # Evaluation cadence of the trainer
pub enum EvaluationStrategy {
    /// Never evaluate during training
    No,
    /// Evaluate at the end of every epoch
    Epoch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// # Sequence-to-sequence training configuration
/// Hyper-parameters of the fine-tuning loop. The defaults reproduce the reference English to
/// German T5-small run; the learning rate and number of epochs in particular are expected to be
/// tuned for other model sizes.
///
/// The configuration can be read from a JSON file with `Seq2SeqTrainingConfig::load`, any missing
/// field taking its default value.
#[serde(default)]
pub struct Seq2SeqTrainingConfig {
    /// Directory receiving the checkpoints
    pub output_dir: PathBuf,
    pub evaluation_strategy: EvaluationStrategy,
    pub learning_rate: f64,
    pub per_device_train_batch_size: usize,
    pub per_device_eval_batch_size: usize,
    /// AdamW decoupled weight decay, applied to every trainable variable (layer norm weights and
    /// biases included)
    pub weight_decay: f64,
    /// Maximum number of checkpoints kept on disk (older ones are deleted), `None` keeps all
    pub save_total_limit: Option<usize>,
    pub num_train_epochs: usize,
    /// Generate translations at evaluation time (otherwise predictions are the arg-max of the teacher-forced logits)
    pub predict_with_generate: bool,
    /// Mixed precision with dynamic loss scaling (CUDA devices only)
    pub fp16: bool,
    /// Maximum length of generated sequences, decoder start token included
    pub generation_max_length: usize,
    /// Gradient norm clipping threshold
    pub max_grad_norm: f64,
    pub seed: i64,
    /// Number of optimization steps between two training loss log lines
    pub logging_steps: usize,
}

impl Config for Seq2SeqTrainingConfig {}

impl Default for Seq2SeqTrainingConfig {
    fn default() -> Self {
        Seq2SeqTrainingConfig {
            output_dir: PathBuf::from("german-english"),
            evaluation_strategy: EvaluationStrategy::Epoch,
            learning_rate: 2e-3,
            per_device_train_batch_size: 128,
            per_device_eval_batch_size: 128,
            weight_decay: 0.01,
            save_total_limit: Some(3),
            num_train_epochs: 40,
            predict_with_generate: true,
            fp16: true,
            generation_max_length: 20,
            max_grad_norm: 1.0,
            seed: 42,
            logging_steps: 50,
        }
    }
}

impl Seq2SeqTrainingConfig {
    /// Reads a JSON configuration file, missing fields taking their default value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Seq2SeqTrainingConfig, FineTuneError> {
        let config: Seq2SeqTrainingConfig = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the consistency of the configuration before training starts.
    pub fn validate(&self) -> Result<(), FineTuneError> {
        let invalid = |message: &str| {
            Err(FineTuneError::InvalidConfigurationError(
                message.to_string(),
            ))
        };
        if self.per_device_train_batch_size == 0 || self.per_device_eval_batch_size == 0 {
            return invalid("batch sizes must be strictly positive");
        }
        if self.num_train_epochs == 0 {
            return invalid("the number of training epochs must be strictly positive");
        }
        if !(self.learning_rate > 0.0) {
            return invalid("the learning rate must be strictly positive");
        }
        if self.weight_decay < 0.0 {
            return invalid("the weight decay must be positive");
        }
        if self.save_total_limit == Some(0) {
            return invalid("save_total_limit must be strictly positive when set");
        }
        if self.generation_max_length < 2 {
            return invalid("generation_max_length must leave room for at least one generated token");
        }
        if !(self.max_grad_norm > 0.0) {
            return invalid("max_grad_norm must be strictly positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// # Translation task settings
/// Language pair, instruction prefix and truncation lengths, together with the corpus split
/// parameters.
#[serde(default)]
pub struct TranslationTaskConfig {
    pub preprocessing: TranslationPreprocessor,
    /// Fraction of the corpus held out for evaluation
    pub test_size: f64,
    /// Seed of the train/test permutation
    pub split_seed: i64,
    /// Number of records tokenized per batch
    pub preprocessing_batch_size: usize,
}

impl Config for TranslationTaskConfig {}

impl TranslationTaskConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<TranslationTaskConfig, FineTuneError> {
        read_json(path)
    }
}

impl Default for TranslationTaskConfig {
    fn default() -> Self {
        TranslationTaskConfig {
            preprocessing: TranslationPreprocessor::default(),
            test_size: 0.2,
            split_seed: 42,
            preprocessing_batch_size: 1000,
        }
    }
}
