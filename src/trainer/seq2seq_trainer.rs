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
use crate::data::{DataLoader, Seq2SeqCollator, Seq2SeqTokenizer, TokenizedDataset};
use crate::metrics::{EvaluationResult, MetricEvaluator, ModelPredictions};
use crate::trainer::checkpoint::{CheckpointManager, LogEntry, TrainerState};
use crate::trainer::config::{EvaluationStrategy, Seq2SeqTrainingConfig};
use crate::trainer::grad_scaler::GradScaler;
use crate::trainer::model::{
    greedy_generate, seq2seq_loss, tensor_to_rows, GenerationSettings, Seq2SeqModel,
};
use tch::nn::OptimizerConfig;
use tch::{nn, Device};
use tracing::{debug, info, warn};

/// # Summary of a completed training run
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub global_step: usize,
    /// Mean training loss over the optimization steps with a finite loss
    pub training_loss: f64,
    pub log_history: Vec<LogEntry>,
}

/// Learning rate decayed linearly from `base_learning_rate` at step 0 to 0 at `total_steps`.
pub fn linear_decay(base_learning_rate: f64, step: usize, total_steps: usize) -> f64 {
    if total_steps == 0 {
        return base_learning_rate;
    }
    let remaining = total_steps.saturating_sub(step) as f64 / total_steps as f64;
    base_learning_rate * remaining
}

/// # Sequence-to-sequence fine-tuning loop
/// Owns the model and its variable store for the duration of training. Each epoch goes through a
/// shuffled pass over the training set with AdamW updates (with dynamic loss scaling under mixed
/// precision), then (depending on the evaluation
/// strategy) an evaluation pass computing BLEU and the generated length, and finally a checkpoint.
///
/// Any failure (tensor error, invalid batch, metric error, IO error while checkpointing) stops
/// training and is returned to the caller.
///
/// # Example
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// use rust_bert::resources::RemoteResource;
/// use rust_bert::t5::{T5ConfigResources, T5ModelResources, T5VocabResources};
/// use tch::Device;
/// use translation_finetune::data::{t5_tokenizer_from_resource, Corpus, TranslationPreprocessor};
/// use translation_finetune::trainer::{PretrainedT5, Seq2SeqTrainer, Seq2SeqTrainingConfig};
///
/// let tokenizer = t5_tokenizer_from_resource(&RemoteResource::from_pretrained(
///     T5VocabResources::T5_SMALL,
/// ))?;
/// let split = Corpus::from_jsonl("path/to/opus_books_de_en.jsonl")?.train_test_split(0.2, 42)?;
/// let preprocessor = TranslationPreprocessor::default();
/// let train_dataset = preprocessor.map(&tokenizer, &split.train, 1000)?;
/// let eval_dataset = preprocessor.map(&tokenizer, &split.test, 1000)?;
///
/// let pretrained = PretrainedT5::from_resources(
///     &RemoteResource::from_pretrained(T5ConfigResources::T5_SMALL),
///     &RemoteResource::from_pretrained(T5ModelResources::T5_SMALL),
///     Device::cuda_if_available(),
/// )?;
/// let mut trainer = Seq2SeqTrainer::new(
///     pretrained.model,
///     pretrained.var_store,
///     &tokenizer,
///     Seq2SeqTrainingConfig::default(),
///     train_dataset,
///     Some(eval_dataset),
/// )?;
/// let output = trainer.train()?;
/// println!("Trained for {} steps", output.global_step);
/// # Ok(())
/// # }
/// ```
pub struct Seq2SeqTrainer<'a, M, T>
where
    M: Seq2SeqModel,
    T: Seq2SeqTokenizer + ?Sized,
{
    model: M,
    var_store: nn::VarStore,
    tokenizer: &'a T,
    config: Seq2SeqTrainingConfig,
    train_dataset: TokenizedDataset,
    eval_dataset: Option<TokenizedDataset>,
    collator: Seq2SeqCollator,
    checkpoints: CheckpointManager,
    state: TrainerState,
}

impl<'a, M, T> Seq2SeqTrainer<'a, M, T>
where
    M: Seq2SeqModel,
    T: Seq2SeqTokenizer + ?Sized,
{
    /// Creates a trainer. `model` must have been built on the `var_store` root so that its
    /// variables are the ones optimized and checkpointed.
    pub fn new(
        model: M,
        var_store: nn::VarStore,
        tokenizer: &'a T,
        config: Seq2SeqTrainingConfig,
        train_dataset: TokenizedDataset,
        eval_dataset: Option<TokenizedDataset>,
    ) -> Result<Seq2SeqTrainer<'a, M, T>, FineTuneError> {
        config.validate()?;
        if train_dataset.is_empty() {
            return Err(FineTuneError::ValueError(
                "The training dataset is empty".to_string(),
            ));
        }
        if config.evaluation_strategy == EvaluationStrategy::Epoch && eval_dataset.is_none() {
            return Err(FineTuneError::InvalidConfigurationError(
                "Evaluating every epoch requires an evaluation dataset".to_string(),
            ));
        }
        let collator = Seq2SeqCollator::new(tokenizer, var_store.device());
        let checkpoints = CheckpointManager::new(&config.output_dir, config.save_total_limit);

        Ok(Seq2SeqTrainer {
            model,
            var_store,
            tokenizer,
            config,
            train_dataset,
            eval_dataset,
            collator,
            checkpoints,
            state: TrainerState::default(),
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.var_store
    }

    pub fn state(&self) -> &TrainerState {
        &self.state
    }

    pub fn checkpoint_manager(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Releases the trained model and its variables
    pub fn into_parts(self) -> (M, nn::VarStore) {
        (self.model, self.var_store)
    }

    fn uses_autocast(&self) -> bool {
        self.config.fp16 && self.var_store.device().is_cuda()
    }

    /// Runs the fit loop for the configured number of epochs.
    pub fn train(&mut self) -> Result<TrainOutput, FineTuneError> {
        let device = self.var_store.device();
        let autocast = self.uses_autocast();
        if self.config.fp16 && !autocast {
            warn!(
                "Mixed precision is only available on CUDA devices, training on {:?} in full precision",
                device
            );
        }

        let mut optimizer = nn::AdamW::default()
            .beta1(0.9)
            .beta2(0.999)
            .wd(self.config.weight_decay)
            .build(&self.var_store, self.config.learning_rate)?;

        let mut scaler = GradScaler::new(autocast);
        let trainable_variables = self.var_store.trainable_variables();

        let batch_size = self.config.per_device_train_batch_size;
        let steps_per_epoch = (self.train_dataset.len() + batch_size - 1) / batch_size;
        let total_steps = steps_per_epoch * self.config.num_train_epochs;
        info!(
            "Training on {} examples for {} epochs ({} optimization steps, batch size {})",
            self.train_dataset.len(),
            self.config.num_train_epochs,
            total_steps,
            batch_size
        );

        let mut total_loss = 0f64;
        let mut logging_loss = 0f64;
        let mut logging_count = 0usize;
        let mut counted_steps = 0usize;

        for epoch in 1..=self.config.num_train_epochs {
            let loader = DataLoader::shuffled(
                &self.train_dataset,
                &self.collator,
                batch_size,
                self.config.seed + epoch as i64,
            )?;
            for batch in loader {
                let batch = batch?;
                let learning_rate =
                    linear_decay(self.config.learning_rate, self.state.global_step, total_steps);
                optimizer.set_lr(learning_rate);

                let model = &self.model;
                let loss = tch::autocast(autocast, || {
                    let logits = model.forward_t(
                        &batch.input_ids,
                        &batch.attention_mask,
                        &batch.decoder_input_ids,
                        true,
                    );
                    seq2seq_loss(&logits, &batch.labels)
                });
                let loss_value = loss.double_value(&[]);
                if !loss_value.is_finite() && !scaler.is_enabled() {
                    return Err(FineTuneError::ValueError(format!(
                        "Training loss diverged at step {}",
                        self.state.global_step + 1
                    )));
                }

                optimizer.zero_grad();
                scaler.scale_loss(&loss).backward();
                let found_non_finite =
                    scaler.unscale(&trainable_variables)? || !loss_value.is_finite();
                if found_non_finite {
                    warn!(
                        "Non-finite gradients at step {}, skipping update (loss scale {})",
                        self.state.global_step + 1,
                        scaler.scale()
                    );
                } else {
                    optimizer.clip_grad_norm(self.config.max_grad_norm);
                    optimizer.step();
                }
                scaler.update(found_non_finite);
                self.state.global_step += 1;
                if found_non_finite {
                    continue;
                }

                total_loss += loss_value;
                counted_steps += 1;
                logging_loss += loss_value;
                logging_count += 1;

                if self.config.logging_steps > 0
                    && self.state.global_step % self.config.logging_steps == 0
                {
                    let mean_loss = round_to(logging_loss / logging_count as f64, 4);
                    debug!(
                        "epoch {} step {}: loss {} (lr {:e})",
                        epoch, self.state.global_step, mean_loss, learning_rate
                    );
                    self.state.log_history.push(LogEntry {
                        epoch,
                        step: self.state.global_step,
                        loss: Some(mean_loss),
                        learning_rate: Some(learning_rate),
                        eval: None,
                    });
                    logging_loss = 0.0;
                    logging_count = 0;
                }
            }
            self.state.epoch = epoch;

            if self.config.evaluation_strategy == EvaluationStrategy::Epoch {
                let metrics = self.evaluate()?;
                info!("epoch {}: {:?}", epoch, metrics.to_map());
                self.state.log_history.push(LogEntry {
                    epoch,
                    step: self.state.global_step,
                    loss: None,
                    learning_rate: None,
                    eval: Some(metrics),
                });
            }
            self.checkpoints.save(&self.var_store, &self.state)?;
        }

        let training_loss = if counted_steps > 0 {
            total_loss / counted_steps as f64
        } else {
            0.0
        };
        info!(
            "Training completed after {} steps, mean loss {:.4}",
            self.state.global_step, training_loss
        );
        Ok(TrainOutput {
            global_step: self.state.global_step,
            training_loss,
            log_history: self.state.log_history.clone(),
        })
    }

    /// Runs a full pass over the evaluation set and computes the evaluation loss, BLEU and the
    /// mean generated length.
    pub fn evaluate(&self) -> Result<EvaluationResult, FineTuneError> {
        let eval_dataset = self.eval_dataset.as_ref().ok_or_else(|| {
            FineTuneError::ValueError("No evaluation dataset was provided".to_string())
        })?;
        if eval_dataset.is_empty() {
            return Err(FineTuneError::EmptyPredictions);
        }
        let settings = GenerationSettings {
            max_length: self.config.generation_max_length,
            decoder_start_id: self.collator.decoder_start_id,
            eos_id: self.tokenizer.eos_id(),
            pad_id: self.tokenizer.pad_id(),
        };
        let autocast = self.uses_autocast();

        let mut sequences = Vec::with_capacity(eval_dataset.len());
        let mut auxiliary = Vec::new();
        let mut labels = Vec::with_capacity(eval_dataset.len());
        let mut loss_sum = 0f64;

        tch::no_grad(|| -> Result<(), FineTuneError> {
            let loader = DataLoader::sequential(
                eval_dataset,
                &self.collator,
                self.config.per_device_eval_batch_size,
            );
            for batch in loader {
                let batch = batch?;
                let logits = tch::autocast(autocast, || {
                    self.model.forward_t(
                        &batch.input_ids,
                        &batch.attention_mask,
                        &batch.decoder_input_ids,
                        false,
                    )
                });
                loss_sum += seq2seq_loss(&logits, &batch.labels).double_value(&[])
                    * batch.batch_size() as f64;

                if self.config.predict_with_generate {
                    let generated = tch::autocast(autocast, || {
                        greedy_generate(
                            &self.model,
                            &batch.input_ids,
                            &batch.attention_mask,
                            &settings,
                        )
                    })?;
                    sequences.extend(generated);
                } else {
                    sequences.extend(tensor_to_rows(&logits.argmax(-1, false))?);
                    auxiliary.push(logits.to_device(Device::Cpu));
                }
                labels.extend(batch.label_ids);
            }
            Ok(())
        })?;

        let predictions = if self.config.predict_with_generate {
            ModelPredictions::Sequences(sequences)
        } else {
            ModelPredictions::WithAuxiliary {
                sequences,
                auxiliary,
            }
        };
        let mut metrics = MetricEvaluator::new(self.tokenizer).compute(predictions, &labels)?;
        metrics.eval_loss = Some(round_to(loss_sum / labels.len() as f64, 4));
        Ok(metrics)
    }
}
