//! # Sequence-to-sequence fine-tuning
//!
//! Training configuration, the model seam implemented for `rust-bert`'s T5 model, greedy
//! generation for evaluation, checkpoint rotation and the `Seq2SeqTrainer` fit loop.
//!
//! The default `Seq2SeqTrainingConfig` reproduces the reference English to German run:
//! - learning rate 2e-3 with linear decay, AdamW with weight decay 0.01
//! - batch size 128 for training and evaluation
//! - 40 epochs, evaluation with generation after every epoch
//! - mixed precision with dynamic loss scaling on CUDA devices
//! - at most 3 checkpoints kept in `german-english/`

mod checkpoint;
mod config;
mod grad_scaler;
mod model;
mod seq2seq_trainer;

pub use checkpoint::{
    CheckpointManager, LogEntry, TrainerState, CHECKPOINT_PREFIX, TRAINER_STATE_NAME,
    WEIGHTS_NAME,
};
pub use config::{EvaluationStrategy, Seq2SeqTrainingConfig, TranslationTaskConfig};
pub use grad_scaler::GradScaler;
pub use model::{
    greedy_generate, seq2seq_loss, tensor_to_rows, GenerationSettings, PretrainedT5,
    Seq2SeqModel,
};
pub use seq2seq_trainer::{linear_decay, Seq2SeqTrainer, TrainOutput};
