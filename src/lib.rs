//! Fine-tuning of pretrained sequence-to-sequence models for translation, built on
//! [rust-bert](https://github.com/guillaume-be/rust-bert) and
//! [tch-rs](https://github.com/LaurentMazare/tch-rs).
//!
//! The crate covers the full offline pipeline, from a bilingual corpus of sentence pairs to a
//! fine-tuned model evaluated with BLEU:
//! - `data`: corpus loading, seeded train/test split, prefix and tokenization of the source and
//!   target sentences, padding collator producing decoder inputs and masked labels
//! - `trainer`: training configuration, AdamW fit loop with linear learning rate decay, evaluation
//!   with greedy generation, checkpoint rotation
//! - `metrics`: corpus BLEU (13a tokenization, exponential smoothing) and mean generated length
//! - `plotting`: figure descriptions for exploratory analysis of tabular data and feature
//!   importances
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rust_bert::resources::RemoteResource;
//! use rust_bert::t5::{T5ConfigResources, T5ModelResources, T5VocabResources};
//! use tch::Device;
//! use translation_finetune::data::{t5_tokenizer_from_resource, Corpus};
//! use translation_finetune::trainer::{
//!     PretrainedT5, Seq2SeqTrainer, Seq2SeqTrainingConfig, TranslationTaskConfig,
//! };
//!
//! let task = TranslationTaskConfig::default();
//! let tokenizer = t5_tokenizer_from_resource(&RemoteResource::from_pretrained(
//!     T5VocabResources::T5_SMALL,
//! ))?;
//! let split = Corpus::from_jsonl("opus_books_de_en.jsonl")?
//!     .train_test_split(task.test_size, task.split_seed)?;
//! let train_dataset = task.preprocessing.map(&tokenizer, &split.train, task.preprocessing_batch_size)?;
//! let eval_dataset = task.preprocessing.map(&tokenizer, &split.test, task.preprocessing_batch_size)?;
//!
//! let pretrained = PretrainedT5::from_resources(
//!     &RemoteResource::from_pretrained(T5ConfigResources::T5_SMALL),
//!     &RemoteResource::from_pretrained(T5ModelResources::T5_SMALL),
//!     Device::cuda_if_available(),
//! )?;
//! let mut trainer = Seq2SeqTrainer::new(
//!     pretrained.model,
//!     pretrained.var_store,
//!     &tokenizer,
//!     Seq2SeqTrainingConfig::default(),
//!     train_dataset,
//!     Some(eval_dataset),
//! )?;
//! let output = trainer.train()?;
//! println!("{:?}", output.log_history.last());
//! # Ok(())
//! # }
//! ```
//!
//! # Loading pretrained weights
//!
//! The pretrained T5 weights, configuration and vocabulary are fetched through `rust-bert`'s
//! resources and cached locally (`RUSTBERT_CACHE`, `~/.cache/.rustbert` by default). Local files
//! can be used instead with `LocalResource`. Weights must be in the C-array format used by `tch`.

pub mod common;
pub mod data;
pub mod metrics;
pub mod plotting;
pub mod trainer;

pub use common::error::FineTuneError;
