//! # Translation data preparation
//!
//! Loading of bilingual sentence-pair corpora, train/test partitioning, tokenization of the
//! prefixed source and target sentences and assembly of padded batches.
//!
//! ```no_run
//! use rust_bert::resources::RemoteResource;
//! use rust_bert::t5::T5VocabResources;
//! use tch::Device;
//! use translation_finetune::data::{
//!     t5_tokenizer_from_resource, Corpus, DataLoader, Seq2SeqCollator, TranslationPreprocessor,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let tokenizer = t5_tokenizer_from_resource(&RemoteResource::from_pretrained(
//!         T5VocabResources::T5_SMALL,
//!     ))?;
//!     let corpus = Corpus::from_jsonl("path/to/opus_books_de_en.jsonl")?;
//!     let split = corpus.train_test_split(0.2, 42)?;
//!
//!     let preprocessor = TranslationPreprocessor::default();
//!     let train_dataset = preprocessor.map(&tokenizer, &split.train, 1000)?;
//!
//!     let collator = Seq2SeqCollator::new(&tokenizer, Device::cuda_if_available());
//!     for batch in DataLoader::sequential(&train_dataset, &collator, 128) {
//!         let batch = batch?;
//!         println!("{:?}", batch.input_ids.size());
//!     }
//!     Ok(())
//! }
//! ```

mod collator;
mod corpus;
mod labels;
mod preprocessing;
mod tokenizer;

pub use collator::{DataLoader, Seq2SeqBatch, Seq2SeqCollator};
pub use corpus::{split_sizes, Corpus, CorpusSplit, SentencePair};
pub use labels::{resolve_labels, LabelId, IGNORE_INDEX};
pub use preprocessing::{
    TokenizedDataset, TokenizedExample, TranslationPreprocessor, ENGLISH2GERMAN_PREFIX,
};
pub use tokenizer::{t5_tokenizer_from_resource, Seq2SeqTokenizer};
