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
use crate::data::corpus::{Corpus, SentencePair};
use crate::data::labels::LabelId;
use crate::data::tokenizer::Seq2SeqTokenizer;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Instruction prepended to every English source sentence
pub const ENGLISH2GERMAN_PREFIX: &str = "Translate English to German: ";

/// # Model-ready translation example
/// `input_ids` hold the encoded, prefixed source sentence and `labels` the encoded target
/// sentence. Both are truncated independently to their maximum length. The ignore sentinel only
/// ever appears in `labels`, once a collator pads them.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedExample {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub labels: Vec<LabelId>,
}

/// # Tokenized corpus partition
#[derive(Debug, Clone, Default)]
pub struct TokenizedDataset {
    examples: Vec<TokenizedExample>,
}

impl TokenizedDataset {
    pub fn new(examples: Vec<TokenizedExample>) -> TokenizedDataset {
        TokenizedDataset { examples }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[TokenizedExample] {
        &self.examples
    }

    pub fn get(&self, index: usize) -> Option<&TokenizedExample> {
        self.examples.get(index)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// # Translation preprocessing settings
/// Carries the language pair, the static instruction prefix and the truncation lengths used to
/// turn raw sentence pairs into `TokenizedExample`s.
pub struct TranslationPreprocessor {
    /// Instruction prepended to each source sentence
    pub prefix: String,
    /// Language code of the source sentences (e.g. `en`)
    pub source_lang: String,
    /// Language code of the target sentences (e.g. `de`)
    pub target_lang: String,
    /// Maximum number of source tokens, special tokens included
    pub max_source_length: usize,
    /// Maximum number of target tokens, special tokens included
    pub max_target_length: usize,
}

impl Default for TranslationPreprocessor {
    fn default() -> Self {
        TranslationPreprocessor {
            prefix: ENGLISH2GERMAN_PREFIX.to_string(),
            source_lang: "en".to_string(),
            target_lang: "de".to_string(),
            max_source_length: 128,
            max_target_length: 128,
        }
    }
}

impl TranslationPreprocessor {
    /// Tokenizes a batch of sentence pairs.
    ///
    /// # Arguments
    ///
    /// * `tokenizer` - tokenizer shared by source and target sentences
    /// * `records` - sentence pairs to encode
    ///
    /// # Returns
    ///
    /// * `Vec<TokenizedExample>` with one example per record, in the same order
    ///
    /// # Errors
    ///
    /// `FineTuneError::MissingField` if a record lacks the source or target language.
    pub fn preprocess_batch<T>(
        &self,
        tokenizer: &T,
        records: &[SentencePair],
    ) -> Result<Vec<TokenizedExample>, FineTuneError>
    where
        T: Seq2SeqTokenizer + ?Sized,
    {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| self.preprocess_record(tokenizer, record, index))
            .collect()
    }

    fn preprocess_record<T>(
        &self,
        tokenizer: &T,
        record: &SentencePair,
        index: usize,
    ) -> Result<TokenizedExample, FineTuneError>
    where
        T: Seq2SeqTokenizer + ?Sized,
    {
        let source = self.field(record, &self.source_lang, index)?;
        let target = self.field(record, &self.target_lang, index)?;

        let input_ids = tokenizer.encode(
            &format!("{}{}", self.prefix, source),
            self.max_source_length,
        );
        let attention_mask = vec![1; input_ids.len()];
        let labels = tokenizer
            .encode(target, self.max_target_length)
            .into_iter()
            .map(LabelId::Token)
            .collect();

        Ok(TokenizedExample {
            input_ids,
            attention_mask,
            labels,
        })
    }

    fn field<'a>(
        &self,
        record: &'a SentencePair,
        language: &str,
        index: usize,
    ) -> Result<&'a str, FineTuneError> {
        record
            .text(language)
            .ok_or_else(|| FineTuneError::MissingField {
                index,
                language: language.to_string(),
            })
    }

    /// Maps the preprocessing over a full corpus, `batch_size` records at a time. The corpus is
    /// left untouched and a new tokenized dataset is returned.
    pub fn map<T>(
        &self,
        tokenizer: &T,
        corpus: &Corpus,
        batch_size: usize,
    ) -> Result<TokenizedDataset, FineTuneError>
    where
        T: Seq2SeqTokenizer + ?Sized,
    {
        let batch_size = batch_size.max(1);
        let mut examples = Vec::with_capacity(corpus.len());
        for (batch_index, batch) in corpus.records().chunks(batch_size).enumerate() {
            let offset = batch_index * batch_size;
            let tokenized = self
                .preprocess_batch(tokenizer, batch)
                .map_err(|error| match error {
                    FineTuneError::MissingField { index, language } => {
                        FineTuneError::MissingField {
                            index: offset + index,
                            language,
                        }
                    }
                    other => other,
                })?;
            examples.extend(tokenized);
            debug!("Tokenized {} records", offset + batch.len());
        }
        Ok(TokenizedDataset::new(examples))
    }
}
