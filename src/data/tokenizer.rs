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
use rust_bert::resources::ResourceProvider;
use rust_tokenizers::tokenizer::{T5Tokenizer, Tokenizer, TruncationStrategy};
use rust_tokenizers::vocab::Vocab;

const T5_PAD_TOKEN: &str = "<pad>";
const T5_EOS_TOKEN: &str = "</s>";

/// # Tokenizer used by the translation fine-tuning pipeline
/// Encodes source and target sentences (special tokens included, truncated to a maximum length)
/// and decodes generated or reference token ids back to text.
pub trait Seq2SeqTokenizer {
    /// Encodes a single sentence, truncating the output (special tokens included) to `max_length`.
    fn encode(&self, text: &str, max_length: usize) -> Vec<i64>;

    /// Decodes a sequence of token ids, optionally skipping special tokens (padding, end of sequence...)
    fn decode(&self, token_ids: &[i64], skip_special_tokens: bool) -> String;

    /// Padding token id
    fn pad_id(&self) -> i64;

    /// End of sequence token id
    fn eos_id(&self) -> i64;

    /// First token fed to the decoder. T5 models start decoding from the padding token.
    fn decoder_start_id(&self) -> i64 {
        self.pad_id()
    }

    fn batch_decode(&self, sequences: &[Vec<i64>], skip_special_tokens: bool) -> Vec<String> {
        sequences
            .iter()
            .map(|token_ids| self.decode(token_ids, skip_special_tokens))
            .collect()
    }
}

impl Seq2SeqTokenizer for T5Tokenizer {
    fn encode(&self, text: &str, max_length: usize) -> Vec<i64> {
        Tokenizer::encode(
            self,
            text,
            None,
            max_length,
            &TruncationStrategy::LongestFirst,
            0,
        )
        .token_ids
    }

    fn decode(&self, token_ids: &[i64], skip_special_tokens: bool) -> String {
        Tokenizer::decode(self, token_ids, skip_special_tokens, true)
    }

    fn pad_id(&self) -> i64 {
        self.vocab().token_to_id(T5_PAD_TOKEN)
    }

    fn eos_id(&self) -> i64 {
        self.vocab().token_to_id(T5_EOS_TOKEN)
    }
}

/// Loads a SentencePiece T5 tokenizer from a vocabulary resource (e.g. `T5VocabResources::T5_SMALL`).
pub fn t5_tokenizer_from_resource(
    vocab_resource: &dyn ResourceProvider,
) -> Result<T5Tokenizer, FineTuneError> {
    let vocab_path = vocab_resource.get_local_path()?;
    Ok(T5Tokenizer::from_file(vocab_path, false)?)
}
