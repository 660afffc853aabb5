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
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tch::{Device, Kind, Tensor};
use tracing::info;

/// # Bilingual sentence pair
/// Follows the `opus_books` record layout: an optional record identifier and a `translation`
/// object mapping language codes to sentences, e.g.
/// `{"id": "12", "translation": {"de": "Hallo Welt", "en": "Hello world"}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentencePair {
    #[serde(default)]
    pub id: Option<String>,
    pub translation: HashMap<String, String>,
}

impl SentencePair {
    pub fn new<L, T>(texts: &[(L, T)]) -> SentencePair
    where
        L: AsRef<str>,
        T: AsRef<str>,
    {
        let translation = texts
            .iter()
            .map(|(language, text)| (language.as_ref().to_string(), text.as_ref().to_string()))
            .collect();
        SentencePair {
            id: None,
            translation,
        }
    }

    /// Text for a language code, if present in the record
    pub fn text(&self, language: &str) -> Option<&str> {
        self.translation.get(language).map(String::as_str)
    }
}

/// # Ordered collection of sentence pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    records: Vec<SentencePair>,
}

/// # Train and evaluation partitions of a corpus
#[derive(Debug, Clone)]
pub struct CorpusSplit {
    pub train: Corpus,
    pub test: Corpus,
}

impl Corpus {
    pub fn new(records: Vec<SentencePair>) -> Corpus {
        Corpus { records }
    }

    /// Reads a JSON-lines corpus (one `SentencePair` object per line).
    ///
    /// # Arguments
    ///
    /// * `path` - location of the `.jsonl` file
    ///
    /// # Example
    ///
    /// ```no_run
    /// use translation_finetune::data::Corpus;
    /// # fn main() -> Result<(), translation_finetune::FineTuneError> {
    /// let corpus = Corpus::from_jsonl("path/to/opus_books_de_en.jsonl")?;
    /// println!("{} sentence pairs", corpus.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_jsonl<P: AsRef<Path>>(path: P) -> Result<Corpus, FineTuneError> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let records = serde_json::Deserializer::from_reader(reader)
            .into_iter::<SentencePair>()
            .collect::<Result<Vec<SentencePair>, _>>()?;
        info!(
            "Loaded {} sentence pairs from {}",
            records.len(),
            path.as_ref().display()
        );
        Ok(Corpus { records })
    }

    /// Reads a JSON-lines corpus from a local or remote resource.
    pub fn from_resource(resource: &dyn ResourceProvider) -> Result<Corpus, FineTuneError> {
        Corpus::from_jsonl(resource.get_local_path()?)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SentencePair] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &SentencePair> {
        self.records.iter()
    }

    /// Splits the corpus into a training and an evaluation partition.
    ///
    /// The evaluation partition holds `ceil(len * test_size)` records and the training partition
    /// the remainder. Records are assigned following a random permutation seeded with `seed`: the
    /// same seed always produces the same partitions.
    ///
    /// # Arguments
    ///
    /// * `test_size` - fraction of the corpus used for evaluation, in (0, 1)
    /// * `seed` - seed of the permutation
    ///
    /// # Errors
    ///
    /// Returns `FineTuneError::InvalidSplit` if the fraction is out of range or if either partition
    /// would be empty (e.g. a single record corpus).
    pub fn train_test_split(&self, test_size: f64, seed: i64) -> Result<CorpusSplit, FineTuneError> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(FineTuneError::InvalidSplit(format!(
                "test size must be in (0, 1), got {}",
                test_size
            )));
        }
        let (n_train, n_test) = split_sizes(self.len(), test_size);
        if n_train == 0 || n_test == 0 {
            return Err(FineTuneError::InvalidSplit(format!(
                "a corpus of {} records with test size {} leaves {} training and {} test records",
                self.len(),
                test_size,
                n_train,
                n_test
            )));
        }

        tch::manual_seed(seed);
        let permutation = Tensor::randperm(self.len() as i64, (Kind::Int64, Device::Cpu));
        let order = Vec::<i64>::try_from(&permutation)?;

        let select = |indices: &[i64]| -> Corpus {
            Corpus::new(
                indices
                    .iter()
                    .map(|&index| self.records[index as usize].clone())
                    .collect(),
            )
        };
        let test = select(&order[..n_test]);
        let train = select(&order[n_test..]);
        info!(
            "Split corpus into {} training and {} test records",
            train.len(),
            test.len()
        );
        Ok(CorpusSplit { train, test })
    }
}

/// Partition sizes `(n_train, n_test)` for a corpus of `len` records.
pub fn split_sizes(len: usize, test_size: f64) -> (usize, usize) {
    let n_test = ((len as f64) * test_size).ceil() as usize;
    let n_test = n_test.min(len);
    (len - n_test, n_test)
}

impl From<Vec<SentencePair>> for Corpus {
    fn from(records: Vec<SentencePair>) -> Self {
        Corpus::new(records)
    }
}
