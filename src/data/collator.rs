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
use crate::data::labels::LabelId;
use crate::data::preprocessing::{TokenizedDataset, TokenizedExample};
use crate::data::tokenizer::Seq2SeqTokenizer;
use tch::{Device, Kind, Tensor};

/// # Padded batch of translation examples
/// - `input_ids`: (*batch size*, *source_sequence_length*), right-padded with the pad id
/// - `attention_mask`: (*batch size*, *source_sequence_length*), 0 on padding positions
/// - `decoder_input_ids`: (*batch size*, *target_sequence_length*), labels shifted right behind the decoder start id
/// - `labels`: (*batch size*, *target_sequence_length*), right-padded with `IGNORE_INDEX`
pub struct Seq2SeqBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub decoder_input_ids: Tensor,
    pub labels: Tensor,
    /// Padded labels kept on the host for metric computation
    pub label_ids: Vec<Vec<LabelId>>,
}

impl Seq2SeqBatch {
    pub fn batch_size(&self) -> usize {
        self.label_ids.len()
    }
}

/// # Collator assembling tokenized examples into padded batches
#[derive(Debug, Clone, Copy)]
pub struct Seq2SeqCollator {
    /// Id used to pad source sequences and decoder inputs
    pub pad_id: i64,
    /// First token of every decoder input sequence
    pub decoder_start_id: i64,
    /// Optionally round padded lengths up to a multiple of this value
    pub pad_to_multiple_of: Option<usize>,
    /// Device the batch tensors are moved to
    pub device: Device,
}

impl Seq2SeqCollator {
    pub fn new<T>(tokenizer: &T, device: Device) -> Seq2SeqCollator
    where
        T: Seq2SeqTokenizer + ?Sized,
    {
        Seq2SeqCollator {
            pad_id: tokenizer.pad_id(),
            decoder_start_id: tokenizer.decoder_start_id(),
            pad_to_multiple_of: None,
            device,
        }
    }

    fn padded_length(&self, length: usize) -> usize {
        match self.pad_to_multiple_of {
            Some(multiple) if multiple > 1 => ((length + multiple - 1) / multiple) * multiple,
            _ => length,
        }
    }

    /// Pads a slice of examples to the longest source and target sequences of the batch.
    pub fn collate(&self, examples: &[&TokenizedExample]) -> Result<Seq2SeqBatch, FineTuneError> {
        if examples.is_empty() {
            return Err(FineTuneError::ValueError(
                "Cannot collate an empty batch".to_string(),
            ));
        }
        let batch_size = examples.len() as i64;
        let source_length = self.padded_length(
            examples
                .iter()
                .map(|example| example.input_ids.len())
                .max()
                .unwrap_or(0),
        );
        let target_length = self.padded_length(
            examples
                .iter()
                .map(|example| example.labels.len())
                .max()
                .unwrap_or(0),
        );

        let mut input_ids = Vec::with_capacity(examples.len() * source_length);
        let mut attention_mask = Vec::with_capacity(examples.len() * source_length);
        let mut labels = Vec::with_capacity(examples.len() * target_length);
        let mut decoder_input_ids = Vec::with_capacity(examples.len() * target_length);
        let mut label_ids = Vec::with_capacity(examples.len());

        for example in examples {
            let padding = source_length - example.input_ids.len();
            input_ids.extend_from_slice(&example.input_ids);
            input_ids.extend(std::iter::repeat(self.pad_id).take(padding));
            attention_mask.extend_from_slice(&example.attention_mask);
            attention_mask.extend(std::iter::repeat(0).take(padding));

            let mut padded_labels = example.labels.clone();
            padded_labels.resize(target_length, LabelId::Ignore);
            labels.extend(padded_labels.iter().map(|label| label.as_raw()));
            decoder_input_ids.extend(self.shift_right(&padded_labels));
            label_ids.push(padded_labels);
        }

        let to_tensor = |values: &[i64], length: usize| -> Tensor {
            Tensor::from_slice(values)
                .view([batch_size, length as i64])
                .to_kind(Kind::Int64)
                .to_device(self.device)
        };

        Ok(Seq2SeqBatch {
            input_ids: to_tensor(&input_ids, source_length),
            attention_mask: to_tensor(&attention_mask, source_length),
            decoder_input_ids: to_tensor(&decoder_input_ids, target_length),
            labels: to_tensor(&labels, target_length),
            label_ids,
        })
    }

    /// Decoder inputs for teacher forcing: the decoder start id followed by all labels but the
    /// last, with ignored positions replaced by the pad id.
    pub fn shift_right(&self, labels: &[LabelId]) -> Vec<i64> {
        if labels.is_empty() {
            return Vec::new();
        }
        std::iter::once(self.decoder_start_id)
            .chain(
                labels[..labels.len() - 1]
                    .iter()
                    .map(|label| label.resolve(self.pad_id)),
            )
            .collect()
    }
}

/// # Batched iterator over a tokenized dataset
/// Keeps the dataset order for evaluation, or follows a seeded permutation for training. The
/// last batch may be smaller than `batch_size`.
pub struct DataLoader<'a> {
    dataset: &'a TokenizedDataset,
    collator: &'a Seq2SeqCollator,
    batch_size: usize,
    order: Vec<usize>,
    position: usize,
}

impl<'a> DataLoader<'a> {
    pub fn sequential(
        dataset: &'a TokenizedDataset,
        collator: &'a Seq2SeqCollator,
        batch_size: usize,
    ) -> DataLoader<'a> {
        DataLoader {
            dataset,
            collator,
            batch_size: batch_size.max(1),
            order: (0..dataset.len()).collect(),
            position: 0,
        }
    }

    pub fn shuffled(
        dataset: &'a TokenizedDataset,
        collator: &'a Seq2SeqCollator,
        batch_size: usize,
        seed: i64,
    ) -> Result<DataLoader<'a>, FineTuneError> {
        tch::manual_seed(seed);
        let permutation = Tensor::randperm(dataset.len() as i64, (Kind::Int64, Device::Cpu));
        let order = Vec::<i64>::try_from(&permutation)?
            .into_iter()
            .map(|index| index as usize)
            .collect();
        Ok(DataLoader {
            dataset,
            collator,
            batch_size: batch_size.max(1),
            order,
            position: 0,
        })
    }

    pub fn num_batches(&self) -> usize {
        (self.order.len() + self.batch_size - 1) / self.batch_size
    }
}

impl<'a> Iterator for DataLoader<'a> {
    type Item = Result<Seq2SeqBatch, FineTuneError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.order.len() {
            return None;
        }
        let end = (self.position + self.batch_size).min(self.order.len());
        let examples = self.order[self.position..end]
            .iter()
            .filter_map(|&index| self.dataset.get(index))
            .collect::<Vec<&TokenizedExample>>();
        self.position = end;
        Some(self.collator.collate(&examples))
    }
}
