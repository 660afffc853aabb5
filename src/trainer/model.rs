// Copyright 2018 Mesh TensorFlow authors, T5 Authors and HuggingFace Inc. team.
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
use crate::data::IGNORE_INDEX;
use rust_bert::resources::ResourceProvider;
use rust_bert::t5::{T5Config, T5ForConditionalGeneration};
use rust_bert::Config;
use tch::{nn, Device, Kind, Reduction, Tensor};
use tracing::info;

/// # Encoder-decoder model trained by the `Seq2SeqTrainer`
pub trait Seq2SeqModel {
    /// Teacher-forced forward pass.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - source tensor of shape (*batch size*, *source_sequence_length*)
    /// * `attention_mask` - source mask of shape (*batch size*, *source_sequence_length*), 0 on padding
    /// * `decoder_input_ids` - decoder inputs of shape (*batch size*, *target_sequence_length*)
    /// * `train` - turns dropout on
    ///
    /// # Returns
    ///
    /// * logits of shape (*batch size*, *target_sequence_length*, *vocab_size*)
    fn forward_t(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        decoder_input_ids: &Tensor,
        train: bool,
    ) -> Tensor;

    /// Encoder hidden states of shape (*batch size*, *source_sequence_length*, *hidden_size*)
    fn encode(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Tensor;

    /// Decoder logits for precomputed encoder hidden states, without dropout
    fn decode(
        &self,
        encoder_hidden_states: &Tensor,
        attention_mask: &Tensor,
        decoder_input_ids: &Tensor,
    ) -> Tensor;
}

impl Seq2SeqModel for T5ForConditionalGeneration {
    fn forward_t(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        decoder_input_ids: &Tensor,
        train: bool,
    ) -> Tensor {
        T5ForConditionalGeneration::forward_t(
            self,
            Some(input_ids),
            Some(attention_mask),
            None,
            Some(decoder_input_ids),
            None,
            None,
            None,
            None,
            train,
        )
        .decoder_output
    }

    fn encode(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Tensor {
        T5ForConditionalGeneration::encode(self, input_ids, Some(attention_mask))
    }

    fn decode(
        &self,
        encoder_hidden_states: &Tensor,
        attention_mask: &Tensor,
        decoder_input_ids: &Tensor,
    ) -> Tensor {
        T5ForConditionalGeneration::forward_t(
            self,
            None,
            Some(attention_mask),
            Some(encoder_hidden_states),
            Some(decoder_input_ids),
            None,
            None,
            None,
            None,
            false,
        )
        .decoder_output
    }
}

/// # Pretrained T5 model with its variable store
pub struct PretrainedT5 {
    pub model: T5ForConditionalGeneration,
    pub var_store: nn::VarStore,
    pub config: T5Config,
}

impl PretrainedT5 {
    /// Builds a T5 model for conditional generation and loads pretrained weights.
    ///
    /// # Arguments
    ///
    /// * `config_resource` - T5 configuration (e.g. `T5ConfigResources::T5_SMALL`)
    /// * `model_resource` - weights in the C-array format used by `tch` (e.g. `T5ModelResources::T5_SMALL`)
    /// * `device` - device the variables are allocated on
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() -> anyhow::Result<()> {
    /// use rust_bert::resources::RemoteResource;
    /// use rust_bert::t5::{T5ConfigResources, T5ModelResources};
    /// use tch::Device;
    /// use translation_finetune::trainer::PretrainedT5;
    ///
    /// let pretrained = PretrainedT5::from_resources(
    ///     &RemoteResource::from_pretrained(T5ConfigResources::T5_SMALL),
    ///     &RemoteResource::from_pretrained(T5ModelResources::T5_SMALL),
    ///     Device::cuda_if_available(),
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_resources(
        config_resource: &dyn ResourceProvider,
        model_resource: &dyn ResourceProvider,
        device: Device,
    ) -> Result<PretrainedT5, FineTuneError> {
        let config_path = config_resource.get_local_path()?;
        let weights_path = model_resource.get_local_path()?;

        let mut var_store = nn::VarStore::new(device);
        let config = T5Config::from_file(config_path);
        let model = T5ForConditionalGeneration::new(var_store.root(), &config);
        var_store.load(&weights_path)?;
        info!(
            "Loaded pretrained T5 weights from {} on {:?}",
            weights_path.display(),
            device
        );

        Ok(PretrainedT5 {
            model,
            var_store,
            config,
        })
    }
}

/// Mean cross-entropy over the non-ignored label positions.
///
/// # Arguments
///
/// * `logits` - tensor of shape (*batch size*, *target_sequence_length*, *vocab_size*)
/// * `labels` - tensor of shape (*batch size*, *target_sequence_length*) holding `IGNORE_INDEX` on padding
pub fn seq2seq_loss(logits: &Tensor, labels: &Tensor) -> Tensor {
    let vocab_size = logits.size()[logits.dim() - 1];
    logits
        .reshape([-1, vocab_size])
        .to_kind(Kind::Float)
        .cross_entropy_loss::<Tensor>(
            &labels.reshape([-1]),
            None,
            Reduction::Mean,
            IGNORE_INDEX,
            0.0,
        )
}

#[derive(Debug, Clone, Copy)]
/// # Greedy decoding settings
pub struct GenerationSettings {
    /// Maximum output length, decoder start token included
    pub max_length: usize,
    pub decoder_start_id: i64,
    pub eos_id: i64,
    pub pad_id: i64,
}

/// Greedy decoding of a batch of source sequences.
///
/// Every output sequence starts with the decoder start token; sequences that produced an end of
/// sequence token are padded with the pad id until the whole batch is finished or `max_length` is
/// reached.
pub fn greedy_generate<M>(
    model: &M,
    input_ids: &Tensor,
    attention_mask: &Tensor,
    settings: &GenerationSettings,
) -> Result<Vec<Vec<i64>>, FineTuneError>
where
    M: Seq2SeqModel + ?Sized,
{
    let (batch_size, _) = input_ids.size2()?;
    let device = input_ids.device();
    let encoder_hidden_states = model.encode(input_ids, attention_mask);

    let mut sequences = Tensor::full(
        [batch_size, 1],
        settings.decoder_start_id,
        (Kind::Int64, device),
    );
    let mut unfinished = Tensor::ones([batch_size], (Kind::Bool, device));

    for _ in 1..settings.max_length {
        let logits = model.decode(&encoder_hidden_states, attention_mask, &sequences);
        let next_tokens = logits
            .select(1, -1)
            .argmax(-1, false)
            .masked_fill(&unfinished.logical_not(), settings.pad_id);
        sequences = Tensor::cat(&[&sequences, &next_tokens.unsqueeze(-1)], -1);
        unfinished = unfinished.logical_and(&next_tokens.ne(settings.eos_id));
        if unfinished
            .to_kind(Kind::Int64)
            .sum(Kind::Int64)
            .int64_value(&[])
            == 0
        {
            break;
        }
    }
    tensor_to_rows(&sequences)
}

/// Copies a 2D integer tensor to the host, one `Vec` per row.
pub fn tensor_to_rows(tensor: &Tensor) -> Result<Vec<Vec<i64>>, FineTuneError> {
    let (rows, columns) = tensor.size2()?;
    if columns == 0 {
        return Ok(vec![Vec::new(); rows as usize]);
    }
    let flat = tensor
        .to_device(Device::Cpu)
        .to_kind(Kind::Int64)
        .contiguous()
        .view([-1]);
    let values = Vec::<i64>::try_from(&flat)?;
    Ok(values
        .chunks(columns as usize)
        .map(|row| row.to_vec())
        .collect())
}
