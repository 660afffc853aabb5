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

extern crate tch;

use rust_bert::resources::RemoteResource;
use rust_bert::t5::{T5ConfigResources, T5ModelResources, T5VocabResources};
use tch::Device;
use tracing::info;
use tracing_subscriber::EnvFilter;
use translation_finetune::data::{t5_tokenizer_from_resource, Corpus};
use translation_finetune::trainer::{
    PretrainedT5, Seq2SeqTrainer, Seq2SeqTrainingConfig, TranslationTaskConfig,
};
use translation_finetune::FineTuneError;

pub fn main() -> Result<(), FineTuneError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<_> = std::env::args().collect();
    assert!(
        args.len() == 2 || args.len() == 3,
        "usage: {} corpus.jsonl [training_config.json]",
        args[0].as_str()
    );
    let training_config = match args.get(2) {
        Some(path) => Seq2SeqTrainingConfig::load(path)?,
        None => Seq2SeqTrainingConfig::default(),
    };
    let task = TranslationTaskConfig::default();
    let device = Device::cuda_if_available();

    let tokenizer = t5_tokenizer_from_resource(&RemoteResource::from_pretrained(
        T5VocabResources::T5_SMALL,
    ))?;
    let corpus = Corpus::from_jsonl(&args[1])?;
    let split = corpus.train_test_split(task.test_size, task.split_seed)?;
    info!(
        "Loaded {} sentence pairs ({} train, {} test)",
        corpus.len(),
        split.train.len(),
        split.test.len()
    );

    let train_dataset =
        task.preprocessing
            .map(&tokenizer, &split.train, task.preprocessing_batch_size)?;
    let eval_dataset =
        task.preprocessing
            .map(&tokenizer, &split.test, task.preprocessing_batch_size)?;

    let pretrained = PretrainedT5::from_resources(
        &RemoteResource::from_pretrained(T5ConfigResources::T5_SMALL),
        &RemoteResource::from_pretrained(T5ModelResources::T5_SMALL),
        device,
    )?;
    let mut trainer = Seq2SeqTrainer::new(
        pretrained.model,
        pretrained.var_store,
        &tokenizer,
        training_config,
        train_dataset,
        Some(eval_dataset),
    )?;
    let output = trainer.train()?;
    info!(
        "Finished after {} steps with mean training loss {:.4}",
        output.global_step, output.training_loss
    );

    Ok(())
}
