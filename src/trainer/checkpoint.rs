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
use crate::metrics::EvaluationResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tch::nn;
use tracing::{info, warn};

pub const CHECKPOINT_PREFIX: &str = "checkpoint";
pub const WEIGHTS_NAME: &str = "rust_model.ot";
pub const TRAINER_STATE_NAME: &str = "trainer_state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// # Training log line
/// Either a periodic training loss report or an end of epoch evaluation.
pub struct LogEntry {
    pub epoch: usize,
    pub step: usize,
    pub loss: Option<f64>,
    pub learning_rate: Option<f64>,
    pub eval: Option<EvaluationResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// # Trainer progress saved next to each checkpoint
pub struct TrainerState {
    pub epoch: usize,
    pub global_step: usize,
    pub log_history: Vec<LogEntry>,
}

impl TrainerState {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<TrainerState, FineTuneError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// # Checkpoint writer with retention limit
/// Checkpoints are written to `{output_dir}/checkpoint-{global_step}`. When a limit is set, the
/// checkpoints with the lowest step are deleted once the limit is exceeded.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    output_dir: PathBuf,
    save_total_limit: Option<usize>,
}

impl CheckpointManager {
    pub fn new<P: Into<PathBuf>>(output_dir: P, save_total_limit: Option<usize>) -> Self {
        CheckpointManager {
            output_dir: output_dir.into(),
            save_total_limit,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Saves the model variables and trainer state, then applies the retention limit.
    pub fn save(
        &self,
        var_store: &nn::VarStore,
        state: &TrainerState,
    ) -> Result<PathBuf, FineTuneError> {
        let checkpoint_dir = self
            .output_dir
            .join(format!("{}-{}", CHECKPOINT_PREFIX, state.global_step));
        fs::create_dir_all(&checkpoint_dir)?;

        var_store.save(checkpoint_dir.join(WEIGHTS_NAME))?;
        let writer = BufWriter::new(File::create(checkpoint_dir.join(TRAINER_STATE_NAME))?);
        serde_json::to_writer_pretty(writer, state)?;
        info!("Saved checkpoint {}", checkpoint_dir.display());

        self.rotate()?;
        Ok(checkpoint_dir)
    }

    /// Existing checkpoints sorted by increasing step
    pub fn checkpoints(&self) -> Result<Vec<(usize, PathBuf)>, FineTuneError> {
        if !self.output_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let step = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(CHECKPOINT_PREFIX))
                .and_then(|suffix| suffix.strip_prefix('-'))
                .and_then(|step| step.parse::<usize>().ok());
            if let Some(step) = step {
                checkpoints.push((step, path));
            }
        }
        checkpoints.sort_by_key(|(step, _)| *step);
        Ok(checkpoints)
    }

    /// Deletes the oldest checkpoints beyond the retention limit, returning the removed paths.
    pub fn rotate(&self) -> Result<Vec<PathBuf>, FineTuneError> {
        let limit = match self.save_total_limit {
            Some(limit) => limit,
            None => return Ok(Vec::new()),
        };
        let checkpoints = self.checkpoints()?;
        let excess = checkpoints.len().saturating_sub(limit);
        let mut removed = Vec::with_capacity(excess);
        for (_, path) in checkpoints.into_iter().take(excess) {
            warn!(
                "Deleting older checkpoint {} (save_total_limit = {})",
                path.display(),
                limit
            );
            fs::remove_dir_all(&path)?;
            removed.push(path);
        }
        Ok(removed)
    }
}
