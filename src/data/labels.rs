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

use serde::{Deserialize, Serialize};

/// Label value excluded from the loss computation. Never a valid vocabulary id.
pub const IGNORE_INDEX: i64 = -100;

/// # Target token position
/// A label is either a real vocabulary id or a padding position that must be ignored by the loss.
/// The raw `-100` sentinel only exists in tensors handed to the loss function, and must be
/// resolved to a pad id with [`LabelId::resolve`] before any decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelId {
    /// Vocabulary id of a target token
    Token(i64),
    /// Padding position, excluded from the loss
    Ignore,
}

impl LabelId {
    /// Value used when building label tensors for the loss.
    pub fn as_raw(self) -> i64 {
        match self {
            LabelId::Token(id) => id,
            LabelId::Ignore => IGNORE_INDEX,
        }
    }

    /// Replaces ignored positions with the tokenizer padding id so the label can be decoded.
    pub fn resolve(self, pad_id: i64) -> i64 {
        match self {
            LabelId::Token(id) => id,
            LabelId::Ignore => pad_id,
        }
    }

    pub fn is_ignored(self) -> bool {
        matches!(self, LabelId::Ignore)
    }
}

impl From<i64> for LabelId {
    fn from(value: i64) -> Self {
        if value == IGNORE_INDEX {
            LabelId::Ignore
        } else {
            LabelId::Token(value)
        }
    }
}

/// Resolves a full label sequence for decoding (no `IGNORE_INDEX` in the output).
pub fn resolve_labels(labels: &[LabelId], pad_id: i64) -> Vec<i64> {
    labels.iter().map(|label| label.resolve(pad_id)).collect()
}
