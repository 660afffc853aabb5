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
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// # Column of a `DataFrame`
/// Missing numeric values are represented by `NaN`.
pub enum Column {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Categorical(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Column::Categorical(_))
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Column::Numeric(values) => Some(values),
            Column::Categorical(_) => None,
        }
    }

    /// Number of distinct values, `NaN` excluded
    pub fn n_unique(&self) -> usize {
        match self {
            Column::Numeric(values) => values
                .iter()
                .filter(|value| !value.is_nan())
                .map(|&value| OrderedFloat(value))
                .collect::<HashSet<OrderedFloat<f64>>>()
                .len(),
            Column::Categorical(values) => values.iter().collect::<HashSet<&String>>().len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// # Named columns of equal length
pub struct DataFrame {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl DataFrame {
    pub fn new() -> DataFrame {
        DataFrame::default()
    }

    /// Appends a column. Fails if the name is already used or the length differs from the
    /// existing columns.
    pub fn push_column<S: Into<String>>(
        &mut self,
        name: S,
        column: Column,
    ) -> Result<(), FineTuneError> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(FineTuneError::ValueError(format!(
                "Duplicate column name {}",
                name
            )));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(FineTuneError::ValueError(format!(
                    "Column {} has {} rows, expected {}",
                    name,
                    column.len(),
                    first.len()
                )));
            }
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    pub fn with_column<S: Into<String>>(
        mut self,
        name: S,
        column: Column,
    ) -> Result<DataFrame, FineTuneError> {
        self.push_column(name, column)?;
        Ok(self)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| &self.columns[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_columns() {
        let frame = DataFrame::new()
            .with_column("a", Column::Numeric(vec![1.0, 2.0]))
            .unwrap();
        assert!(frame
            .with_column("b", Column::Categorical(vec!["x".to_string()]))
            .is_err());
    }

    #[test]
    fn unique_values_skip_missing() {
        let column = Column::Numeric(vec![1.0, f64::NAN, 1.0, 2.0, f64::NAN]);
        assert_eq!(column.n_unique(), 2);
    }
}
