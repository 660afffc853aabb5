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
use crate::plotting::data_frame::{Column, DataFrame};
use crate::plotting::figure::{Figure, HistogramBin, Panel, Series, DEFAULT_COLOR};
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

const PANEL_SIZE: f64 = 4.5;
const HISTOGRAM_BINS: usize = 30;
/// Numeric columns with fewer distinct values are drawn as count plots
const MIN_DISTINCT_FOR_HISTOGRAM: usize = 5;

/// Distribution of every column of a data frame, one panel per column laid out row by row.
///
/// Categorical columns and columns with fewer than 5 distinct values get a count plot, other
/// numeric columns a 30-bin histogram.
///
/// # Arguments
///
/// * `data` - data frame to describe
/// * `ncols` - number of panels per row
///
/// # Example
///
/// ```
/// # fn main() -> anyhow::Result<()> {
/// use translation_finetune::plotting::{plot_distributions, Column, DataFrame};
/// let data = DataFrame::new()
///     .with_column("age", Column::Numeric((0..50).map(|v| v as f64).collect()))?
///     .with_column("smoker", Column::Categorical(vec!["no".to_string(); 50]))?;
/// let figure = plot_distributions(&data, 2)?;
/// assert_eq!(figure.panels.len(), 2);
/// # Ok(())
/// # }
/// ```
pub fn plot_distributions(data: &DataFrame, ncols: usize) -> Result<Figure, FineTuneError> {
    if ncols == 0 {
        return Err(FineTuneError::ValueError(
            "The number of columns of the grid must be positive".to_string(),
        ));
    }
    if data.num_columns() == 0 || data.num_rows() == 0 {
        return Err(FineTuneError::ValueError(
            "Cannot plot the distributions of an empty data frame".to_string(),
        ));
    }
    let nrows = (data.num_columns() + ncols - 1) / ncols;
    let mut figure = Figure::new(
        Some("Distribution of features".to_string()),
        (ncols as f64 * PANEL_SIZE, nrows as f64 * PANEL_SIZE),
        nrows,
        ncols,
    );

    for (index, (name, column)) in data.iter().enumerate() {
        let series = if column.is_categorical() || column.n_unique() < MIN_DISTINCT_FOR_HISTOGRAM
        {
            count_series(name, column)
        } else {
            histogram_series(name, column)?
        };
        figure.panels.push(
            Panel::at(index / ncols, index % ncols)
                .with_labels(name, "Count")
                .with_series(series),
        );
    }
    Ok(figure)
}

fn count_series(name: &str, column: &Column) -> Series {
    let (categories, counts) = match column {
        Column::Categorical(values) => {
            let mut categories: Vec<String> = Vec::new();
            let mut counts: Vec<usize> = Vec::new();
            for value in values {
                match categories.iter().position(|category| category == value) {
                    Some(position) => counts[position] += 1,
                    None => {
                        categories.push(value.clone());
                        counts.push(1);
                    }
                }
            }
            (categories, counts)
        }
        Column::Numeric(values) => {
            let mut occurrences: BTreeMap<OrderedFloat<f64>, usize> = BTreeMap::new();
            for value in values.iter().filter(|value| !value.is_nan()) {
                *occurrences.entry(OrderedFloat(*value)).or_insert(0) += 1;
            }
            occurrences
                .into_iter()
                .map(|(value, count)| (value.0.to_string(), count))
                .unzip::<String, usize, Vec<String>, Vec<usize>>()
        }
    };
    Series::Count {
        label: name.to_string(),
        categories,
        counts,
    }
}

/// Equal-width bins between the minimum and maximum, the last bin closed on the right.
fn histogram_series(name: &str, column: &Column) -> Result<Series, FineTuneError> {
    let values = column
        .as_numeric()
        .ok_or_else(|| FineTuneError::ValueError(format!("Column {} is not numeric", name)))?;
    let finite = values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .collect::<Vec<f64>>();
    let (min, max) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &value| {
            (min.min(value), max.max(value))
        });
    if finite.is_empty() {
        return Err(FineTuneError::ValueError(format!(
            "Column {} has no finite value",
            name
        )));
    }
    let width = (max - min) / HISTOGRAM_BINS as f64;
    let mut bins = (0..HISTOGRAM_BINS)
        .map(|index| HistogramBin {
            start: min + width * index as f64,
            end: if index == HISTOGRAM_BINS - 1 {
                max
            } else {
                min + width * (index + 1) as f64
            },
            count: 0,
        })
        .collect::<Vec<HistogramBin>>();
    for value in finite {
        let index = if width > 0.0 {
            (((value - min) / width) as usize).min(HISTOGRAM_BINS - 1)
        } else {
            0
        };
        bins[index].count += 1;
    }
    Ok(Series::Histogram {
        label: name.to_string(),
        bins,
        color: DEFAULT_COLOR.to_string(),
    })
}
