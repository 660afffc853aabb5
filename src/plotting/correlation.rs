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
use crate::common::round_to;
use crate::plotting::data_frame::DataFrame;
use crate::plotting::figure::{Figure, Panel, Series};

/// Pearson correlation between every pair of columns.
///
/// Each coefficient is computed over the rows where both values are present (not `NaN`). A pair
/// with fewer than 2 such rows, or with a constant column, has an undefined (`NaN`) correlation.
///
/// # Errors
///
/// `FineTuneError::ValueError` if the data frame is empty or holds a categorical column.
pub fn pearson_correlation(data: &DataFrame) -> Result<Vec<Vec<f64>>, FineTuneError> {
    if data.num_columns() == 0 {
        return Err(FineTuneError::ValueError(
            "Cannot correlate an empty data frame".to_string(),
        ));
    }
    let columns = data
        .iter()
        .map(|(name, column)| {
            column.as_numeric().ok_or_else(|| {
                FineTuneError::ValueError(format!(
                    "Column {} is not numeric and cannot be correlated",
                    name
                ))
            })
        })
        .collect::<Result<Vec<&[f64]>, FineTuneError>>()?;

    let n = columns.len();
    let mut correlations = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let value = pairwise_pearson(columns[i], columns[j]);
            correlations[i][j] = value;
            correlations[j][i] = value;
        }
    }
    Ok(correlations)
}

fn pairwise_pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(&a, &b)| (a, b))
        .collect::<Vec<(f64, f64)>>();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let count = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / count;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / count;
    let (mut covariance, mut variance_x, mut variance_y) = (0f64, 0f64, 0f64);
    for (a, b) in pairs {
        covariance += (a - mean_x) * (b - mean_y);
        variance_x += (a - mean_x).powi(2);
        variance_y += (b - mean_y).powi(2);
    }
    let denominator = (variance_x * variance_y).sqrt();
    if denominator == 0.0 {
        return f64::NAN;
    }
    (covariance / denominator).clamp(-1.0, 1.0)
}

/// Heatmap of the Pearson correlation matrix, rounded to 2 decimals.
///
/// Cells strictly above the diagonal are masked (`None`), as are undefined correlations.
/// `annotate` turns on the printing of values inside the cells.
pub fn plot_correlation_matrix(data: &DataFrame, annotate: bool) -> Result<Figure, FineTuneError> {
    let correlations = pearson_correlation(data)?;
    let values = correlations
        .iter()
        .enumerate()
        .map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(|(j, &value)| {
                    if j > i || value.is_nan() {
                        None
                    } else {
                        Some(round_to(value, 2))
                    }
                })
                .collect()
        })
        .collect();
    let panel = Panel::at(0, 0).with_series(Series::Heatmap {
        labels: data.names().to_vec(),
        values,
        annotate,
    });
    Ok(Figure::single(None, (5.0, 5.0), panel))
}
