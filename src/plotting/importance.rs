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
use crate::plotting::figure::{Figure, Panel, ReferenceLine, Series, DEFAULT_COLOR};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// # Permutation feature importance result
/// Score decrease for every feature (rows) and every permutation repeat (columns).
pub struct PermutationImportance {
    importances: Vec<Vec<f64>>,
}

impl PermutationImportance {
    /// Fails for an empty result or when features have different numbers of repeats.
    pub fn new(importances: Vec<Vec<f64>>) -> Result<PermutationImportance, FineTuneError> {
        let n_repeats = importances.first().map(Vec::len).unwrap_or(0);
        if n_repeats == 0 {
            return Err(FineTuneError::ValueError(
                "Permutation importances must hold at least one feature and one repeat"
                    .to_string(),
            ));
        }
        if importances.iter().any(|repeats| repeats.len() != n_repeats) {
            return Err(FineTuneError::ValueError(
                "All features must have the same number of permutation repeats".to_string(),
            ));
        }
        Ok(PermutationImportance { importances })
    }

    pub fn importances(&self) -> &[Vec<f64>] {
        &self.importances
    }

    pub fn num_features(&self) -> usize {
        self.importances.len()
    }

    pub fn importances_mean(&self) -> Vec<f64> {
        self.importances
            .iter()
            .map(|repeats| repeats.iter().sum::<f64>() / repeats.len() as f64)
            .collect()
    }

    /// Population standard deviation over the repeats
    pub fn importances_std(&self) -> Vec<f64> {
        self.importances
            .iter()
            .zip(self.importances_mean())
            .map(|(repeats, mean)| {
                (repeats
                    .iter()
                    .map(|value| (value - mean).powi(2))
                    .sum::<f64>()
                    / repeats.len() as f64)
                    .sqrt()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// # Summary of a permutation importance explanation
pub struct Explanation {
    /// Feature names, features are labelled by position when absent
    pub feature: Option<Vec<String>>,
    pub importances_mean: Vec<f64>,
    pub importances_std: Vec<f64>,
}

impl From<&PermutationImportance> for Explanation {
    fn from(result: &PermutationImportance) -> Self {
        Explanation {
            feature: None,
            importances_mean: result.importances_mean(),
            importances_std: result.importances_std(),
        }
    }
}

fn check_names<S: AsRef<str>>(names: &[S], expected: usize) -> Result<(), FineTuneError> {
    if names.len() != expected {
        return Err(FineTuneError::ValueError(format!(
            "Got {} feature names for {} features",
            names.len(),
            expected
        )));
    }
    Ok(())
}

/// Indices sorting `values` in ascending order, ties kept in their original order
fn argsort(values: &[f64]) -> Vec<usize> {
    let mut indices = (0..values.len()).collect::<Vec<usize>>();
    indices.sort_by_key(|&index| OrderedFloat(values[index]));
    indices
}

fn argsort_descending(values: &[f64]) -> Vec<usize> {
    let mut indices = argsort(values);
    indices.reverse();
    indices
}

/// `Some(0)` keeps every feature, like `None`
fn keep_top(mut order: Vec<usize>, top_n: Option<usize>) -> Vec<usize> {
    if let Some(top_n) = top_n.filter(|&top_n| top_n > 0) {
        order.truncate(top_n);
    }
    order
}

/// Box plot of the permutation repeats of each feature, most important feature first.
///
/// # Arguments
///
/// * `result` - permutation importances
/// * `feature_names` - name of each feature, in the order of `result`
/// * `title` - figure title
/// * `top_n` - only keep the `top_n` most important features (`None` or `Some(0)` keeps all)
pub fn plot_permutation_feature_importance<S: AsRef<str>>(
    result: &PermutationImportance,
    feature_names: &[S],
    title: &str,
    top_n: Option<usize>,
) -> Result<Figure, FineTuneError> {
    check_names(feature_names, result.num_features())?;
    let order = keep_top(argsort_descending(&result.importances_mean()), top_n);
    let mut panel = Panel::at(0, 0)
        .with_title(title)
        .with_labels("Importance", "Feature");
    for index in order {
        panel.series.push(Series::Box {
            label: feature_names[index].as_ref().to_string(),
            values: result.importances()[index].clone(),
        });
    }
    Ok(Figure::single(None, (7.0, 5.0), panel))
}

fn ascending_bar_panel<S: AsRef<str>>(
    column: usize,
    result: &PermutationImportance,
    feature_names: &[S],
) -> Result<Panel, FineTuneError> {
    check_names(feature_names, result.num_features())?;
    let means = result.importances_mean();
    let order = argsort(&means);
    Ok(Panel::at(0, column).with_series(Series::HorizontalBar {
        label: "importances_mean".to_string(),
        categories: order
            .iter()
            .map(|&index| feature_names[index].as_ref().to_string())
            .collect(),
        values: order.iter().map(|&index| means[index]).collect(),
        color: Some(DEFAULT_COLOR.to_string()),
    }))
}

/// Side by side mean permutation importances on the training and test sets, each panel sorted
/// by increasing importance.
pub fn plot_permutation_feature_importance_train_vs_test<S: AsRef<str>, U: AsRef<str>>(
    result_train: &PermutationImportance,
    train_feature_names: &[S],
    result_test: &PermutationImportance,
    test_feature_names: &[U],
    title: &str,
) -> Result<Figure, FineTuneError> {
    let mut figure = Figure::new(Some(title.to_string()), (10.0, 4.0), 1, 2);
    figure
        .panels
        .push(ascending_bar_panel(0, result_train, train_feature_names)?);
    figure
        .panels
        .push(ascending_bar_panel(1, result_test, test_feature_names)?);
    Ok(figure)
}

/// Impurity-based (mean decrease in impurity) feature importances, most important first.
pub fn plot_impurity_feature_importance<S: AsRef<str>>(
    importances: &[f64],
    feature_names: &[S],
    title: &str,
    top_n: Option<usize>,
) -> Result<Figure, FineTuneError> {
    if importances.is_empty() {
        return Err(FineTuneError::ValueError(
            "No feature importance to plot".to_string(),
        ));
    }
    check_names(feature_names, importances.len())?;
    let order = keep_top(argsort_descending(importances), top_n);
    let panel = Panel::at(0, 0)
        .with_title(title)
        .with_labels(
            "Feature Importance (mean decrease in impurity)",
            "Feature Names",
        )
        .with_series(Series::HorizontalBar {
            label: "feature_importance".to_string(),
            categories: order
                .iter()
                .map(|&index| feature_names[index].as_ref().to_string())
                .collect(),
            values: order.iter().map(|&index| importances[index]).collect(),
            color: Some(DEFAULT_COLOR.to_string()),
        });
    Ok(Figure::single(None, (5.0, 4.0), panel))
}

/// Mean and standard deviation of permutation importances, sorted by increasing mean, with a
/// reference line at 0.
pub fn plot_explanation(explanation: &Explanation) -> Result<Figure, FineTuneError> {
    let n_features = explanation.importances_mean.len();
    if n_features == 0 {
        return Err(FineTuneError::ValueError(
            "The explanation holds no feature".to_string(),
        ));
    }
    if explanation.importances_std.len() != n_features {
        return Err(FineTuneError::ValueError(format!(
            "Got {} standard deviations for {} features",
            explanation.importances_std.len(),
            n_features
        )));
    }
    if let Some(features) = &explanation.feature {
        check_names(features, n_features)?;
    }
    let order = argsort(&explanation.importances_mean);
    let categories = order
        .iter()
        .map(|&index| match &explanation.feature {
            Some(features) => features[index].clone(),
            None => index.to_string(),
        })
        .collect::<Vec<String>>();

    let mut panel = Panel::at(0, 0).with_title("Permutation importances");
    panel.series.push(Series::HorizontalBar {
        label: "importances_mean".to_string(),
        categories: categories.clone(),
        values: order
            .iter()
            .map(|&index| explanation.importances_mean[index])
            .collect(),
        color: None,
    });
    panel.series.push(Series::HorizontalBar {
        label: "importances_std".to_string(),
        categories,
        values: order
            .iter()
            .map(|&index| explanation.importances_std[index])
            .collect(),
        color: None,
    });
    panel.reference_lines.push(ReferenceLine::Vertical(0.0));
    Ok(Figure::single(None, (9.0, 7.0), panel))
}
