//! # Analysis figures
//!
//! Helpers turning already computed statistics into `Figure` descriptions: feature
//! distributions, permutation and impurity feature importances, correlation heatmaps and
//! dendrograms of hierarchical clusterings.
//!
//! Figures are plain data and implement `Serialize`, so they can be written to JSON and drawn by
//! any renderer. No file is written by these functions.
//!
//! ```
//! # fn main() -> anyhow::Result<()> {
//! use translation_finetune::plotting::{plot_correlation_matrix, Column, DataFrame};
//!
//! let data = DataFrame::new()
//!     .with_column("x", Column::Numeric(vec![1.0, 2.0, 3.0, 4.0]))?
//!     .with_column("y", Column::Numeric(vec![2.0, 4.0, 6.0, 8.0]))?;
//! let figure = plot_correlation_matrix(&data, true)?;
//! println!("{}", serde_json::to_string_pretty(&figure)?);
//! # Ok(())
//! # }
//! ```

mod correlation;
mod data_frame;
mod dendrogram;
mod distribution;
mod figure;
mod importance;

pub use correlation::{pearson_correlation, plot_correlation_matrix};
pub use data_frame::{Column, DataFrame};
pub use dendrogram::{dendrogram_leaves, plot_dendrogram};
pub use distribution::plot_distributions;
pub use figure::{
    DendrogramLink, Figure, HistogramBin, Panel, ReferenceLine, Series, DEFAULT_COLOR,
};
pub use importance::{
    plot_explanation, plot_impurity_feature_importance, plot_permutation_feature_importance,
    plot_permutation_feature_importance_train_vs_test, Explanation, PermutationImportance,
};
