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

/// Fill color shared by the single-color bar charts and histograms
pub const DEFAULT_COLOR: &str = "#3470a3";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// # In-memory figure description
/// A grid of panels with an optional overall title. Figures carry no rendering state and can be
/// serialized (e.g. to JSON) and drawn by any plotting backend.
pub struct Figure {
    pub title: Option<String>,
    /// Width and height in inches
    pub size: (f64, f64),
    pub nrows: usize,
    pub ncols: usize,
    pub panels: Vec<Panel>,
}

impl Figure {
    pub fn new(title: Option<String>, size: (f64, f64), nrows: usize, ncols: usize) -> Figure {
        Figure {
            title,
            size,
            nrows,
            ncols,
            panels: Vec::new(),
        }
    }

    /// Single panel figure
    pub fn single(title: Option<String>, size: (f64, f64), panel: Panel) -> Figure {
        Figure {
            title,
            size,
            nrows: 1,
            ncols: 1,
            panels: vec![panel],
        }
    }

    pub fn panel(&self, index: usize) -> Option<&Panel> {
        self.panels.get(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// # Axes of a figure
pub struct Panel {
    /// Zero-based row of the panel in the figure grid
    pub row: usize,
    /// Zero-based column of the panel in the figure grid
    pub column: usize,
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub series: Vec<Series>,
    pub reference_lines: Vec<ReferenceLine>,
}

impl Panel {
    pub fn at(row: usize, column: usize) -> Panel {
        Panel {
            row,
            column,
            ..Default::default()
        }
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Panel {
        self.title = Some(title.into());
        self
    }

    pub fn with_labels<X: Into<String>, Y: Into<String>>(mut self, x_label: X, y_label: Y) -> Panel {
        self.x_label = Some(x_label.into());
        self.y_label = Some(y_label.into());
        self
    }

    pub fn with_series(mut self, series: Series) -> Panel {
        self.series.push(series);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Segment of a dendrogram, drawn as the polyline `(x[0], y[0]) .. (x[3], y[3])`
pub struct DendrogramLink {
    pub x: [f64; 4],
    pub y: [f64; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Series {
    Histogram {
        label: String,
        bins: Vec<HistogramBin>,
        color: String,
    },
    /// Number of occurrences of each distinct value
    Count {
        label: String,
        categories: Vec<String>,
        counts: Vec<usize>,
    },
    HorizontalBar {
        label: String,
        categories: Vec<String>,
        values: Vec<f64>,
        color: Option<String>,
    },
    /// Box plot of the raw values of one category
    Box { label: String, values: Vec<f64> },
    /// Square matrix, `None` for masked or undefined cells
    Heatmap {
        labels: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
        annotate: bool,
    },
    Dendrogram {
        leaves: Vec<String>,
        links: Vec<DendrogramLink>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceLine {
    Vertical(f64),
    Horizontal(f64),
}
