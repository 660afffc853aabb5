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
use crate::plotting::figure::{DendrogramLink, Figure, Panel, Series};

/// Horizontal spacing between two consecutive leaves
const LEAF_SPACING: f64 = 10.0;

#[derive(Debug, Clone, Copy)]
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
}

/// Validates a linkage matrix for `n` observations. Row `i` merges two clusters into cluster
/// `n + i`; indices below `n` are observations.
fn parse_linkage(linkage: &[[f64; 4]], n: usize) -> Result<Vec<Merge>, FineTuneError> {
    if n < 2 {
        return Err(FineTuneError::ValueError(
            "A dendrogram needs at least 2 features".to_string(),
        ));
    }
    if linkage.len() != n - 1 {
        return Err(FineTuneError::ValueError(format!(
            "A linkage matrix for {} features must have {} rows, got {}",
            n,
            n - 1,
            linkage.len()
        )));
    }
    let mut used = vec![false; 2 * n - 1];
    let mut merges = Vec::with_capacity(linkage.len());
    for (row, &[left, right, distance, _]) in linkage.iter().enumerate() {
        let mut children = [0usize; 2];
        for (slot, &child) in children.iter_mut().zip([left, right].iter()) {
            if child < 0.0 || child.fract() != 0.0 || child as usize >= n + row {
                return Err(FineTuneError::ValueError(format!(
                    "Invalid cluster index {} in linkage row {}",
                    child, row
                )));
            }
            let child = child as usize;
            if used[child] {
                return Err(FineTuneError::ValueError(format!(
                    "Cluster {} is merged more than once",
                    child
                )));
            }
            used[child] = true;
            *slot = child;
        }
        if !distance.is_finite() || distance < 0.0 {
            return Err(FineTuneError::ValueError(format!(
                "Invalid merge distance {} in linkage row {}",
                distance, row
            )));
        }
        merges.push(Merge {
            left: children[0],
            right: children[1],
            distance,
        });
    }
    Ok(merges)
}

struct DendrogramBuilder<'a> {
    merges: &'a [Merge],
    n: usize,
    leaves: Vec<usize>,
    links: Vec<DendrogramLink>,
}

impl<'a> DendrogramBuilder<'a> {
    fn height(&self, cluster: usize) -> f64 {
        if cluster < self.n {
            0.0
        } else {
            self.merges[cluster - self.n].distance
        }
    }

    /// Lays out `cluster` and returns the x position of its top and its height. Children are
    /// visited higher merge first.
    fn visit(&mut self, cluster: usize) -> (f64, f64) {
        if cluster < self.n {
            let x = LEAF_SPACING / 2.0 + LEAF_SPACING * self.leaves.len() as f64;
            self.leaves.push(cluster);
            return (x, 0.0);
        }
        let merge = self.merges[cluster - self.n];
        let (first, second) = if self.height(merge.left) > self.height(merge.right) {
            (merge.left, merge.right)
        } else {
            (merge.right, merge.left)
        };
        let (x_first, h_first) = self.visit(first);
        let (x_second, h_second) = self.visit(second);
        self.links.push(DendrogramLink {
            x: [x_first, x_first, x_second, x_second],
            y: [h_first, merge.distance, merge.distance, h_second],
        });
        ((x_first + x_second) / 2.0, merge.distance)
    }
}

fn layout(
    linkage: &[[f64; 4]],
    n: usize,
) -> Result<(Vec<usize>, Vec<DendrogramLink>), FineTuneError> {
    let merges = parse_linkage(linkage, n)?;
    let mut builder = DendrogramBuilder {
        merges: &merges,
        n,
        leaves: Vec::with_capacity(n),
        links: Vec::with_capacity(n - 1),
    };
    builder.visit(2 * n - 2);
    Ok((builder.leaves, builder.links))
}

/// Leaf order of a hierarchical clustering, children sorted by descending merge distance.
pub fn dendrogram_leaves(linkage: &[[f64; 4]], n: usize) -> Result<Vec<usize>, FineTuneError> {
    Ok(layout(linkage, n)?.0)
}

/// Dendrogram of a hierarchical clustering of features.
///
/// # Arguments
///
/// * `linkage` - linkage matrix with one `[cluster_a, cluster_b, distance, size]` row per merge
/// * `feature_names` - label of each clustered feature
///
/// # Example
///
/// ```
/// # fn main() -> anyhow::Result<()> {
/// use translation_finetune::plotting::{plot_dendrogram, Series};
/// let linkage = [[0.0, 1.0, 0.5, 2.0], [2.0, 3.0, 1.5, 3.0]];
/// let figure = plot_dendrogram(&linkage, &["a", "b", "c"])?;
/// match &figure.panels[0].series[0] {
///     Series::Dendrogram { leaves, .. } => assert_eq!(leaves, &["b", "a", "c"]),
///     _ => unreachable!(),
/// }
/// # Ok(())
/// # }
/// ```
pub fn plot_dendrogram<S: AsRef<str>>(
    linkage: &[[f64; 4]],
    feature_names: &[S],
) -> Result<Figure, FineTuneError> {
    let (leaves, links) = layout(linkage, feature_names.len())?;

    let panel = Panel::at(0, 0)
        .with_title("Dendrogram")
        .with_labels("Feature", "Distance")
        .with_series(Series::Dendrogram {
            leaves: leaves
                .iter()
                .map(|&leaf| feature_names[leaf].as_ref().to_string())
                .collect(),
            links,
        });
    Ok(Figure::single(None, (5.0, 5.0), panel))
}
