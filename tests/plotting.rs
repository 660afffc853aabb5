use translation_finetune::plotting::{
    dendrogram_leaves, pearson_correlation, plot_correlation_matrix, plot_dendrogram,
    plot_distributions, plot_explanation, plot_impurity_feature_importance,
    plot_permutation_feature_importance, plot_permutation_feature_importance_train_vs_test,
    Column, DataFrame, Explanation, PermutationImportance, ReferenceLine, Series,
};
use translation_finetune::FineTuneError;

fn bar_categories(series: &Series) -> (Vec<String>, Vec<f64>) {
    match series {
        Series::HorizontalBar {
            categories, values, ..
        } => (categories.clone(), values.clone()),
        other => panic!("expected a bar series, got {:?}", other),
    }
}

#[test]
fn distributions_grid_and_panel_kinds() -> anyhow::Result<()> {
    let data = DataFrame::new()
        .with_column("age", Column::Numeric((0..40).map(|v| v as f64).collect()))?
        .with_column(
            "children",
            Column::Numeric((0..40).map(|v| (v % 3) as f64).collect()),
        )?
        .with_column(
            "region",
            Column::Categorical((0..40).map(|v| format!("r{}", v % 7)).collect()),
        )?;

    let figure = plot_distributions(&data, 2)?;

    assert_eq!(figure.title.as_deref(), Some("Distribution of features"));
    assert_eq!((figure.nrows, figure.ncols), (2, 2));
    assert_eq!(figure.size, (9.0, 9.0));
    assert_eq!(figure.panels.len(), 3);
    assert_eq!((figure.panels[2].row, figure.panels[2].column), (1, 0));
    match &figure.panels[0].series[0] {
        Series::Histogram { bins, .. } => assert_eq!(bins.len(), 30),
        other => panic!("unexpected series {:?}", other),
    }
    match &figure.panels[1].series[0] {
        Series::Count {
            categories, counts, ..
        } => {
            assert_eq!(categories, &["0", "1", "2"]);
            assert_eq!(counts, &[14, 13, 13]);
        }
        other => panic!("unexpected series {:?}", other),
    }
    assert!(matches!(
        figure.panels[2].series[0],
        Series::Count { .. }
    ));
    Ok(())
}

#[test]
fn distributions_reject_empty_input() {
    assert!(matches!(
        plot_distributions(&DataFrame::new(), 3),
        Err(FineTuneError::ValueError(_))
    ));
}

#[test]
fn permutation_importance_sorted_descending() -> anyhow::Result<()> {
    let result = PermutationImportance::new(vec![
        vec![0.1, 0.1, 0.1],
        vec![0.5, 0.4, 0.6],
        vec![0.2, 0.3, 0.1],
    ])?;

    let figure = plot_permutation_feature_importance(&result, &["a", "b", "c"], "Test set", Some(2))?;

    let panel = &figure.panels[0];
    assert_eq!(panel.title.as_deref(), Some("Test set"));
    let labels = panel
        .series
        .iter()
        .map(|series| match series {
            Series::Box { label, .. } => label.clone(),
            other => panic!("unexpected series {:?}", other),
        })
        .collect::<Vec<String>>();
    assert_eq!(labels, vec!["b", "c"]);

    let unlimited = plot_permutation_feature_importance(&result, &["a", "b", "c"], "Test set", Some(0))?;
    assert_eq!(unlimited.panels[0].series.len(), 3);
    Ok(())
}

#[test]
fn train_vs_test_panels_sorted_ascending() -> anyhow::Result<()> {
    let train = PermutationImportance::new(vec![vec![0.3], vec![0.1], vec![0.2]])?;
    let test = PermutationImportance::new(vec![vec![0.0], vec![0.4]])?;

    let figure = plot_permutation_feature_importance_train_vs_test(
        &train,
        &["a", "b", "c"],
        &test,
        &["x", "y"],
        "Train vs test",
    )?;

    assert_eq!((figure.nrows, figure.ncols), (1, 2));
    let (train_names, train_values) = bar_categories(&figure.panels[0].series[0]);
    assert_eq!(train_names, vec!["b", "c", "a"]);
    assert_eq!(train_values, vec![0.1, 0.2, 0.3]);
    let (test_names, _) = bar_categories(&figure.panels[1].series[0]);
    assert_eq!(test_names, vec!["x", "y"]);

    assert!(plot_permutation_feature_importance_train_vs_test(
        &train,
        &["a"],
        &test,
        &["x", "y"],
        "mismatch"
    )
    .is_err());
    Ok(())
}

#[test]
fn impurity_importance_labels_and_top_n() -> anyhow::Result<()> {
    let figure = plot_impurity_feature_importance(
        &[0.2, 0.5, 0.3],
        &["a", "b", "c"],
        "Random forest",
        Some(2),
    )?;

    let panel = &figure.panels[0];
    assert_eq!(
        panel.x_label.as_deref(),
        Some("Feature Importance (mean decrease in impurity)")
    );
    assert_eq!(panel.y_label.as_deref(), Some("Feature Names"));
    let (names, values) = bar_categories(&panel.series[0]);
    assert_eq!(names, vec!["b", "c"]);
    assert_eq!(values, vec![0.5, 0.3]);

    let unlimited =
        plot_impurity_feature_importance(&[0.2, 0.5, 0.3], &["a", "b", "c"], "Random forest", Some(0))?;
    let (names, _) = bar_categories(&unlimited.panels[0].series[0]);
    assert_eq!(names, vec!["b", "c", "a"]);
    Ok(())
}

#[test]
fn explanation_bars_with_zero_line() -> anyhow::Result<()> {
    let explanation = Explanation {
        feature: Some(vec!["a".to_string(), "b".to_string()]),
        importances_mean: vec![0.4, -0.1],
        importances_std: vec![0.05, 0.02],
    };

    let figure = plot_explanation(&explanation)?;

    let panel = &figure.panels[0];
    assert_eq!(panel.title.as_deref(), Some("Permutation importances"));
    assert_eq!(panel.reference_lines, vec![ReferenceLine::Vertical(0.0)]);
    let (names, means) = bar_categories(&panel.series[0]);
    assert_eq!(names, vec!["b", "a"]);
    assert_eq!(means, vec![-0.1, 0.4]);
    let (_, stds) = bar_categories(&panel.series[1]);
    assert_eq!(stds, vec![0.02, 0.05]);

    let from_result = Explanation::from(&PermutationImportance::new(vec![vec![1.0, 3.0]])?);
    assert_eq!(from_result.importances_mean, vec![2.0]);
    assert_eq!(from_result.importances_std, vec![1.0]);
    Ok(())
}

#[test]
fn correlation_matrix_masks_upper_triangle() -> anyhow::Result<()> {
    let data = DataFrame::new()
        .with_column("x", Column::Numeric(vec![1.0, 2.0, 3.0, 4.0]))?
        .with_column("y", Column::Numeric(vec![2.0, 4.0, 6.0, 8.0]))?
        .with_column("z", Column::Numeric(vec![4.0, 3.0, 2.0, 1.0]))?;

    let correlations = pearson_correlation(&data)?;
    assert!((correlations[0][1] - 1.0).abs() < 1e-12);
    assert!((correlations[0][2] + 1.0).abs() < 1e-12);

    let figure = plot_correlation_matrix(&data, true)?;
    match &figure.panels[0].series[0] {
        Series::Heatmap {
            labels,
            values,
            annotate,
        } => {
            assert_eq!(labels, &["x", "y", "z"]);
            assert!(*annotate);
            assert_eq!(values[0], vec![Some(1.0), None, None]);
            assert_eq!(values[1], vec![Some(1.0), Some(1.0), None]);
            assert_eq!(values[2], vec![Some(-1.0), Some(-1.0), Some(1.0)]);
        }
        other => panic!("unexpected series {:?}", other),
    }
    Ok(())
}

#[test]
fn correlation_rejects_categorical_columns() -> anyhow::Result<()> {
    let data = DataFrame::new()
        .with_column("x", Column::Numeric(vec![1.0, 2.0]))?
        .with_column("label", Column::Categorical(vec!["a".into(), "b".into()]))?;
    assert!(matches!(
        plot_correlation_matrix(&data, false),
        Err(FineTuneError::ValueError(_))
    ));
    Ok(())
}

#[test]
fn dendrogram_orders_higher_merges_first() -> anyhow::Result<()> {
    // ((0, 1) at 0.2, (2, 3) at 0.6) merged at 1.0
    let linkage = [
        [0.0, 1.0, 0.2, 2.0],
        [2.0, 3.0, 0.6, 2.0],
        [4.0, 5.0, 1.0, 4.0],
    ];

    assert_eq!(dendrogram_leaves(&linkage, 4)?, vec![3, 2, 1, 0]);

    let figure = plot_dendrogram(&linkage, &["a", "b", "c", "d"])?;
    let panel = &figure.panels[0];
    assert_eq!(panel.title.as_deref(), Some("Dendrogram"));
    assert_eq!(panel.x_label.as_deref(), Some("Feature"));
    assert_eq!(panel.y_label.as_deref(), Some("Distance"));
    match &panel.series[0] {
        Series::Dendrogram { leaves, links } => {
            assert_eq!(leaves, &["d", "c", "b", "a"]);
            assert_eq!(links.len(), 3);
            let root = &links[2];
            assert_eq!(root.y[1], 1.0);
            assert_eq!(root.x, [10.0, 10.0, 30.0, 30.0]);
        }
        other => panic!("unexpected series {:?}", other),
    }

    assert!(plot_dendrogram(&linkage, &["a", "b"]).is_err());
    assert!(plot_dendrogram(&[[0.0, 0.0, 0.1, 2.0]], &["a", "b"]).is_err());
    Ok(())
}

#[test]
fn figures_serialize_to_json() -> anyhow::Result<()> {
    let figure = plot_impurity_feature_importance(&[0.7, 0.3], &["a", "b"], "title", None)?;
    let json = serde_json::to_value(&figure)?;
    assert_eq!(json["panels"][0]["series"][0]["kind"], "horizontal_bar");
    Ok(())
}
