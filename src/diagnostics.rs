use crate::error::AnalysisError;
use crate::table::Table;
use log::info;
use rand::seq::SliceRandom;
use rand::thread_rng;
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{LinearRegression, LinearRegressionParameters};

/// Model-based analyses beyond descriptive statistics, in their fixed
/// processing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    FeatureImportance,
    Regression,
}

impl DiagnosticKind {
    pub const ALL: [DiagnosticKind; 2] =
        [DiagnosticKind::FeatureImportance, DiagnosticKind::Regression];

    /// Diagnostics arrive through the same multi-select as the chart kinds.
    pub fn from_form(value: &str) -> Option<Self> {
        match value {
            "feature_importance" => Some(DiagnosticKind::FeatureImportance),
            "regression" => Some(DiagnosticKind::Regression),
            _ => None,
        }
    }
}

// Feature matrix and target extracted from the numeric sub-table: rows with
// any missing numeric value dropped, every numeric column but the last as a
// feature, the last as the target. `None` when the split is impossible
// (zero rows or fewer than two numeric columns) - the diagnostic is then
// skipped silently.
struct FeatureSplit {
    feature_names: Vec<String>,
    rows: Vec<Vec<f64>>,
    target: Vec<f64>,
}

fn feature_split(table: &Table) -> Option<FeatureSplit> {
    let numeric = table.numeric_subtable();
    if numeric.is_empty() || numeric.width() < 2 {
        return None;
    }

    let (features, target_col) = numeric.columns.split_at(numeric.width() - 1);
    let feature_names = features.iter().map(|c| c.name.clone()).collect();
    let rows = (0..numeric.height())
        .map(|r| {
            features
                .iter()
                .map(|c| c.values[r].as_number().unwrap_or(f64::NAN))
                .collect()
        })
        .collect();
    let target = target_col[0]
        .values
        .iter()
        .map(|v| v.as_number().unwrap_or(f64::NAN))
        .collect();

    Some(FeatureSplit {
        feature_names,
        rows,
        target,
    })
}

fn r2_score(observed: &[f64], predicted: &[f64]) -> f64 {
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let ss_tot: f64 = observed.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

/// Run the requested diagnostics and return their rendered blocks,
/// concatenated in the fixed order (feature importance before regression).
/// Diagnostics whose skip condition holds contribute nothing.
pub fn run_diagnostics(
    table: &Table,
    requested: &[DiagnosticKind],
) -> Result<String, AnalysisError> {
    let mut markup = String::new();
    for kind in DiagnosticKind::ALL {
        if !requested.contains(&kind) {
            continue;
        }
        let block = match kind {
            DiagnosticKind::FeatureImportance => feature_importance(table)?,
            DiagnosticKind::Regression => regression(table)?,
        };
        match block {
            Some(html) => markup.push_str(&html),
            None => info!("{:?} skipped: not enough numeric data", kind),
        }
    }
    Ok(markup)
}

/// Fit a 100-tree random forest on the feature/target split and score each
/// feature by permutation importance: the drop in R² when that feature's
/// column is shuffled. The forest and the shuffles are unseeded, so scores
/// vary from run to run.
pub fn feature_importance(table: &Table) -> Result<Option<String>, AnalysisError> {
    let Some(split) = feature_split(table) else {
        return Ok(None);
    };

    let x = DenseMatrix::from_2d_vec(&split.rows);
    let params = RandomForestRegressorParameters::default().with_n_trees(100);
    let forest = RandomForestRegressor::fit(&x, &split.target, params)
        .map_err(|e| AnalysisError::Fit(e.to_string()))?;
    let baseline = r2_score(
        &split.target,
        &forest
            .predict(&x)
            .map_err(|e| AnalysisError::Fit(e.to_string()))?,
    );

    let mut rng = thread_rng();
    let mut scores: Vec<(String, f64)> = Vec::with_capacity(split.feature_names.len());
    for (j, name) in split.feature_names.iter().enumerate() {
        let mut column: Vec<f64> = split.rows.iter().map(|row| row[j]).collect();
        column.shuffle(&mut rng);

        let permuted: Vec<Vec<f64>> = split
            .rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                let mut row = row.clone();
                row[j] = column[r];
                row
            })
            .collect();
        let permuted_x = DenseMatrix::from_2d_vec(&permuted);
        let predicted = forest
            .predict(&permuted_x)
            .map_err(|e| AnalysisError::Fit(e.to_string()))?;
        scores.push((name.clone(), baseline - r2_score(&split.target, &predicted)));
    }

    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut html = String::from("<h2>Feature Importance:</h2><table border=\"1\" class=\"dataframe\">\n<thead><tr><th></th><th>Importance</th></tr></thead>\n<tbody>\n");
    for (name, score) in &scores {
        html.push_str(&format!(
            "<tr><th>{}</th><td>{:.6}</td></tr>\n",
            name, score
        ));
    }
    html.push_str("</tbody>\n</table>");
    Ok(Some(html))
}

/// Ordinary-least-squares fit on the feature/target split, reporting the
/// coefficient of determination to two decimals.
pub fn regression(table: &Table) -> Result<Option<String>, AnalysisError> {
    let Some(split) = feature_split(table) else {
        return Ok(None);
    };

    let x = DenseMatrix::from_2d_vec(&split.rows);
    let model = LinearRegression::fit(&x, &split.target, LinearRegressionParameters::default())
        .map_err(|e| AnalysisError::Fit(e.to_string()))?;
    let predicted = model
        .predict(&x)
        .map_err(|e| AnalysisError::Fit(e.to_string()))?;
    let score = r2_score(&split.target, &predicted);

    Ok(Some(format!(
        "<h2>Linear Regression R² Score: {:.2}</h2>",
        score
    )))
}
