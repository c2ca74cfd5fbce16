use crate::error::AnalysisError;
use crate::table::{Column, Table};
use log::info;
use plotters::prelude::*;
use std::error::Error;
use std::path::{Path, PathBuf};

/// Chart kinds the renderer can produce, in their fixed processing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    /// One 20-bin histogram per numeric column, all on one canvas.
    Histogram,
    /// Annotated Pearson correlation matrix of the numeric columns.
    Heatmap,
    /// Box-and-whisker summary per numeric column.
    Boxplot,
    /// Pairwise scatter/histogram grid over the numeric columns.
    Pairplot,
}

impl ChartKind {
    /// Processing order is fixed regardless of the order the form sent.
    pub const ALL: [ChartKind; 4] = [
        ChartKind::Histogram,
        ChartKind::Heatmap,
        ChartKind::Boxplot,
        ChartKind::Pairplot,
    ];

    /// Map an upload form `graph_option` value; unknown kinds are ignored
    /// by the caller.
    pub fn from_form(value: &str) -> Option<Self> {
        match value {
            "histogram" => Some(ChartKind::Histogram),
            "heatmap" => Some(ChartKind::Heatmap),
            "boxplot" => Some(ChartKind::Boxplot),
            "pairplot" => Some(ChartKind::Pairplot),
            _ => None,
        }
    }

    /// Stable, kind-derived artifact name.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            ChartKind::Histogram => "histogram.png",
            ChartKind::Heatmap => "heatmap.png",
            ChartKind::Boxplot => "boxplot.png",
            ChartKind::Pairplot => "pairplot.png",
        }
    }
}

/// Canvas size preset selected by the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphSize {
    Small,
    Medium,
    Large,
}

impl GraphSize {
    /// The form value must resolve to a known preset; anything else makes
    /// the request invalid.
    pub fn from_form(value: &str) -> Result<Self, AnalysisError> {
        match value {
            "small" => Ok(GraphSize::Small),
            "medium" => Ok(GraphSize::Medium),
            "large" => Ok(GraphSize::Large),
            other => Err(AnalysisError::InvalidGraphSize(other.to_string())),
        }
    }

    /// Pixel dimensions of the canvas.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            GraphSize::Small => (800, 400),
            GraphSize::Medium => (1000, 600),
            GraphSize::Large => (1200, 800),
        }
    }
}

/// Render the requested chart kinds for a table, writing one PNG per kind
/// into `dir` and returning the written paths in processing order.
///
/// The heatmap is skipped silently when the table has no numeric column.
/// Failures during a draw are not caught here; they surface to the caller
/// as [`AnalysisError::Render`].
pub fn render_charts(
    table: &Table,
    requested: &[ChartKind],
    size: GraphSize,
    dir: &Path,
) -> Result<Vec<PathBuf>, AnalysisError> {
    std::fs::create_dir_all(dir)?;
    let mut paths = Vec::new();

    for kind in ChartKind::ALL {
        if !requested.contains(&kind) {
            continue;
        }
        let path = dir.join(kind.artifact_name());
        let drawn = match kind {
            ChartKind::Histogram => save_histograms(table, size, &path),
            ChartKind::Heatmap => {
                if table.numeric_columns().is_empty() {
                    info!("heatmap skipped: no numeric columns");
                    continue;
                }
                save_heatmap(table, size, &path)
            }
            ChartKind::Boxplot => save_boxplot(table, size, &path),
            ChartKind::Pairplot => save_pairplot(table, size, &path),
        };
        drawn.map_err(|e| AnalysisError::Render(e.to_string()))?;
        info!("rendered {:?} to {}", kind, path.display());
        paths.push(path);
    }

    Ok(paths)
}

const HIST_BINS: usize = 20;

// (min, max) guarded against a degenerate range so an axis can always be
// built.
fn span(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = values.iter().copied().reduce(f64::max).unwrap_or(1.0);
    if min == max { (min, min + 1.0) } else { (min, max) }
}

fn bin_counts(values: &[f64], min: f64, max: f64) -> Vec<usize> {
    let width = (max - min) / HIST_BINS as f64;
    let mut counts = vec![0usize; HIST_BINS];
    for &v in values {
        let mut idx = ((v - min) / width) as usize;
        if idx >= HIST_BINS {
            idx = HIST_BINS - 1;
        }
        counts[idx] += 1;
    }
    counts
}

/// One histogram per numeric column, laid out on a near-square grid on a
/// single canvas. Fails when the table has no numeric column, matching the
/// propagation policy for rendering errors.
fn save_histograms(table: &Table, size: GraphSize, path: &Path) -> Result<(), Box<dyn Error>> {
    let numeric = table.numeric_columns();
    if numeric.is_empty() {
        return Err("histogram requires at least one numeric column".into());
    }

    let root = BitMapBackend::new(path, size.dimensions()).into_drawing_area();
    root.fill(&WHITE)?;

    let cols = (numeric.len() as f64).sqrt().ceil() as usize;
    let rows = numeric.len().div_ceil(cols);
    let areas = root.split_evenly((rows, cols));

    for (col, area) in numeric.iter().copied().zip(areas.iter()) {
        draw_histogram_cell(col, area, true)?;
    }

    root.present()?;
    Ok(())
}

fn draw_histogram_cell<DB: DrawingBackend>(
    col: &Column,
    area: &DrawingArea<DB, plotters::coord::Shift>,
    captioned: bool,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    let values = col.numbers();
    let (min, max) = span(&values);
    let counts = bin_counts(&values, min, max);
    let peak = counts.iter().copied().max().unwrap_or(0).max(1);
    let width = (max - min) / HIST_BINS as f64;

    let mut builder = ChartBuilder::on(area);
    if captioned {
        builder.caption(&col.name, ("sans-serif", 16));
    }
    let mut chart = builder
        .margin(8)
        .x_label_area_size(24)
        .y_label_area_size(32)
        .build_cartesian_2d(min..max, 0usize..peak + peak / 10 + 1)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .label_style(("sans-serif", 11))
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
        let x0 = min + i as f64 * width;
        Rectangle::new([(x0, 0), (x0 + width, count)], BLUE.mix(0.6).filled())
    }))?;
    chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
        let x0 = min + i as f64 * width;
        Rectangle::new([(x0, 0), (x0 + width, count)], BLACK)
    }))?;

    Ok(())
}

// Pearson correlation over the rows where both columns are observed.
fn pearson(a: &Column, b: &Column) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .values
        .iter()
        .zip(b.values.iter())
        .filter_map(|(x, y)| Some((x.as_number()?, y.as_number()?)))
        .collect();
    let n = pairs.len() as f64;
    if pairs.is_empty() {
        return f64::NAN;
    }
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

fn heat_color(v: f64) -> RGBColor {
    if v.is_nan() {
        return RGBColor(200, 200, 200);
    }
    let v = v.clamp(-1.0, 1.0);
    if v >= 0.0 {
        // white -> red
        let t = v;
        RGBColor(255, (255.0 * (1.0 - t * 0.8)) as u8, (255.0 * (1.0 - t * 0.8)) as u8)
    } else {
        // white -> blue
        let t = -v;
        RGBColor((255.0 * (1.0 - t * 0.8)) as u8, (255.0 * (1.0 - t * 0.8)) as u8, 255)
    }
}

/// Annotated correlation matrix of the numeric columns. The caller skips
/// this chart entirely when no numeric columns exist.
fn save_heatmap(table: &Table, size: GraphSize, path: &Path) -> Result<(), Box<dyn Error>> {
    let numeric = table.numeric_columns();
    let n = numeric.len();

    let root = BitMapBackend::new(path, size.dimensions()).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Correlation", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..n as f64, 0.0..n as f64)?;

    let names: Vec<String> = numeric.iter().map(|c| c.name.clone()).collect();
    let x_names = names.clone();
    let y_names = names.clone();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&move |v: &f64| {
            x_names.get(v.floor() as usize).cloned().unwrap_or_default()
        })
        .y_label_formatter(&move |v: &f64| {
            y_names.get(v.floor() as usize).cloned().unwrap_or_default()
        })
        .label_style(("sans-serif", 12))
        .draw()?;

    let mut cells = Vec::new();
    let mut labels = Vec::new();
    for (i, row) in numeric.iter().enumerate() {
        for (j, col) in numeric.iter().enumerate() {
            let r = pearson(row, col);
            cells.push(Rectangle::new(
                [(j as f64, i as f64), (j as f64 + 1.0, i as f64 + 1.0)],
                heat_color(r).filled(),
            ));
            labels.push(Text::new(
                format!("{:.2}", r),
                (j as f64 + 0.35, i as f64 + 0.5),
                ("sans-serif", 13),
            ));
        }
    }
    chart.draw_series(cells)?;
    chart.draw_series(labels)?;

    root.present()?;
    Ok(())
}

/// Box-and-whisker per numeric column. With zero numeric columns the draw
/// is still attempted and yields an empty chart.
fn save_boxplot(table: &Table, size: GraphSize, path: &Path) -> Result<(), Box<dyn Error>> {
    let numeric = table.numeric_columns();
    let n = numeric.len();

    let root = BitMapBackend::new(path, size.dimensions()).into_drawing_area();
    root.fill(&WHITE)?;

    let all_values: Vec<f64> = numeric.iter().flat_map(|c| c.numbers()).collect();
    let (min, max) = span(&all_values);
    let pad = (max - min) * 0.1;

    let mut chart = ChartBuilder::on(&root)
        .caption("Boxplot", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(32)
        .y_label_area_size(44)
        .build_cartesian_2d(
            (0..n.max(1) as i32).into_segmented(),
            (min - pad) as f32..(max + pad) as f32,
        )?;

    let names: Vec<String> = numeric.iter().map(|c| c.name.clone()).collect();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_label_formatter(&move |v| match v {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
                names.get(*i as usize).cloned().unwrap_or_default()
            }
            SegmentValue::Last => String::new(),
        })
        .label_style(("sans-serif", 12))
        .draw()?;

    chart.draw_series(numeric.iter().enumerate().filter_map(|(i, col)| {
        let values = col.numbers();
        if values.is_empty() {
            return None;
        }
        let quartiles = Quartiles::new(&values);
        Some(
            Boxplot::new_vertical(SegmentValue::CenterOf(i as i32), &quartiles)
                .width(20)
                .style(BLUE),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Pairwise scatter/histogram grid over the numeric columns: histograms on
/// the diagonal, scatter plots everywhere else.
fn save_pairplot(table: &Table, size: GraphSize, path: &Path) -> Result<(), Box<dyn Error>> {
    let numeric = table.numeric_columns();
    let n = numeric.len();

    let root = BitMapBackend::new(path, size.dimensions()).into_drawing_area();
    root.fill(&WHITE)?;

    if n == 0 {
        root.present()?;
        return Ok(());
    }

    let areas = root.split_evenly((n, n));
    for i in 0..n {
        for j in 0..n {
            let area = &areas[i * n + j];
            if i == j {
                draw_histogram_cell(numeric[i], area, true)?;
            } else {
                draw_scatter_cell(numeric[j], numeric[i], area)?;
            }
        }
    }

    root.present()?;
    Ok(())
}

fn draw_scatter_cell<DB: DrawingBackend>(
    x_col: &Column,
    y_col: &Column,
    area: &DrawingArea<DB, plotters::coord::Shift>,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    let points: Vec<(f64, f64)> = x_col
        .values
        .iter()
        .zip(y_col.values.iter())
        .filter_map(|(x, y)| Some((x.as_number()?, y.as_number()?)))
        .collect();

    let (min_x, max_x) = span(&points.iter().map(|(x, _)| *x).collect::<Vec<_>>());
    let (min_y, max_y) = span(&points.iter().map(|(_, y)| *y).collect::<Vec<_>>());

    let mut chart = ChartBuilder::on(area)
        .margin(8)
        .x_label_area_size(24)
        .y_label_area_size(32)
        .build_cartesian_2d(min_x..max_x, min_y..max_y)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .label_style(("sans-serif", 11))
        .draw()?;

    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 2, BLUE.filled())),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::from_csv;
    use tempfile::tempdir;

    fn sample_table() -> Table {
        from_csv(b"a,b,label\n1,10,x\n2,15,y\n3,9,x\n4,30,y\n5,22,x\n").unwrap()
    }

    #[test]
    fn form_parsing_ignores_unknown_kinds() {
        assert_eq!(ChartKind::from_form("histogram"), Some(ChartKind::Histogram));
        assert_eq!(ChartKind::from_form("piechart"), None);
        // feature_importance is a diagnostic, not a chart
        assert_eq!(ChartKind::from_form("feature_importance"), None);
    }

    #[test]
    fn size_presets_resolve_or_reject() {
        assert_eq!(GraphSize::from_form("small").unwrap().dimensions(), (800, 400));
        assert_eq!(GraphSize::from_form("medium").unwrap().dimensions(), (1000, 600));
        assert_eq!(GraphSize::from_form("large").unwrap().dimensions(), (1200, 800));
        assert!(GraphSize::from_form("huge").is_err());
    }

    #[test]
    fn histogram_request_produces_one_artifact_at_preset_size() {
        let dir = tempdir().unwrap();
        let paths = render_charts(
            &sample_table(),
            &[ChartKind::Histogram],
            GraphSize::Medium,
            dir.path(),
        )
        .unwrap();

        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("histogram.png"));
        let (w, h) = image::image_dimensions(&paths[0]).unwrap();
        assert_eq!((w, h), (1000, 600));
    }

    #[test]
    fn artifacts_come_back_in_fixed_kind_order() {
        let dir = tempdir().unwrap();
        // Request order deliberately scrambled.
        let paths = render_charts(
            &sample_table(),
            &[ChartKind::Pairplot, ChartKind::Histogram, ChartKind::Heatmap],
            GraphSize::Small,
            dir.path(),
        )
        .unwrap();

        let names: Vec<&str> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["histogram.png", "heatmap.png", "pairplot.png"]);
    }

    #[test]
    fn heatmap_on_text_only_table_is_skipped_silently() {
        let table = from_csv(b"x,y\na,u\nb,v\n").unwrap();
        let dir = tempdir().unwrap();
        let paths =
            render_charts(&table, &[ChartKind::Heatmap], GraphSize::Small, dir.path()).unwrap();
        assert!(paths.is_empty());
        assert!(!dir.path().join("heatmap.png").exists());
    }

    #[test]
    fn boxplot_on_text_only_table_still_draws() {
        let table = from_csv(b"x\na\nb\n").unwrap();
        let dir = tempdir().unwrap();
        let paths =
            render_charts(&table, &[ChartKind::Boxplot], GraphSize::Small, dir.path()).unwrap();
        assert_eq!(paths.len(), 1);
        assert!(dir.path().join("boxplot.png").exists());
    }

    #[test]
    fn histogram_on_text_only_table_propagates_a_render_error() {
        let table = from_csv(b"x\na\nb\n").unwrap();
        let dir = tempdir().unwrap();
        let err = render_charts(&table, &[ChartKind::Histogram], GraphSize::Small, dir.path())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Render(_)));
    }

    #[test]
    fn pearson_of_identical_columns_is_one() {
        let table = from_csv(b"a,b\n1,2\n2,4\n3,6\n").unwrap();
        let r = pearson(&table.columns[0], &table.columns[1]);
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_of_constant_column_is_nan() {
        let table = from_csv(b"a,b\n1,5\n2,5\n3,5\n").unwrap();
        assert!(pearson(&table.columns[0], &table.columns[1]).is_nan());
    }
}
