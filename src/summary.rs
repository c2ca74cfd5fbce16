use crate::table::Table;

/// Descriptive statistics for one numeric column.
#[derive(Clone, Debug)]
pub struct ColumnStats {
    pub name: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Descriptive-statistics table over the numeric columns of a table.
#[derive(Clone, Debug)]
pub struct DescribeReport {
    pub columns: Vec<ColumnStats>,
}

/// Per-column missing-value count and inferred type, input order preserved.
#[derive(Clone, Debug)]
pub struct MissingReport {
    pub rows: Vec<MissingRow>,
}

#[derive(Clone, Debug)]
pub struct MissingRow {
    pub name: String,
    pub missing: usize,
    pub dtype: &'static str,
}

/// Compute count/mean/std/min/quartiles/max for every numeric column.
/// Non-numeric columns are omitted, the way the original summary table
/// behaves. Pure function.
pub fn describe(table: &Table) -> DescribeReport {
    let columns = table
        .numeric_columns()
        .into_iter()
        .map(|col| ColumnStats {
            name: col.name.clone(),
            count: col.numbers().len(),
            mean: col.mean(),
            std: col.std(),
            min: col.min(),
            q25: col.quantile(0.25),
            q50: col.quantile(0.5),
            q75: col.quantile(0.75),
            max: col.max(),
        })
        .collect();
    DescribeReport { columns }
}

/// Missing-value count and inferred type per column, one row per column of
/// the input, column order preserved. Pure function.
pub fn missing_report(table: &Table) -> MissingReport {
    let rows = table
        .columns
        .iter()
        .map(|col| MissingRow {
            name: col.name.clone(),
            missing: col.missing_count(),
            dtype: col.ty.name(),
        })
        .collect();
    MissingReport { rows }
}

// Statistics are printed to six decimals, the precision the original
// summary tables used; absent statistics print as NaN.
fn fmt_stat(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.6}", v),
        None => "NaN".to_string(),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

impl DescribeReport {
    /// Render as an HTML table: statistics as rows, columns as columns.
    pub fn to_html(&self) -> String {
        let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n<thead><tr><th></th>");
        for col in &self.columns {
            html.push_str(&format!("<th>{}</th>", escape(&col.name)));
        }
        html.push_str("</tr></thead>\n<tbody>\n");

        let rows: [(&str, Box<dyn Fn(&ColumnStats) -> String>); 8] = [
            ("count", Box::new(|c| c.count.to_string())),
            ("mean", Box::new(|c| fmt_stat(c.mean))),
            ("std", Box::new(|c| fmt_stat(c.std))),
            ("min", Box::new(|c| fmt_stat(c.min))),
            ("25%", Box::new(|c| fmt_stat(c.q25))),
            ("50%", Box::new(|c| fmt_stat(c.q50))),
            ("75%", Box::new(|c| fmt_stat(c.q75))),
            ("max", Box::new(|c| fmt_stat(c.max))),
        ];
        for (label, cell) in rows.iter() {
            html.push_str(&format!("<tr><th>{}</th>", label));
            for col in &self.columns {
                html.push_str(&format!("<td>{}</td>", cell(col)));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</tbody>\n</table>");
        html
    }
}

impl MissingReport {
    /// Render as an HTML table with one row per column.
    pub fn to_html(&self) -> String {
        let mut html = String::from(
            "<table border=\"1\" class=\"dataframe\">\n<thead><tr><th></th><th>Missing Values</th><th>Data Type</th></tr></thead>\n<tbody>\n",
        );
        for row in &self.rows {
            html.push_str(&format!(
                "<tr><th>{}</th><td>{}</td><td>{}</td></tr>\n",
                escape(&row.name),
                row.missing,
                row.dtype
            ));
        }
        html.push_str("</tbody>\n</table>");
        html
    }
}
