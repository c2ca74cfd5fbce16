use crate::cleaner::{self, CleaningDirective};
use crate::diagnostics::{self, DiagnosticKind};
use crate::error::AnalysisError;
use crate::graph::{self, ChartKind, GraphSize};
use crate::report::{self, Report};
use crate::summary;
use crate::table::Table;
use std::path::Path;

/// Everything the user selected on the upload form, parsed.
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub directive: CleaningDirective,
    pub charts: Vec<ChartKind>,
    pub diagnostics: Vec<DiagnosticKind>,
    pub size: GraphSize,
}

impl AnalysisRequest {
    /// Parse the upload form fields. Unknown `graph_option` values are
    /// ignored; an unknown `graph_size` makes the whole request invalid.
    pub fn from_form(
        clean_option: Option<&str>,
        graph_options: &[String],
        graph_size: &str,
    ) -> Result<Self, AnalysisError> {
        Ok(AnalysisRequest {
            directive: CleaningDirective::from_form(clean_option),
            charts: graph_options
                .iter()
                .filter_map(|v| ChartKind::from_form(v))
                .collect(),
            diagnostics: graph_options
                .iter()
                .filter_map(|v| DiagnosticKind::from_form(v))
                .collect(),
            size: GraphSize::from_form(graph_size)?,
        })
    }
}

/// Run the full cleaning-and-analysis pipeline over a freshly loaded table:
/// clean, then summarize, chart, and diagnose the cleaned table, then
/// assemble the report. Chart artifacts are written into `artifact_dir`.
///
/// Returns the cleaned table alongside the report so the caller can retain
/// it for a later download.
pub fn run(
    raw: Table,
    request: &AnalysisRequest,
    artifact_dir: &Path,
) -> Result<(Table, Report), AnalysisError> {
    let cleaned = cleaner::apply(&raw, request.directive);

    let summary_html = summary::describe(&cleaned).to_html();
    let null_info_html = summary::missing_report(&cleaned).to_html();

    let image_paths = graph::render_charts(&cleaned, &request.charts, request.size, artifact_dir)?
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    let advanced_html = diagnostics::run_diagnostics(&cleaned, &request.diagnostics)?;

    let report = report::assemble(summary_html, null_info_html, image_paths, advanced_html);
    Ok((cleaned, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_parsing_splits_charts_from_diagnostics() {
        let options = vec![
            "histogram".to_string(),
            "regression".to_string(),
            "spiral".to_string(),
        ];
        let request = AnalysisRequest::from_form(Some("fill_mean"), &options, "large").unwrap();

        assert_eq!(request.directive, CleaningDirective::FillMean);
        assert_eq!(request.charts, vec![ChartKind::Histogram]);
        assert_eq!(request.diagnostics, vec![DiagnosticKind::Regression]);
        assert_eq!(request.size, GraphSize::Large);
    }

    #[test]
    fn invalid_size_invalidates_the_request() {
        let err = AnalysisRequest::from_form(None, &[], "gigantic").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidGraphSize(_)));
    }
}
