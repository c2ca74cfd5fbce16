/// The assembled output of one analysis request: everything the result
/// page needs, created fresh per request and not persisted.
#[derive(Clone, Debug, Default)]
pub struct Report {
    /// Rendered descriptive-statistics table.
    pub summary_html: String,
    /// Rendered per-column missing-value/type table.
    pub null_info_html: String,
    /// Locations of the chart artifacts, in the fixed kind order.
    pub image_paths: Vec<String>,
    /// Rendered diagnostics blocks; empty when none were requested or all
    /// were skipped.
    pub advanced_html: String,
}

/// Compose the pipeline outputs into a [`Report`]. Pure composition; no
/// failure modes of its own.
pub fn assemble(
    summary_html: String,
    null_info_html: String,
    image_paths: Vec<String>,
    advanced_html: String,
) -> Report {
    Report {
        summary_html,
        null_info_html,
        image_paths,
        advanced_html,
    }
}
