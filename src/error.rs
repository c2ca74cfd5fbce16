use thiserror::Error;

/// Errors produced by the load/clean/analyze pipeline.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The uploaded file has an extension we do not handle. The message is
    /// shown to the user verbatim.
    #[error("Unsupported file format! Please upload CSV or Excel.")]
    UnsupportedFormat,

    /// The uploaded file contained no rows and no header.
    #[error("Uploaded file is empty")]
    EmptyFile,

    /// The requested graph size is not one of the known presets.
    #[error("Unknown graph size '{0}'")]
    InvalidGraphSize(String),

    /// A chart failed during drawing. Not caught inside the renderer;
    /// the web layer decides how to surface it.
    #[error("Chart rendering failed: {0}")]
    Render(String),

    /// A diagnostic model failed to fit or predict.
    #[error("Model fitting failed: {0}")]
    Fit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
}
