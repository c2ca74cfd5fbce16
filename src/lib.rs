//! # datalens
//!
//! A browser-based exploratory data analysis tool, built in Rust.
//!
//! ## Overview
//!
//! A logged-in user uploads a tabular data file (CSV or Excel), picks a
//! missing-value strategy, a set of chart kinds and a size preset, and gets
//! back a rendered report: descriptive statistics, a missing-value/type
//! breakdown, chart images, and optional model-based diagnostics. The cleaned
//! table is kept in memory per session so it can be downloaded as CSV
//! afterwards.
//!
//! ## Architecture
//!
//! The application follows a client-server architecture:
//!
//! ### Frontend Layer
//! - **Technologies**: HTML forms rendered from embedded templates
//! - **Key Components**:
//!   - Upload form - file picker plus cleaning/chart/size options
//!   - Result page - statistics tables, chart images, diagnostics markup
//!   - Login/signup pages with flash-style messages
//!
//! ### Backend Layer
//! - **Technologies**: Rust, axum
//! - **Core Components**:
//!   - Table Engine - column-typed in-memory dataset with type inference
//!   - Cleaner - missing-value strategies (drop, mean, median, mode)
//!   - Summarizer - descriptive statistics and missing-value report
//!   - Chart Renderer - histogram, heatmap, boxplot and pairplot PNGs
//!   - Diagnostics Runner - random-forest feature importance and OLS fit
//!   - Report Assembler - composes the result page payload
//!
//! ### State & Persistence
//! - Accounts in a JSON file with Argon2 password hashes
//! - Sessions in a process-wide map, addressed by cookie
//! - One cleaned table per session, in memory only
//! - Chart artifacts under `static/`, namespaced per session
//!
//! ## Modules
//!
//! - **table**: column-typed dataset, type inference and column statistics
//! - **loader**: CSV/Excel parsing dispatched on file extension
//! - **cleaner**: missing-value strategies applied to a table
//! - **summary**: descriptive statistics and missing-value reporting
//! - **graph**: chart generation
//! - **diagnostics**: feature importance and regression diagnostics
//! - **report**: report assembly
//! - **pipeline**: request parsing and pipeline orchestration
//! - **downloader**: CSV export of the cleaned table
//! - **login**: accounts, sessions and authentication handlers
//! - **app**: routing, state and request handlers
//! - **error**: pipeline error type
//!
//! ## Routes
//!
//! - `/signup`, `/login`, `/logout` - account handling
//! - `/` - upload form (`GET`) and analysis request (`POST`)
//! - `/download_cleaned` - the cleaned table as a CSV attachment
//! - `/static/*` - generated chart artifacts

pub mod app;
pub mod cleaner;
pub mod diagnostics;
pub mod downloader;
pub mod error;
pub mod graph;
pub mod loader;
pub mod login;
pub mod pipeline;
pub mod report;
pub mod summary;
pub mod table;

/// Re-export the most commonly used types.
pub use cleaner::CleaningDirective;
pub use diagnostics::DiagnosticKind;
pub use error::AnalysisError;
pub use graph::{ChartKind, GraphSize};
pub use pipeline::AnalysisRequest;
pub use report::Report;
pub use table::{Column, ColumnType, Table, Value};
