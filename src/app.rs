use axum::{
    Router,
    extract::{Multipart, State},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use handlebars::Handlebars;
use log::{error, info};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::downloader;
use crate::error::AnalysisError;
use crate::loader;
use crate::login;
use crate::pipeline::{self, AnalysisRequest};
use crate::report::Report;
use crate::table::Table;

/// Directory chart artifacts are written to and served from.
const STATIC_DIR: &str = "static";

/// Shared application state: one cleaned table per session, plus the
/// compiled page templates. The per-session keying is what lets two
/// logged-in sessions upload and download concurrently without clobbering
/// each other.
pub struct AppState {
    tables: RwLock<HashMap<String, Table>>,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new() -> Self {
        let mut templates = Handlebars::new();
        templates
            .register_template_string("result", include_str!("./static/result.html"))
            .expect("result template must parse");
        AppState {
            tables: RwLock::new(HashMap::new()),
            templates,
        }
    }

    /// Retain the cleaned table for a later download. The previous table of
    /// the same session, if any, is replaced.
    pub fn store_table(&self, session_id: &str, table: Table) {
        self.tables
            .write()
            .unwrap()
            .insert(session_id.to_string(), table);
    }

    /// The session's current cleaned table, if an upload has happened.
    pub fn current_table(&self, session_id: &str) -> Option<Table> {
        self.tables.read().unwrap().get(session_id).cloned()
    }

    pub fn drop_table(&self, session_id: &str) {
        self.tables.write().unwrap().remove(session_id);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the router and serve until the process is stopped.
pub async fn run(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    login::init_database()?;
    std::fs::create_dir_all(STATIC_DIR)?;

    let app_state = Arc::new(AppState::new());

    let protected = Router::new()
        .route("/", get(serve_index).post(handle_upload))
        .route("/download_cleaned", get(download_cleaned))
        .route("/logout", get(login::handle_logout))
        .route_layer(middleware::from_fn(login::require_auth));

    let app = Router::new()
        .route(
            "/login",
            get(login::serve_login_page).post(login::handle_login),
        )
        .route(
            "/signup",
            get(login::serve_signup_page).post(login::handle_signup),
        )
        .merge(protected)
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .with_state(app_state);

    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

// Artifact directory for one session, namespaced so concurrent sessions do
// not overwrite each other's charts.
fn artifact_dir(session_id: &str) -> PathBuf {
    let prefix: String = session_id.chars().take(8).collect();
    Path::new(STATIC_DIR).join(format!("s{}", prefix))
}

/// The upload route: read the multipart form, then run the full
/// load -> clean -> summarize -> chart -> diagnose -> assemble pipeline and
/// render the result page. The cleaned table is retained for
/// `/download_cleaned`.
pub async fn handle_upload(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Response {
    let Some((session_id, email)) = login::current_session(&jar) else {
        return Redirect::to("/login").into_response();
    };

    let mut filename = String::new();
    let mut file_data = Vec::new();
    let mut clean_option: Option<String> = None;
    let mut graph_options: Vec<String> = Vec::new();
    let mut graph_size = String::new();

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        match field.name().unwrap_or("") {
            "file" => {
                filename = field.file_name().unwrap_or("").to_string();
                file_data = field.bytes().await.unwrap_or_default().to_vec();
            }
            "clean_option" => {
                clean_option = field.text().await.ok();
            }
            "graph_option" => {
                if let Ok(value) = field.text().await {
                    graph_options.push(value);
                }
            }
            "graph_size" => {
                graph_size = field.text().await.unwrap_or_default();
            }
            _ => {}
        }
    }

    // No file selected: show the form again, like a plain GET.
    if filename.is_empty() || file_data.is_empty() {
        return Redirect::to("/").into_response();
    }

    let table = match loader::load_table(&file_data, &filename) {
        Ok(table) => table,
        Err(e @ AnalysisError::UnsupportedFormat) => {
            return Html(e.to_string()).into_response();
        }
        Err(e) => {
            error!("failed to load '{}': {}", filename, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read the uploaded file")
                .into_response();
        }
    };

    let request =
        match AnalysisRequest::from_form(clean_option.as_deref(), &graph_options, &graph_size) {
            Ok(request) => request,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };

    info!("analysis request from {}: {:?}", email, request);

    let (cleaned, report) = match pipeline::run(table, &request, &artifact_dir(&session_id)) {
        Ok(output) => output,
        Err(e) => {
            error!("analysis failed for {}: {}", email, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Analysis failed").into_response();
        }
    };

    state.store_table(&session_id, cleaned);
    render_result(&state, &report)
}

fn render_result(state: &AppState, report: &Report) -> Response {
    let data = json!({
        "summary": report.summary_html,
        "null_info": report.null_info_html,
        "image_paths": report.image_paths,
        "advanced_analysis": report.advanced_html,
    });
    match state.templates.render("result", &data) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("template rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render the report").into_response()
        }
    }
}

/// Download the session's cleaned table as a CSV attachment. Before any
/// upload this is a friendly message, not an error.
pub async fn download_cleaned(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let Some((session_id, _)) = login::current_session(&jar) else {
        return Redirect::to("/login").into_response();
    };

    let Some(table) = state.current_table(&session_id) else {
        return Html("No data to download.").into_response();
    };

    match downloader::to_csv(&table) {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"cleaned_data.csv\"",
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => {
            error!("CSV export failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to export CSV").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::from_csv;

    #[test]
    fn tables_are_isolated_per_session() {
        let state = AppState::new();
        let a = from_csv(b"a\n1\n").unwrap();
        let b = from_csv(b"b\n2\n").unwrap();

        state.store_table("session-a", a);
        state.store_table("session-b", b);

        assert_eq!(state.current_table("session-a").unwrap().columns[0].name, "a");
        assert_eq!(state.current_table("session-b").unwrap().columns[0].name, "b");
        assert!(state.current_table("session-c").is_none());

        state.drop_table("session-a");
        assert!(state.current_table("session-a").is_none());
        assert!(state.current_table("session-b").is_some());
    }

    #[test]
    fn artifact_dirs_are_session_namespaced() {
        let a = artifact_dir("11112222-aaaa-bbbb-cccc-000000000000");
        let b = artifact_dir("33334444-aaaa-bbbb-cccc-000000000000");
        assert_ne!(a, b);
        assert!(a.starts_with(STATIC_DIR));
        assert_eq!(a, Path::new("static").join("s11112222"));
    }

    #[test]
    fn new_upload_replaces_the_previous_table() {
        let state = AppState::new();
        state.store_table("s", from_csv(b"a\n1\n").unwrap());
        state.store_table("s", from_csv(b"b\n2\n2\n").unwrap());

        let current = state.current_table("s").unwrap();
        assert_eq!(current.columns[0].name, "b");
        assert_eq!(current.height(), 2);
    }
}
