//! HTTP serving of the published tree with live counters.
//!
//! Request paths resolve against the served root: directories prefer their
//! `index.html` and fall back to a generated listing, files are streamed
//! with a short client-side cache lifetime and conditional-GET support.
//! Byte ranges and compression are deliberately unsupported; the output is
//! small, static documentation-style content.
//!
//! Every non-`/stats` response is recorded in the injected [`StatsRegistry`]
//! by a middleware layer around the site routes; `/stats` itself renders the
//! counters and is never counted.

mod stats;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Response, StatusCode, Uri, header};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::get;
use httpdate::{fmt_http_date, parse_http_date};
use tokio_util::io::ReaderStream;

pub use stats::StatsRegistry;

/// Shared state for the serving layer.
pub struct ServeState {
    /// Directory whose contents are exposed. Written only by the publisher;
    /// read here.
    pub served_root: PathBuf,
    /// Client-side cache lifetime in seconds.
    pub cache_max_age: u64,
    /// Live counters.
    pub stats: Arc<StatsRegistry>,
}

/// Assemble the router: the published tree everywhere, counters at `/stats`.
pub fn router(state: Arc<ServeState>) -> Router {
    let site = Router::new()
        .fallback(serve_site)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            record_counters,
        ))
        .with_state(state.clone());

    Router::new()
        .route("/stats", get(stats_handler))
        .with_state(state)
        .merge(site)
}

/// Bind and serve until the process exits.
pub async fn run(state: Arc<ServeState>, addr: String) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    crate::log_event!("http", "listening", "http://{addr}");
    crate::log_event!("http", "stats", "http://{addr}/stats");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Classify each site response into exactly one counter.
async fn record_counters(
    State(state): State<Arc<ServeState>>,
    req: Request,
    next: Next,
) -> Response<Body> {
    let response = next.run(req).await;

    match response.status() {
        StatusCode::OK => {
            let body_bytes = response
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            state.stats.record_ok(body_bytes);
        }
        StatusCode::NOT_MODIFIED => state.stats.record_not_modified(),
        StatusCode::NOT_FOUND => state.stats.record_not_found(),
        _ => state.stats.record_other(),
    }

    response
}

async fn stats_handler(State(state): State<Arc<ServeState>>) -> Response<Body> {
    let body = state.stats.render();
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CONTENT_LENGTH, body.len().to_string())
        .body(Body::from(body))
        .unwrap()
}

async fn serve_site(
    State(state): State<Arc<ServeState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response<Body> {
    let Some(fs_path) = resolve(&state.served_root, uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let meta = match tokio::fs::metadata(&fs_path).await {
        Ok(m) => m,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };

    if meta.is_dir() {
        let index = fs_path.join("index.html");
        match tokio::fs::metadata(&index).await {
            Ok(index_meta) if index_meta.is_file() => {
                serve_file(&state, &index, &index_meta, &headers).await
            }
            _ => serve_listing(&state, &fs_path, uri.path()).await,
        }
    } else {
        serve_file(&state, &fs_path, &meta, &headers).await
    }
}

/// Map a request path onto the served root, rejecting traversal components.
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

async fn serve_file(
    state: &ServeState,
    path: &Path,
    meta: &std::fs::Metadata,
    headers: &HeaderMap,
) -> Response<Body> {
    let modified = meta.modified().unwrap_or_else(|_| SystemTime::now());
    let last_modified = fmt_http_date(modified);

    if let Some(since) = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_http_date(v).ok())
    {
        if http_time(modified) <= since {
            return Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(header::LAST_MODIFIED, last_modified)
                .header(header::CACHE_CONTROL, cache_control(state))
                .body(Body::empty())
                .unwrap();
        }
    }

    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };
    let stream = ReaderStream::new(file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(path))
        .header(header::CONTENT_LENGTH, meta.len().to_string())
        .header(header::LAST_MODIFIED, last_modified)
        .header(header::CACHE_CONTROL, cache_control(state))
        .body(Body::from_stream(stream))
        .unwrap()
}

async fn serve_listing(state: &ServeState, dir: &Path, request_path: &str) -> Response<Body> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };

    let mut names = Vec::new();
    while let Ok(Some(entry)) = read_dir.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry
            .file_type()
            .await
            .map(|ft| ft.is_dir())
            .unwrap_or(false);
        names.push(if is_dir { format!("{name}/") } else { name });
    }
    names.sort();

    let base = if request_path.ends_with('/') {
        request_path.to_string()
    } else {
        format!("{request_path}/")
    };

    let mut html = format!(
        "<!DOCTYPE html>\n<html><head><title>Index of {base}</title></head><body>\n\
         <h1>Index of {base}</h1>\n<ul>\n"
    );
    for name in &names {
        html.push_str(&format!("<li><a href=\"{base}{name}\">{name}</a></li>\n"));
    }
    html.push_str("</ul>\n</body></html>\n");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .header(header::CONTENT_LENGTH, html.len().to_string())
        .header(header::CACHE_CONTROL, cache_control(state))
        .body(Body::from(html))
        .unwrap()
}

fn cache_control(state: &ServeState) -> String {
    format!("public, max-age={}", state.cache_max_age)
}

/// Truncate to whole seconds so comparisons against parsed HTTP dates
/// (one-second resolution) behave.
fn http_time(t: SystemTime) -> SystemTime {
    match t.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => SystemTime::UNIX_EPOCH + Duration::from_secs(d.as_secs()),
        Err(_) => t,
    }
}

/// Extension-derived content types for documentation output.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "md" | "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_maps_paths_under_root() {
        let root = Path::new("/srv/site");
        assert_eq!(resolve(root, "/"), Some(PathBuf::from("/srv/site")));
        assert_eq!(
            resolve(root, "/chapters/intro.html"),
            Some(PathBuf::from("/srv/site/chapters/intro.html"))
        );
        assert_eq!(
            resolve(root, "/./assets/app.css"),
            Some(PathBuf::from("/srv/site/assets/app.css"))
        );
    }

    #[test]
    fn resolve_rejects_traversal() {
        let root = Path::new("/srv/site");
        assert_eq!(resolve(root, "/../etc/passwd"), None);
        assert_eq!(resolve(root, "/chapters/../../etc/passwd"), None);
    }

    #[test]
    fn content_types_cover_documentation_output() {
        assert_eq!(
            content_type_for(Path::new("index.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            content_type_for(Path::new("style.CSS")),
            "text/css; charset=utf-8"
        );
        assert_eq!(content_type_for(Path::new("logo.png")), "image/png");
        assert_eq!(
            content_type_for(Path::new("archive.tar.gz")),
            "application/octet-stream"
        );
    }

    #[test]
    fn http_time_truncates_subsecond_precision() {
        let t = SystemTime::UNIX_EPOCH + Duration::new(1000, 999_999_999);
        assert_eq!(http_time(t), SystemTime::UNIX_EPOCH + Duration::from_secs(1000));
    }
}
