use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode, Uri},
    response::Response,
};
use mime_guess::from_path;
use rust_embed::RustEmbed;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::AppState;

/// Built-in templates, used when the assets directory doesn't override them.
#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Assets;

/// Serve static files from the assets directory or the embedded assets
pub async fn serve_static(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    serve_file(&state.config.server.assets_dir, path).await
}

pub async fn serve_file(assets_dir: &Path, path: &str) -> Response {
    if path.is_empty() || !is_safe_path(path) {
        return not_found();
    }

    let file_path = assets_dir.join(path);
    if let Ok(content) = tokio::fs::read(&file_path).await {
        let mime_type = from_path(&file_path).first_or_octet_stream();
        return file_response(mime_type.as_ref(), Body::from(content));
    }

    match Assets::get(path) {
        Some(content) => {
            let mime = from_path(path).first_or_octet_stream();
            file_response(mime.as_ref(), Body::from(content.data))
        }
        None => not_found(),
    }
}

/// Read a text asset, preferring the assets directory over the embedded copy.
pub async fn read_text_asset(assets_dir: &Path, name: &str) -> Option<String> {
    if let Ok(text) = tokio::fs::read_to_string(assets_dir.join(name)).await {
        return Some(text);
    }
    Assets::get(name).map(|file| String::from_utf8_lossy(&file.data).into_owned())
}

/// Whether a logo image exists for a link key or source.
pub async fn has_logo(assets_dir: &Path, name: &str) -> bool {
    let relative = format!("images/{name}.png");
    if !is_safe_path(&relative) {
        return false;
    }
    let on_disk: PathBuf = assets_dir.join(&relative);
    tokio::fs::try_exists(&on_disk).await.unwrap_or(false) || Assets::get(&relative).is_some()
}

fn is_safe_path(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
}

fn file_response(mime_type: &str, body: Body) -> Response {
    let mut response = Response::new(body);
    if let Ok(value) = mime_type.parse() {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}

fn not_found() -> Response {
    let mut response = Response::new(Body::from("404 Not Found"));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_paths() {
        assert!(is_safe_path("images/amazon.png"));
        assert!(!is_safe_path("../settings.toml"));
        assert!(!is_safe_path("images/../../secret"));
        assert!(!is_safe_path("/etc/passwd"));
    }

    #[tokio::test]
    async fn serves_embedded_templates() {
        let dir = tempfile::tempdir().unwrap();
        let response = serve_file(dir.path(), "404.html").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html"
        );
    }

    #[tokio::test]
    async fn assets_directory_overrides_embedded_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("404.html"), "custom").unwrap();

        assert_eq!(
            read_text_asset(dir.path(), "404.html").await.as_deref(),
            Some("custom")
        );
    }

    #[tokio::test]
    async fn detects_logos_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/amazon.png"), [0u8; 4]).unwrap();

        assert!(has_logo(dir.path(), "amazon").await);
        assert!(!has_logo(dir.path(), "zalando").await);
    }
}
