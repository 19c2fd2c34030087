// src/routes/upload_routes.rs

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    extract::multipart::MultipartError,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tower_http::timeout::TimeoutLayer;
use uuid::Uuid;

use crate::{
    config::UploadSettings,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
};

/// Room for multipart boundaries and part headers on top of the file bytes.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(settings: &UploadSettings) -> Router<AppState> {
    Router::new()
        .route("/upload/single", post(upload_single))
        .route("/upload/multiple", post(upload_multiple))
        .layer(DefaultBodyLimit::max(body_limit(settings)))
        .layer(TimeoutLayer::new(Duration::from_secs(settings.timeout_secs)))
}

fn body_limit(settings: &UploadSettings) -> usize {
    settings
        .max_files
        .saturating_mul(settings.max_file_bytes)
        .saturating_add(MULTIPART_OVERHEAD)
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UploadedFile {
    pub url: String,
    pub original_name: String,
    pub size: usize,
    pub mime_type: String,
}

#[derive(Debug)]
struct PendingFile {
    original_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

/* ============================================================
   Validation helpers
   ============================================================ */

/// Strips path components and anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| *c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.replace("..", "");
    let cleaned = cleaned.trim_start_matches('.');
    let cleaned: String = cleaned.chars().take(100).collect();

    if cleaned.is_empty() {
        "image".into()
    } else {
        cleaned
    }
}

/// MIME is taken from the extension. SVG is refused since it is served
/// back from our own origin.
fn image_mime(original_name: &str) -> Result<String, ApiError> {
    let mime = mime_guess::from_path(original_name)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE && m.subtype() != mime_guess::mime::SVG)
        .ok_or_else(|| {
            ApiError::validation(format!("{original_name} is not a supported image file"))
        })?;
    Ok(mime.essence_str().to_string())
}

fn too_large(original_name: &str, max_bytes: usize) -> ApiError {
    ApiError::PayloadTooLarge(
        "FILE_TOO_LARGE",
        format!(
            "{original_name} exceeds the {} MB limit",
            max_bytes / (1024 * 1024)
        ),
    )
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("PAYLOAD_TOO_LARGE", e.body_text())
    } else {
        ApiError::BadRequest("INVALID_MULTIPART", e.body_text())
    }
}

pub fn public_url(settings: &UploadSettings, stored_name: &str) -> String {
    format!("{}/uploads/{stored_name}", settings.public_base_url)
}

/* ============================================================
   Multipart collection + storage
   ============================================================ */

/// Reads every part named in `fields`, validating each file before anything
/// touches the disk.
async fn collect_files(
    multipart: &mut Multipart,
    fields: &[&str],
    settings: &UploadSettings,
) -> Result<Vec<PendingFile>, ApiError> {
    let mut files = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name() else {
            continue;
        };
        if !fields.iter().any(|f| *f == name) {
            continue;
        }
        if files.len() >= settings.max_files {
            return Err(ApiError::validation(format!(
                "at most {} files can be uploaded at once",
                settings.max_files
            )));
        }

        let original_name = field.file_name().unwrap_or_default().trim().to_string();
        if original_name.is_empty() {
            return Err(ApiError::validation("uploaded part has no file name"));
        }
        let mime_type = image_mime(&original_name)?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > settings.max_file_bytes {
                return Err(too_large(&original_name, settings.max_file_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(ApiError::validation(format!("{original_name} is empty")));
        }

        files.push(PendingFile {
            original_name,
            mime_type,
            bytes,
        });
    }

    Ok(files)
}

/// Writes all files or none: a failure removes what was already written.
async fn store_files(
    settings: &UploadSettings,
    files: Vec<PendingFile>,
) -> Result<Vec<UploadedFile>, ApiError> {
    tokio::fs::create_dir_all(&settings.dir)
        .await
        .map_err(|e| ApiError::Internal(format!("create upload dir: {e}")))?;

    let mut written: Vec<PathBuf> = Vec::with_capacity(files.len());
    let mut uploaded = Vec::with_capacity(files.len());

    for f in files {
        let stored_name = format!("{}_{}", Uuid::new_v4(), sanitize_filename(&f.original_name));
        let path = settings.dir.join(&stored_name);

        if let Err(e) = tokio::fs::write(&path, &f.bytes).await {
            for p in &written {
                let _ = tokio::fs::remove_file(p).await;
            }
            return Err(ApiError::Internal(format!("write {}: {e}", path.display())));
        }
        written.push(path);

        uploaded.push(UploadedFile {
            url: public_url(settings, &stored_name),
            original_name: f.original_name,
            size: f.bytes.len(),
            mime_type: f.mime_type,
        });
    }

    Ok(uploaded)
}

/* ============================================================
   Handlers
   ============================================================ */

pub async fn upload_single(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> Result<Json<ApiOk<UploadedFile>>, ApiError> {
    let single = UploadSettings {
        max_files: 1,
        ..(*state.uploads).clone()
    };
    let files = collect_files(&mut multipart, &["file"], &single).await?;
    if files.is_empty() {
        return Err(ApiError::validation("no file provided in field `file`"));
    }

    let uploaded = store_files(&state.uploads, files)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("upload produced no file".into()))?;

    tracing::info!(user_id = %auth.user_id, url = %uploaded.url, size = uploaded.size, "image uploaded");

    Ok(Json(ApiOk { data: uploaded }))
}

pub async fn upload_multiple(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> Result<Json<ApiOk<Vec<UploadedFile>>>, ApiError> {
    let files = collect_files(&mut multipart, &["files", "files[]"], &state.uploads).await?;
    if files.is_empty() {
        return Err(ApiError::validation("no files provided in field `files`"));
    }

    let uploaded = store_files(&state.uploads, files).await?;

    tracing::info!(user_id = %auth.user_id, count = uploaded.len(), "images uploaded");

    Ok(Json(ApiOk { data: uploaded }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_in(dir: &std::path::Path) -> UploadSettings {
        UploadSettings {
            dir: dir.to_path_buf(),
            ..UploadSettings::default()
        }
    }

    #[test]
    fn sanitize_path_traversal() {
        let name = sanitize_filename("../../../etc/passwd");
        assert_eq!(name, "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cat.png"), "cat.png");
    }

    #[test]
    fn sanitize_special_and_unicode_chars() {
        assert_eq!(sanitize_filename("my cat (1).jpg"), "my_cat__1_.jpg");
        assert_eq!(sanitize_filename("chó.png"), "ch_.png");
        assert_eq!(sanitize_filename(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename(""), "image");
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = format!("{}.png", "a".repeat(300));
        assert_eq!(sanitize_filename(&long).chars().count(), 100);
    }

    #[test]
    fn only_raster_images_are_accepted() {
        assert_eq!(image_mime("dog.PNG").unwrap(), "image/png");
        assert_eq!(image_mime("dog.jpeg").unwrap(), "image/jpeg");
        assert_eq!(image_mime("dog.webp").unwrap(), "image/webp");
        assert!(image_mime("dog.svg").is_err());
        assert!(image_mime("notes.pdf").is_err());
        assert!(image_mime("no_extension").is_err());
    }

    #[test]
    fn urls_follow_public_base() {
        let mut s = UploadSettings::default();
        assert_eq!(public_url(&s, "x.png"), "/uploads/x.png");
        s.public_base_url = "https://cdn.example.com".into();
        assert_eq!(public_url(&s, "x.png"), "https://cdn.example.com/uploads/x.png");
    }

    #[test]
    fn body_limit_covers_every_file() {
        let s = UploadSettings::default();
        assert!(body_limit(&s) > s.max_files * s.max_file_bytes);
    }

    #[tokio::test]
    async fn stores_files_under_upload_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(&tmp.path().join("nested"));

        let files = vec![
            PendingFile {
                original_name: "a b.png".into(),
                mime_type: "image/png".into(),
                bytes: vec![1, 2, 3],
            },
            PendingFile {
                original_name: "c.jpg".into(),
                mime_type: "image/jpeg".into(),
                bytes: vec![4; 10],
            },
        ];

        let uploaded = store_files(&settings, files).await.unwrap();
        assert_eq!(uploaded.len(), 2);
        assert_eq!(uploaded[0].original_name, "a b.png");
        assert_eq!(uploaded[0].size, 3);
        assert!(uploaded[0].url.starts_with("/uploads/"));
        assert!(uploaded[0].url.ends_with("_a_b.png"));
        assert_eq!(uploaded[1].mime_type, "image/jpeg");

        let stored = uploaded[1].url.trim_start_matches("/uploads/");
        let on_disk = std::fs::read(settings.dir.join(stored)).unwrap();
        assert_eq!(on_disk, vec![4; 10]);
    }
}
