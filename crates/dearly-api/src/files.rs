use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{error, info};
use uuid::Uuid;

use dearly_types::api::UploadResponse;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

/// Public path prefix uploaded images are served under.
pub const UPLOADS_PREFIX: &str = "/uploads/";

/// On-disk image storage.
///
/// Files are content-addressed as `{sha256}.{ext}` in a single flat
/// directory, so re-uploading the same picture reuses the stored copy.
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Image storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stores an image and returns its file name.
    pub async fn put_image(&self, content_type: &str, data: &[u8]) -> Result<String> {
        let Some(ext) = image_extension(content_type) else {
            bail!("not an image content type: {}", content_type);
        };

        let digest = hex::encode(Sha256::digest(data));
        let name = format!("{}.{}", digest, ext);
        let path = self.dir.join(&name);

        if fs::try_exists(&path).await? {
            return Ok(name);
        }

        // Write under a per-writer temporary name so readers never see a
        // partial file and concurrent writers of the same bytes never collide.
        let tmp = self.dir.join(format!(".{}.{}.part", name, Uuid::new_v4()));
        fs::write(&tmp, data).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!("Stored image {} ({} bytes)", name, data.len());
        Ok(name)
    }
}

/// File extension for an `image/*` content type, or `None` for anything else.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let subtype = essence.strip_prefix("image/")?;

    Some(match subtype {
        "jpeg" | "jpg" | "pjpeg" => "jpg",
        "png" => "png",
        "gif" => "gif",
        "webp" => "webp",
        "avif" => "avif",
        "heic" => "heic",
        "" => return None,
        _ => "bin",
    })
}

/// Accept raw image bytes sent with an `image/*` Content-Type.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    headers: HeaderMap,
    WithRejection(bytes, _): WithRejection<Bytes, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if image_extension(content_type).is_none() {
        return Err(ApiError::validation("only image files are allowed"));
    }
    if bytes.is_empty() {
        return Err(ApiError::validation("no file uploaded"));
    }

    let name = state.blobs.put_image(content_type, &bytes).await.map_err(|e| {
        error!("Failed to store upload from {}: {}", me.id, e);
        ApiError::Internal(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            image_url: format!("{}{}", UPLOADS_PREFIX, name),
        }),
    ))
}
