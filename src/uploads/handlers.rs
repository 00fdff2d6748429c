use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::extractors::Session;
use crate::error::ApiError;
use crate::response::{ok, Envelope};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/uploads", post(upload_image))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub key: String,
}

#[instrument(skip(state, session, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    session: Session,
    mut mp: Multipart,
) -> Result<Json<Envelope<UploadResponse>>, ApiError> {
    let mut file: Option<(Bytes, String)> = None;
    while let Ok(Some(field)) = mp.next_field().await {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_default();
            let data = field
                .bytes()
                .await
                .map_err(|_| ApiError::InvalidInput("Malformed multipart body".into()))?;
            file = Some((data, content_type));
            break;
        }
    }

    let (data, content_type) =
        file.ok_or_else(|| ApiError::InvalidInput("No file provided".into()))?;

    if !content_type.starts_with("image/") {
        return Err(ApiError::InvalidInput(
            "Only image uploads are allowed".into(),
        ));
    }

    let ext = ext_from_mime(&content_type).unwrap_or("bin");
    let key = object_key(session.user_id, ext);
    state.storage.put_object(&key, data, &content_type).await?;
    let url = state.storage.object_url(&key);

    info!(%key, by = %session.user_id, "image uploaded");
    Ok(ok(UploadResponse { url, key }))
}

fn object_key(user_id: Uuid, ext: &str) -> String {
    format!("issues/{}/{}.{}", user_id, Uuid::new_v4(), ext)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("whatever/else"), None);
    }

    #[test]
    fn object_keys_are_scoped_to_the_uploader() {
        let user_id = Uuid::new_v4();
        let key = object_key(user_id, "png");
        assert!(key.starts_with(&format!("issues/{}/", user_id)));
        assert!(key.ends_with(".png"));
    }

    #[tokio::test]
    async fn fake_storage_builds_public_urls() {
        let state = AppState::fake();
        let url = state.storage.object_url("issues/a/b.jpg");
        assert_eq!(url, "https://fake.local/issues/a/b.jpg");
    }
}
