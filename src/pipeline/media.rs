use crate::error::{PipelineError, Result};
use google_cloud_storage::client::Client as GcsClient;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const MEDIA_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Evidence URLs on someone else's CDN expire; local or app-relative
/// paths are already ours and are skipped.
pub fn is_remote_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

pub struct MediaStore {
    gcs: GcsClient,
    http: reqwest::Client,
}

impl MediaStore {
    pub fn new(gcs: GcsClient) -> Self {
        let http = reqwest::Client::builder()
            .timeout(MEDIA_FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { gcs, http }
    }

    /// Fetch one remote URL and copy it into the evidence bucket. Returns
    /// the stored object path.
    pub async fn persist(&self, bucket: &str, alert_id: Uuid, url: &str) -> Result<String> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::MediaDownload(format!("fetch {url}: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            return Err(PipelineError::MediaDownload(format!(
                "fetch {url}: status {status}"
            )));
        }

        let data = res
            .bytes()
            .await
            .map_err(|e| PipelineError::MediaDownload(format!("read {url}: {e}")))?;

        let name = object_name(alert_id, url);
        let content_type = mime_guess::from_path(&name).first_or_octet_stream();
        let mut media = Media::new(name.clone());
        media.content_type = content_type.to_string().into();

        self.gcs
            .upload_object(
                &UploadObjectRequest {
                    bucket: bucket.to_string(),
                    ..Default::default()
                },
                data.to_vec(),
                &UploadType::Simple(media),
            )
            .await
            .map_err(|e| PipelineError::MediaDownload(format!("upload {name}: {e}")))?;

        Ok(format!("gs://{bucket}/{name}"))
    }
}

/// Evidence object path keyed by alert, keeping the source file name when
/// one is recognizable.
fn object_name(alert_id: Uuid, url: &str) -> String {
    let file = url
        .split('?')
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|f| !f.is_empty() && f.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.bin", Uuid::new_v4()));
    format!("evidence/{alert_id}/{file}")
}

/// One independent, fire-and-forget task per remote URL. A failed
/// download never reaches the alert's outcome.
pub fn spawn_persist_tasks(
    store: Arc<MediaStore>,
    bucket: String,
    alert_id: Uuid,
    urls: Vec<String>,
) {
    for url in urls.into_iter().filter(|u| is_remote_url(u)) {
        let store = store.clone();
        let bucket = bucket.clone();
        tokio::spawn(async move {
            match store.persist(&bucket, alert_id, &url).await {
                Ok(path) => {
                    info!("Persisted evidence media {} -> {}", url, path);
                    crate::metrics::increment_media_persisted("ok");
                }
                Err(e) => {
                    warn!("Evidence media persistence failed for {}: {}", url, e);
                    crate::metrics::increment_media_persisted("error");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_detection_skips_local_paths() {
        assert!(is_remote_url("https://cdn.example.com/clip.mp4"));
        assert!(is_remote_url("http://cdn.example.com/clip.mp4"));

        assert!(!is_remote_url("/media/evidence/clip.mp4"));
        assert!(!is_remote_url("media/clip.mp4"));
        assert!(!is_remote_url("gs://bucket/clip.mp4"));
    }

    #[test]
    fn object_name_keeps_file_name_and_drops_query() {
        let alert = Uuid::nil();
        let name = object_name(alert, "https://cdn.example.com/a/b/clip.mp4?token=xyz");
        assert_eq!(name, format!("evidence/{alert}/clip.mp4"));
    }

    #[test]
    fn object_name_falls_back_without_extension() {
        let alert = Uuid::nil();
        let name = object_name(alert, "https://cdn.example.com/stream");
        assert!(name.starts_with(&format!("evidence/{alert}/")));
        assert!(name.ends_with(".bin"));
    }
}
