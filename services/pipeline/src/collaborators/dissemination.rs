//! Upload of finished products over HTTPS.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ocean_common::{PipelineError, PipelineResult};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::download::{status_error, transient, with_retry, RetryPolicy};
use super::Disseminator;
use crate::credentials::Login;

/// PUTs each file to `<base_url>/<prefix>/<relative path>` with basic auth.
pub struct HttpsDisseminator {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl HttpsDisseminator {
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy, request_timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        })
    }

    pub fn target_url(&self, prefix: &str, relative: &str) -> String {
        format!("{}/{}/{}", self.base_url, prefix.trim_matches('/'), relative.trim_start_matches('/'))
    }

    async fn put(&self, url: &str, path: &Path, login: &Login) -> PipelineResult<()> {
        let body = tokio::fs::read(path).await?;
        let response = self
            .client
            .put(url)
            .basic_auth(&login.username, Some(&login.password))
            .body(body)
            .send()
            .await
            .map_err(|e| transient("Upload request failed", e))?;
        match status_error("dissemination", response.status(), url) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Disseminator for HttpsDisseminator {
    async fn publish(
        &self,
        prefix: &str,
        files: &[(String, PathBuf)],
        login: &Login,
        cancel: &CancellationToken,
    ) -> PipelineResult<usize> {
        for (relative, path) in files {
            let url = self.target_url(prefix, relative);
            with_retry(&self.policy, &url, cancel, |_| self.put(&url, path, login)).await?;
            debug!(url = %url, "Uploaded");
        }
        info!(files = files.len(), prefix = %prefix, "Products published");
        Ok(files.len())
    }
}

/// Regular files under each root, keyed `<product>/<relative path>` where
/// `<product>` is `output` or `maps`. Sorted by key; missing roots are skipped.
pub fn collect_products(roots: &[&Path]) -> PipelineResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for root in roots {
        if !root.is_dir() {
            continue;
        }
        let label = product_label(root);
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| PipelineError::Data(format!("walking {}: {}", root.display(), e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| PipelineError::Data(e.to_string()))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.push((format!("{}/{}", label, key), entry.into_path()));
        }
    }
    files.sort();
    Ok(files)
}

/// `output_<exp>/<date>` -> `output`, `maps_<exp>/<date>` -> `maps`.
fn product_label(root: &Path) -> String {
    root.parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('_').next())
        .unwrap_or("products")
        .to_string()
}
