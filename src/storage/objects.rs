//! Service image storage.

use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` and return the public url of the new object.
    async fn put(&self, bytes: &[u8], content_type: &str) -> anyhow::Result<String>;

    /// Remove the object behind `url`. Removing a missing object succeeds.
    async fn remove(&self, url: &str) -> anyhow::Result<()>;
}

/// Maps an accepted image content type to its file extension.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Files under a local directory, served by the HTTP layer at `/uploads`.
pub struct LocalObjectStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            url_prefix: format!("{}/uploads/", public_base_url.trim_end_matches('/')),
        }
    }

    fn object_name<'a>(&self, url: &'a str) -> anyhow::Result<&'a str> {
        let name = url
            .strip_prefix(&self.url_prefix)
            .ok_or_else(|| anyhow::anyhow!("url is not managed by this store: {url}"))?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            anyhow::bail!("invalid object name: {name}");
        }
        Ok(name)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, bytes: &[u8], content_type: &str) -> anyhow::Result<String> {
        let ext = extension_for(content_type)
            .ok_or_else(|| anyhow::anyhow!("unsupported content type: {content_type}"))?;
        let name = format!("{}.{ext}", Uuid::new_v4());

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&name), bytes).await?;

        Ok(format!("{}{name}", self.url_prefix))
    }

    async fn remove(&self, url: &str) -> anyhow::Result<()> {
        let name = self.object_name(url)?;
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
