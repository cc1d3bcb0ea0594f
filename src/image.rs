use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use reqwest::Client;
use tempfile::TempPath;
use tracing::{debug, warn};
use url::Url;

use crate::error::IdentifyError;

const DEFAULT_FILE_NAME: &str = "photo.jpg";
/// Pl@ntNet rejects uploads above 50 MB, so larger downloads are refused early.
pub const MAX_IMAGE_BYTES: u64 = 50 * 1024 * 1024;
const SUPPORTED_IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/heic",
    "image/heif",
];

/// Reference to the photo handed in by the caller. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageHandle {
    /// A readable file on this machine.
    Local(PathBuf),
    /// A resource owned by some provider; it must be copied locally before use.
    Provider(Url),
}

impl ImageHandle {
    pub fn parse(raw: &str) -> Result<Self, IdentifyError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(IdentifyError::image_access("empty image reference"));
        }
        match Url::parse(raw) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(ImageHandle::Local)
                .map_err(|_| IdentifyError::image_access(format!("invalid file URI {raw}"))),
            // Single letters are Windows drive prefixes, not schemes.
            Ok(url) if url.scheme().len() > 1 => Ok(ImageHandle::Provider(url)),
            _ => Ok(ImageHandle::Local(PathBuf::from(raw))),
        }
    }

    pub fn file_name(&self) -> String {
        let candidate = match self {
            ImageHandle::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            ImageHandle::Provider(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .and_then(|segment| Path::new(segment).file_name())
                .map(|name| name.to_string_lossy().into_owned()),
        };
        candidate
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
    }
}

impl FromStr for ImageHandle {
    type Err = IdentifyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ImageHandle::parse(value)
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageHandle::Local(path) => write!(f, "{}", path.display()),
            ImageHandle::Provider(url) => write!(f, "{url}"),
        }
    }
}

/// Image bytes read from a local file, ready to upload.
///
/// For provider resources `path` is the cached copy; it is removed once the
/// last clone of the image is dropped.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    cached_copy: Option<Arc<TempPath>>,
}

impl LoadedImage {
    pub fn new(
        path: impl Into<PathBuf>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        LoadedImage {
            path: path.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
            cached_copy: None,
        }
    }
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// Resolves [`ImageHandle`]s into [`LoadedImage`]s, copying provider-managed
/// resources into `cache_dir` first.
#[derive(Debug, Clone)]
pub struct ImageLoader {
    client: Client,
    cache_dir: PathBuf,
    max_bytes: u64,
}

impl ImageLoader {
    pub fn new(client: Client, cache_dir: impl Into<PathBuf>) -> Self {
        ImageLoader {
            client,
            cache_dir: cache_dir.into(),
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub async fn load(&self, handle: &ImageHandle) -> Result<LoadedImage, IdentifyError> {
        let (path, cached_copy) = match handle {
            ImageHandle::Local(path) => (path.clone(), None),
            ImageHandle::Provider(url) => {
                let copy = self.materialize(url, &handle.file_name()).await?;
                (copy.to_path_buf(), Some(Arc::new(copy)))
            }
        };

        let bytes = tokio::fs::read(&path).await.map_err(|err| {
            IdentifyError::image_access(format!("{}: {err}", path.display()))
        })?;
        if bytes.is_empty() {
            return Err(IdentifyError::image_access(format!(
                "{} is empty",
                path.display()
            )));
        }

        let mime_type = detect_mime_type(&bytes)
            .filter(|mime| SUPPORTED_IMAGE_TYPES.contains(&mime.as_str()))
            .ok_or_else(|| {
                IdentifyError::image_access(format!(
                    "{} is not a JPEG, PNG, WebP or HEIC image",
                    path.display()
                ))
            })?;

        debug!(
            path = %path.display(),
            mime_type = %mime_type,
            size = bytes.len(),
            "Loaded image"
        );

        Ok(LoadedImage {
            file_name: handle.file_name(),
            path,
            mime_type,
            bytes,
            cached_copy,
        })
    }

    /// Copies a provider-managed resource into the local cache. The copy is
    /// deleted when the returned [`TempPath`] drops.
    async fn materialize(&self, url: &Url, file_name: &str) -> Result<TempPath, IdentifyError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(IdentifyError::image_access(format!(
                "no provider can open {} URIs",
                url.scheme()
            )));
        }

        let mut response = self.client.get(url.clone()).send().await.map_err(|err| {
            warn!(
                "Failed to fetch image {url}: {err} (timeout={}, connect={})",
                err.is_timeout(),
                err.is_connect()
            );
            IdentifyError::image_access(format!("could not copy {url}: {err}"))
        })?;

        if !response.status().is_success() {
            return Err(IdentifyError::image_access(format!(
                "could not copy {url}: status {}",
                response.status()
            )));
        }

        let too_large = || {
            IdentifyError::image_access(format!(
                "{url} is larger than {} bytes",
                self.max_bytes
            ))
        };
        if response
            .content_length()
            .is_some_and(|length| length > self.max_bytes)
        {
            return Err(too_large());
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| IdentifyError::image_access(format!("could not copy {url}: {err}")))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|err| {
                IdentifyError::image_access(format!(
                    "could not create cache directory {}: {err}",
                    self.cache_dir.display()
                ))
            })?;

        let destination = tempfile::Builder::new()
            .suffix(&format!("-{file_name}"))
            .tempfile_in(&self.cache_dir)
            .map_err(|err| {
                IdentifyError::image_access(format!(
                    "could not create a file in {}: {err}",
                    self.cache_dir.display()
                ))
            })?
            .into_temp_path();
        tokio::fs::write(&destination, &bytes).await.map_err(|err| {
            IdentifyError::image_access(format!(
                "could not write {}: {err}",
                destination.display()
            ))
        })?;

        debug!(source = %url, destination = %destination.display(), "Materialized image");
        Ok(destination)
    }
}
