use relay_http::transfer::COPY_BUFFER_SIZE;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_TOTAL_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_MEMORY: usize = 32 * 1024 * 1024;
pub const DEFAULT_FIELD_NAME: &str = "files";

/// Settings of a multipart upload endpoint.
///
/// ```
/// use relay_web::upload::UploadConfig;
///
/// let config = UploadConfig::builder("/var/uploads").max_total_bytes(1024 * 1024).build();
/// assert_eq!(config.field_name(), "files");
/// ```
#[derive(Debug, Clone)]
pub struct UploadConfig {
    upload_root: PathBuf,
    max_total_bytes: usize,
    max_memory: usize,
    field_name: String,
    buffer_size: usize,
}

impl UploadConfig {
    pub fn builder(upload_root: impl Into<PathBuf>) -> UploadConfigBuilder {
        UploadConfigBuilder::new(upload_root.into())
    }

    /// Directory receiving the uploaded files.
    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    /// Ceiling on the whole request body.
    pub fn max_total_bytes(&self) -> usize {
        self.max_total_bytes
    }

    /// Bytes of file content kept in memory per request before spilling to temporary files.
    pub fn max_memory(&self) -> usize {
        self.max_memory
    }

    /// Form field whose file parts are stored.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfigBuilder {
    config: UploadConfig,
}

impl UploadConfigBuilder {
    fn new(upload_root: PathBuf) -> Self {
        Self {
            config: UploadConfig {
                upload_root,
                max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
                max_memory: DEFAULT_MAX_MEMORY,
                field_name: DEFAULT_FIELD_NAME.to_string(),
                buffer_size: COPY_BUFFER_SIZE,
            },
        }
    }

    pub fn max_total_bytes(mut self, max_total_bytes: usize) -> Self {
        self.config.max_total_bytes = max_total_bytes;
        self
    }

    pub fn max_memory(mut self, max_memory: usize) -> Self {
        self.config.max_memory = max_memory;
        self
    }

    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.config.field_name = field_name.into();
        self
    }

    /// Copy buffer size; a zero size falls back to the default.
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.buffer_size = if buffer_size == 0 { COPY_BUFFER_SIZE } else { buffer_size };
        self
    }

    pub fn build(self) -> UploadConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UploadConfig::builder("/tmp/uploads").build();

        assert_eq!(config.upload_root(), Path::new("/tmp/uploads"));
        assert_eq!(config.max_total_bytes(), 10 << 20);
        assert_eq!(config.max_memory(), 32 << 20);
        assert_eq!(config.field_name(), "files");
        assert_eq!(config.buffer_size(), 32 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config =
            UploadConfig::builder("/srv").max_total_bytes(15).max_memory(0).field_name("attachments").buffer_size(0).build();

        assert_eq!(config.max_total_bytes(), 15);
        assert_eq!(config.max_memory(), 0);
        assert_eq!(config.field_name(), "attachments");
        assert_eq!(config.buffer_size(), COPY_BUFFER_SIZE);
    }
}
