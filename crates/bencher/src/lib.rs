/// A synthetic `multipart/form-data` body used as benchmark input.
#[derive(Debug, Clone)]
pub struct MultipartPayload {
    name: &'static str,
    boundary: &'static str,
    body: Vec<u8>,
    content_len: usize,
}

impl MultipartPayload {
    pub const BOUNDARY: &'static str = "bencher-boundary";

    /// One file part per entry of `file_sizes`, each filled by [`file_content`].
    pub fn new(name: &'static str, file_sizes: &[usize]) -> Self {
        let boundary = Self::BOUNDARY;
        let mut body = Vec::new();
        for (index, &size) in file_sizes.iter().enumerate() {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"files\"; filename=\"file-{index}.bin\"\r\n").as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(&file_content(size));
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        Self { name, boundary, body, content_len: file_sizes.iter().sum() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn boundary(&self) -> &'static str {
        self.boundary
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Total size of the file contents, without multipart framing.
    pub fn content_len(&self) -> usize {
        self.content_len
    }
}

/// Deterministic bytes that never contain a CR, so they cannot form a delimiter.
pub fn file_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| b'a' + (i % 26) as u8).collect()
}
