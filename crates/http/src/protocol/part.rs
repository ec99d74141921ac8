//! Header of a single `multipart/form-data` part.
//!
//! Every part starts with its own header block. For form data the interesting
//! field is `Content-Disposition`, which names the form field and, for file
//! inputs, carries the filename chosen by the client (RFC 7578 section 4.2).

use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::HeaderMap;
use mime::Mime;

use crate::protocol::MultipartError;

/// Parsed header block of a multipart part.
#[derive(Debug, Clone)]
pub struct PartHeader {
    name: String,
    filename: Option<String>,
    headers: HeaderMap,
}

impl PartHeader {
    /// Builds a part header from its raw header fields.
    ///
    /// Fails if `Content-Disposition` is missing, is not `form-data`, or has no `name`.
    pub fn from_headers(headers: HeaderMap) -> Result<Self, MultipartError> {
        let disposition = headers
            .get(CONTENT_DISPOSITION)
            .ok_or_else(|| MultipartError::invalid_header("missing content-disposition"))?;
        // browsers send raw UTF-8 filenames, which `HeaderValue::to_str` refuses
        let disposition = std::str::from_utf8(disposition.as_bytes()).map_err(MultipartError::invalid_header)?;

        let mut params = split_params(disposition);
        let kind = params.next().unwrap_or_default();
        if !kind.trim().eq_ignore_ascii_case("form-data") {
            return Err(MultipartError::invalid_header(format!("unsupported content-disposition: {kind}")));
        }

        let mut name = None;
        let mut filename = None;
        for param in params {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => name = Some(unquote(value.trim())),
                "filename" => filename = Some(unquote(value.trim())),
                _ => {}
            }
        }

        let name = name.ok_or_else(|| MultipartError::invalid_header("content-disposition without name"))?;
        Ok(Self { name, filename, headers })
    }

    /// The form field name of this part.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The client supplied filename, present for file inputs.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// The declared content type of the part, if it is present and parseable.
    pub fn content_type(&self) -> Option<Mime> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()
    }
}

/// Splits a header value on `;`, ignoring separators inside quoted strings.
fn split_params(value: &str) -> impl Iterator<Item = &str> {
    let mut in_quotes = false;
    let mut escaped = false;
    value
        .split(move |c: char| {
            if escaped {
                escaped = false;
                return false;
            }
            match c {
                '\\' if in_quotes => escaped = true,
                '"' => in_quotes = !in_quotes,
                ';' => return !in_quotes,
                _ => {}
            }
            false
        })
        .filter(|param| !param.trim().is_empty())
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => result.extend(chars.next()),
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn header_map(disposition: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static(disposition));
        headers
    }

    #[test]
    fn test_file_part() {
        let mut headers = header_map(r#"form-data; name="files"; filename="a.txt""#);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let part = PartHeader::from_headers(headers).unwrap();
        assert_eq!(part.name(), "files");
        assert_eq!(part.filename(), Some("a.txt"));
        assert_eq!(part.content_type(), Some(mime::TEXT_PLAIN));
    }

    #[test]
    fn test_field_part() {
        let part = PartHeader::from_headers(header_map(r#"form-data; name=comment"#)).unwrap();
        assert_eq!(part.name(), "comment");
        assert_eq!(part.filename(), None);
        assert_eq!(part.content_type(), None);
    }

    #[test]
    fn test_quoted_separator_and_escape() {
        let part = PartHeader::from_headers(header_map(r#"form-data; name="files"; filename="a;b \"c\".txt""#)).unwrap();
        assert_eq!(part.filename(), Some(r#"a;b "c".txt"#));
    }

    #[test]
    fn test_utf8_filename() {
        let mut headers = HeaderMap::new();
        let disposition = "form-data; name=\"files\"; filename=\"报告.txt\"";
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_bytes(disposition.as_bytes()).unwrap());

        let part = PartHeader::from_headers(headers).unwrap();
        assert_eq!(part.filename(), Some("报告.txt"));
    }

    #[test]
    fn test_invalid_utf8_disposition() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_bytes(b"form-data; name=\"\xff\"").unwrap());

        let result = PartHeader::from_headers(headers);
        assert!(matches!(result, Err(MultipartError::InvalidHeader { .. })));
    }

    #[test]
    fn test_traversal_filename_is_kept_verbatim() {
        let part = PartHeader::from_headers(header_map(r#"form-data; name="files"; filename="../../etc/passwd""#)).unwrap();
        assert_eq!(part.filename(), Some("../../etc/passwd"));
    }

    #[test]
    fn test_missing_disposition() {
        let result = PartHeader::from_headers(HeaderMap::new());
        assert!(matches!(result, Err(MultipartError::InvalidHeader { .. })));
    }

    #[test]
    fn test_missing_name() {
        let result = PartHeader::from_headers(header_map(r#"form-data; filename="a.txt""#));
        assert!(matches!(result, Err(MultipartError::InvalidHeader { .. })));
    }

    #[test]
    fn test_not_form_data() {
        let result = PartHeader::from_headers(header_map(r#"attachment; name="files""#));
        assert!(matches!(result, Err(MultipartError::InvalidHeader { .. })));
    }
}
