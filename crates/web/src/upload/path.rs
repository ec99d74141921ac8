use crate::upload::UploadError;
use std::path::{Component, Path, PathBuf};

/// Resolves a client supplied filename to a path directly under `root`.
///
/// Both `/` and `\` are treated as separators, whatever the platform. A name with a `..`
/// component is rejected outright rather than reduced to its base name, and the result
/// must be a single normal component below `root`.
pub fn destination_path(root: &Path, filename: &str) -> Result<PathBuf, UploadError> {
    let mut components = filename.split(['/', '\\']);
    if components.any(|component| component == "..") {
        return Err(UploadError::invalid_path(filename));
    }

    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    if base.is_empty() || base == "." {
        return Err(UploadError::invalid_path(filename));
    }

    let destination = root.join(base);
    let mut relative = match destination.strip_prefix(root) {
        Ok(relative) => relative.components(),
        Err(_) => return Err(UploadError::invalid_path(filename)),
    };
    match (relative.next(), relative.next()) {
        (Some(Component::Normal(_)), None) => Ok(destination),
        _ => Err(UploadError::invalid_path(filename)),
    }
}
