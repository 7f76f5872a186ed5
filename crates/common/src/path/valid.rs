/// Strip leading slashes so request paths line up with object keys.
pub fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Last segment of a path, ignoring a trailing slash.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(p) => &trimmed[p + 1..],
        None => trimmed,
    }
}

/// Whether a path may be written or removed by bulk operations.
///
/// Rejects empty paths, `.`/`..` and empty interior segments, and anything
/// under a reserved top level segment (the API/metadata namespace).
pub fn valid_path<S: AsRef<str>>(path: &str, reserved: &[S]) -> bool {
    if path.is_empty() || path.starts_with('/') {
        return false;
    }

    let body = path.strip_suffix('/').unwrap_or(path);
    if body
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return false;
    }

    let first = body.split('/').next().unwrap_or_default();
    !reserved.iter().any(|r| r.as_ref() == first)
}
