/// Content type to store or serve for a path.
///
/// Registry formats that `mime_guess` does not know (or guesses badly for
/// browsing) are mapped explicitly.
pub fn content_type_for(path: &str) -> Option<String> {
    let name = crate::path::file_name(path);
    let extension = name.rsplit_once('.')?.1.to_ascii_lowercase();

    let known = match extension.as_str() {
        "pom" | "nuspec" => Some("text/xml"),
        "md" => Some("text/html"),
        "ab" | "cob" | "cpy" => Some("text/plain"),
        _ => None,
    };
    if let Some(known) = known {
        return Some(known.to_string());
    }

    mime_guess::from_ext(&extension)
        .first()
        .map(|mime| mime.essence_str().to_string())
}
