//! Content types inferred from file extensions.

/// The content type conventionally used for an extension (without the dot).
#[must_use]
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
  let ext = ext.trim_start_matches('.').to_ascii_lowercase();
  Some(match ext.as_str() {
    "jpg" | "jpeg" | "jfif" => "image/jpeg",
    "png" => "image/png",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "svg" => "image/svg+xml",
    "bmp" => "image/bmp",
    "tif" | "tiff" => "image/tiff",
    "avif" => "image/avif",
    "heic" => "image/heic",
    "heif" => "image/heif",
    "ico" => "image/x-icon",
    "pdf" => "application/pdf",
    "json" => "application/json",
    "txt" => "text/plain",
    _ => return None,
  })
}

/// Guesses the content type of a key or file name from its extension.
#[must_use]
pub fn guess_content_type(name: &str) -> Option<&'static str> {
  let file_name = name.rsplit('/').next().unwrap_or(name);
  let idx = file_name.rfind('.').filter(|i| *i > 0)?;
  content_type_for_extension(&file_name[idx + 1..])
}
