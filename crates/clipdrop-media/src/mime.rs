// crates/clipdrop-media/src/mime.rs
//
// Content-type → file extension. A short fixed table for the types that show
// up most when pasting from a browser, then mime_guess, then "bin".

use clipdrop_core::media::TypeTag;

const KNOWN: &[(&str, &str)] = &[
    ("image/png",        "png"),
    ("image/jpeg",       "jpg"),
    ("image/jpg",        "jpg"),
    ("image/gif",        "gif"),
    ("image/webp",       "webp"),
    ("image/svg+xml",    "svg"),
    ("image/bmp",        "bmp"),
    ("video/mp4",        "mp4"),
    ("video/quicktime",  "mov"),
    ("video/webm",       "webm"),
    ("audio/mpeg",       "mp3"),
    ("audio/wav",        "wav"),
    ("text/plain",       "txt"),
    ("text/html",        "html"),
    ("application/json", "json"),
    ("application/pdf",  "pdf"),
];

/// Strip parameters (`; charset=…`) and lowercase.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn extension_for(content_type: &str) -> String {
    let essence = essence(content_type);
    if let Some((_, ext)) = KNOWN.iter().find(|(m, _)| *m == essence) {
        return (*ext).to_string();
    }
    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map(|e| e.to_string())
        .unwrap_or_else(|| "bin".to_string())
}

/// Media type for a dropped file, judged by its extension. Images the PNG
/// saver cannot decode (SVG, TIFF, HEIC, …) are plain files and get copied
/// under their own extension.
pub fn type_tag_for_path(path: &std::path::Path) -> TypeTag {
    if is_decodable_image(path) {
        return TypeTag::IMAGE;
    }
    let guess = mime_guess::from_path(path).first();
    match guess {
        Some(m) if m.type_() == mime_guess::mime::VIDEO => TypeTag::VIDEO,
        Some(m) if m.essence_str() == "text/plain"       => TypeTag::TEXT,
        _                                                => TypeTag::FILE,
    }
}

fn is_decodable_image(path: &std::path::Path) -> bool {
    image::ImageFormat::from_path(path).is_ok_and(|f| f.reading_enabled())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn known_types_map_directly() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/PNG; charset=binary"), "png");
    }

    #[test]
    fn unknown_type_falls_back_to_bin() {
        assert_eq!(extension_for("application/x-clipdrop-nothing"), "bin");
        assert_eq!(extension_for(""), "bin");
    }

    #[test]
    fn dropped_files_classified_by_extension() {
        assert_eq!(type_tag_for_path(Path::new("a.JPG")), TypeTag::IMAGE);
        assert_eq!(type_tag_for_path(Path::new("a.mp4")), TypeTag::VIDEO);
        assert_eq!(type_tag_for_path(Path::new("a.txt")), TypeTag::TEXT);
        assert_eq!(type_tag_for_path(Path::new("a.zip")), TypeTag::FILE);
    }

    #[test]
    fn undecodable_images_are_plain_files() {
        assert_eq!(type_tag_for_path(Path::new("a.webp")), TypeTag::IMAGE);
        assert_eq!(type_tag_for_path(Path::new("a.bmp")), TypeTag::IMAGE);
        assert_eq!(type_tag_for_path(Path::new("logo.svg")), TypeTag::FILE);
        assert_eq!(type_tag_for_path(Path::new("scan.tif")), TypeTag::FILE);
        assert_eq!(type_tag_for_path(Path::new("photo.heic")), TypeTag::FILE);
    }
}
