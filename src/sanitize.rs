//! Input validation shared by the Document Manager: file name sanitization,
//! document id generation/validation, and image extension sniffing.

use rand::RngCore;

pub const MAX_FILE_NAME_LEN: usize = 500;

/// Generates a fresh document id: a cryptographically random 128-bit value
/// rendered as 32 lowercase hex characters. This is the sole identifier
/// used in filesystem paths, so it is constrained to `[0-9a-f]` by
/// construction rather than by validating external input.
pub fn generate_doc_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Validates that a document id is exactly 32 lowercase hex characters,
/// the only shape ever produced by [`generate_doc_id`]. Any id reaching a
/// filesystem path (uploads directory, delete) must pass this first.
pub fn is_valid_doc_id(id: &str) -> bool {
    id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Rejects doc ids containing path traversal sequences. Stricter callers
/// (anything that turns the id into a path component) should prefer
/// [`is_valid_doc_id`]; this is used where only traversal matters.
pub fn is_safe_doc_id(id: &str) -> bool {
    !id.contains('/') && !id.contains('\\') && !id.contains("..")
}

/// Strips directory components and replaces filesystem-hostile characters
/// with `_`. Does not enforce length — callers validate `file_name.len() <=
/// MAX_FILE_NAME_LEN` separately so the error message can distinguish
/// "too long" from "sanitized".
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\\' | '\0' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        })
        .collect()
}

/// Sniffs an image's file extension from its magic bytes. Falls back to
/// `.png` for anything unrecognized rather than failing the upload.
pub fn sniff_image_extension(data: &[u8]) -> &'static str {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "png"
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "webp"
    } else if data.starts_with(b"GIF8") {
        "gif"
    } else {
        "png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_doc_id_is_valid() {
        for _ in 0..50 {
            let id = generate_doc_id();
            assert!(is_valid_doc_id(&id), "generated id {id} should validate");
        }
    }

    #[test]
    fn rejects_uppercase_and_wrong_length() {
        assert!(!is_valid_doc_id("ABCDEF0123456789ABCDEF0123456789"));
        assert!(!is_valid_doc_id("abc123"));
    }

    #[test]
    fn sanitizes_path_components_and_special_chars() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("weird:name?.txt"), "weird_name_.txt");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\doc.txt"), "doc.txt");
    }

    #[test]
    fn safe_doc_id_rejects_traversal() {
        assert!(!is_safe_doc_id("../etc"));
        assert!(!is_safe_doc_id("a/b"));
        assert!(is_safe_doc_id("abcdef0123456789abcdef0123456789"));
    }

    #[test]
    fn sniffs_known_image_formats() {
        assert_eq!(sniff_image_extension(&[0xFF, 0xD8, 0xFF, 0xE0]), "jpg");
        assert_eq!(sniff_image_extension(&[0x89, 0x50, 0x4E, 0x47]), "png");
        assert_eq!(sniff_image_extension(b"GIF89a"), "gif");
        assert_eq!(sniff_image_extension(&[0u8; 4]), "png");
    }
}
