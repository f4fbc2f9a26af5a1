use std::fmt;

use palisade_common::UploadConfig;

/// Image types accepted for upload, with the extensions each may carry.
const ALLOWED_TYPES: &[(&str, &[&str])] = &[
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/png", &["png"]),
    ("image/gif", &["gif"]),
    ("image/webp", &["webp"]),
];

/// Byte patterns indicating embedded script/code. A match anywhere in
/// the file is a violation: a valid GIF container with a PHP payload is
/// still a weapon.
const MALICIOUS_SIGNATURES: &[&str] = &[
    "<?php",
    "<script",
    "javascript:",
    "vbscript:",
    "onload=",
    "onerror=",
    "onclick=",
    "eval(",
    "exec(",
    "system(",
    "shell_exec(",
];

/// Sniff the content type from magic bytes. Returns None for anything
/// that is not one of the accepted image formats.
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub declared_mime: Option<String>,
    pub data: Vec<u8>,
    /// Error reported by the upload transport, if any
    pub transport_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadViolation {
    TransportError(String),
    TooLarge { size: u64, max: u64 },
    UnrecognizedContentType,
    DeclaredMimeMismatch { declared: String, sniffed: String },
    MissingExtension,
    DisallowedExtension(String),
    ExtensionMismatch { extension: String, sniffed: String },
    MaliciousContent(&'static str),
}

impl fmt::Display for UploadViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportError(e) => write!(f, "upload failed: {e}"),
            Self::TooLarge { size, max } => {
                write!(f, "file is {size} bytes, maximum is {max}")
            }
            Self::UnrecognizedContentType => {
                f.write_str("file content is not an accepted image format")
            }
            Self::DeclaredMimeMismatch { declared, sniffed } => {
                write!(f, "declared type {declared} does not match content ({sniffed})")
            }
            Self::MissingExtension => f.write_str("file has no extension"),
            Self::DisallowedExtension(ext) => write!(f, "extension .{ext} is not allowed"),
            Self::ExtensionMismatch { extension, sniffed } => {
                write!(f, "extension .{extension} does not match content ({sniffed})")
            }
            Self::MaliciousContent(signature) => {
                write!(f, "file contains disallowed pattern {signature:?}")
            }
        }
    }
}

/// Content-first upload validation: the client-declared MIME type and
/// the extension are both checked, but the sniffed content decides.
#[derive(Clone)]
pub struct FileUploadValidator {
    config: UploadConfig,
}

impl FileUploadValidator {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, upload: &FileUpload) -> Vec<UploadViolation> {
        // A broken transport is the only short-circuit: nothing below
        // can be trusted without a complete file.
        if let Some(error) = &upload.transport_error {
            return vec![UploadViolation::TransportError(error.clone())];
        }

        let mut violations = Vec::new();

        let size = upload.data.len() as u64;
        if size > self.config.max_size_bytes {
            violations.push(UploadViolation::TooLarge {
                size,
                max: self.config.max_size_bytes,
            });
        }

        let sniffed = sniff_mime(&upload.data);
        match sniffed {
            None => violations.push(UploadViolation::UnrecognizedContentType),
            Some(sniffed) => {
                if let Some(declared) = &upload.declared_mime {
                    if declared != sniffed {
                        violations.push(UploadViolation::DeclaredMimeMismatch {
                            declared: declared.clone(),
                            sniffed: sniffed.to_owned(),
                        });
                    }
                }
            }
        }

        match extension_of(&upload.file_name) {
            None => violations.push(UploadViolation::MissingExtension),
            Some(extension) => {
                let allowed_anywhere = ALLOWED_TYPES
                    .iter()
                    .any(|(_, exts)| exts.contains(&extension.as_str()));
                if !allowed_anywhere {
                    violations.push(UploadViolation::DisallowedExtension(extension));
                } else if let Some(sniffed) = sniffed {
                    let matches_type = ALLOWED_TYPES
                        .iter()
                        .any(|(mime, exts)| *mime == sniffed && exts.contains(&extension.as_str()));
                    if !matches_type {
                        violations.push(UploadViolation::ExtensionMismatch {
                            extension,
                            sniffed: sniffed.to_owned(),
                        });
                    }
                }
            }
        }

        if self.config.scan_content {
            let haystack = String::from_utf8_lossy(&upload.data).to_lowercase();
            for signature in MALICIOUS_SIGNATURES {
                if haystack.contains(signature) {
                    violations.push(UploadViolation::MaliciousContent(signature));
                }
            }
        }

        violations
    }
}

pub fn extension_of(file_name: &str) -> Option<String> {
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> FileUploadValidator {
        FileUploadValidator::new(UploadConfig {
            max_size_bytes: 5 * 1024 * 1024,
            scan_content: true,
        })
    }

    fn gif_bytes() -> Vec<u8> {
        let mut data = b"GIF89a".to_vec();
        data.extend_from_slice(&[0u8; 32]);
        data
    }

    #[test]
    fn valid_gif_passes() {
        let violations = validator().validate(&FileUpload {
            file_name: "cat.gif".to_owned(),
            declared_mime: Some("image/gif".to_owned()),
            data: gif_bytes(),
            transport_error: None,
        });
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn php_polyglot_named_gif_is_rejected() {
        let violations = validator().validate(&FileUpload {
            file_name: "shell.gif".to_owned(),
            declared_mime: Some("image/gif".to_owned()),
            data: b"<?php system($_GET['c']); ?>".to_vec(),
            transport_error: None,
        });
        assert!(violations.contains(&UploadViolation::MaliciousContent("<?php")));
        assert!(violations.contains(&UploadViolation::MaliciousContent("system(")));
        assert!(violations.contains(&UploadViolation::UnrecognizedContentType));
    }

    #[test]
    fn gif_container_with_embedded_php_is_still_rejected() {
        let mut data = gif_bytes();
        data.extend_from_slice(b"<?php echo 'hi'; ?>");
        let violations = validator().validate(&FileUpload {
            file_name: "img.gif".to_owned(),
            declared_mime: Some("image/gif".to_owned()),
            data,
            transport_error: None,
        });
        assert!(violations.contains(&UploadViolation::MaliciousContent("<?php")));
    }

    #[test]
    fn oversized_file_rejected() {
        let validator = FileUploadValidator::new(UploadConfig {
            max_size_bytes: 16,
            scan_content: false,
        });
        let violations = validator.validate(&FileUpload {
            file_name: "cat.gif".to_owned(),
            declared_mime: None,
            data: gif_bytes(),
            transport_error: None,
        });
        assert!(matches!(
            violations[0],
            UploadViolation::TooLarge { size: 38, max: 16 }
        ));
    }

    #[test]
    fn extension_must_match_content() {
        let violations = validator().validate(&FileUpload {
            file_name: "cat.png".to_owned(),
            declared_mime: None,
            data: gif_bytes(),
            transport_error: None,
        });
        assert!(violations.iter().any(|v| matches!(
            v,
            UploadViolation::ExtensionMismatch { .. }
        )));
    }

    #[test]
    fn transport_error_short_circuits() {
        let violations = validator().validate(&FileUpload {
            file_name: "cat.exe".to_owned(),
            declared_mime: None,
            data: vec![],
            transport_error: Some("connection reset".to_owned()),
        });
        assert_eq!(
            violations,
            vec![UploadViolation::TransportError("connection reset".to_owned())]
        );
    }

    #[test]
    fn sniffing_recognizes_all_allowed_types() {
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(
            sniff_mime(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00]),
            Some("image/png")
        );
        assert_eq!(sniff_mime(b"GIF87a..."), Some("image/gif"));
        assert_eq!(sniff_mime(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime(b"MZ\x90\x00"), None);
    }

    #[test]
    fn extension_parsing() {
        assert_eq!(extension_of("a.JPG"), Some("jpg".to_owned()));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".to_owned()));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of(".hidden"), None);
    }
}
