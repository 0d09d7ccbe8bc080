use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Serialize;

use crate::error::AppError;
use crate::utils::{content_type_for_extension, extension_for_content_type};

pub const UPLOADS_TABLE: &str = "uploads";
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];
pub const DOCUMENT_EXTENSIONS: [&str; 4] = ["pdf", "doc", "docx", "txt"];
const DEFAULT_AVATAR_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Avatar,
    Image,
    Document,
}

impl UploadKind {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_lowercase().as_str() {
            "avatar" => Ok(UploadKind::Avatar),
            "image" => Ok(UploadKind::Image),
            "document" => Ok(UploadKind::Document),
            other => Err(AppError::invalid(format!(
                "Invalid upload type: {other} (expected avatar, image or document)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Avatar => "avatar",
            UploadKind::Image => "image",
            UploadKind::Document => "document",
        }
    }

    pub fn allows(&self, extension: &str) -> bool {
        match self {
            UploadKind::Avatar | UploadKind::Image => IMAGE_EXTENSIONS.contains(&extension),
            UploadKind::Document => DOCUMENT_EXTENSIONS.contains(&extension),
        }
    }
}

/// Decoded avatar payload.
#[derive(Debug)]
pub struct AvatarImage {
    pub bytes: Vec<u8>,
    pub extension: String,
    pub content_type: String,
}

impl AvatarImage {
    /// Accepts raw base64 or a `data:<mime>;base64,<payload>` URL. A data URL's
    /// mime type wins over `declared_ext`.
    pub fn decode(
        avatar_data: &str,
        declared_ext: Option<&str>,
        max_bytes: usize,
    ) -> Result<Self, AppError> {
        let (mime, encoded) = match avatar_data.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| AppError::invalid("Malformed data URL in avatar_data"))?;
                let mime = header
                    .strip_suffix(";base64")
                    .ok_or_else(|| AppError::invalid("avatar_data must be base64 encoded"))?;
                (Some(mime), payload)
            }
            None => (None, avatar_data),
        };

        let extension = match mime {
            Some(mime) => extension_for_content_type(mime)
                .ok_or_else(|| AppError::invalid(format!("Unsupported avatar type: {mime}")))?
                .to_string(),
            None => declared_ext
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .unwrap_or_else(|| DEFAULT_AVATAR_EXTENSION.to_string()),
        };
        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AppError::invalid(format!(
                "Unsupported avatar type: {extension}"
            )));
        }

        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.len() / 4 * 3 > max_bytes + 2 {
            return Err(too_large(max_bytes));
        }
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|_| AppError::invalid("avatar_data is not valid base64"))?;
        if bytes.is_empty() {
            return Err(AppError::invalid("avatar_data is empty"));
        }
        if bytes.len() > max_bytes {
            return Err(too_large(max_bytes));
        }

        let content_type = content_type_for_extension(&extension).to_string();
        Ok(Self {
            bytes,
            extension,
            content_type,
        })
    }
}

pub fn too_large(max_bytes: usize) -> AppError {
    AppError::invalid(format!("File exceeds the maximum size of {max_bytes} bytes"))
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub message: String,
    pub avatar_url: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: String,
    pub url: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub size: usize,
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TINY_PNG as PNG;

    #[test]
    fn data_url_sets_type() {
        let image = AvatarImage::decode(&format!("data:image/png;base64,{PNG}"), Some("gif"), 1024)
            .unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(image.content_type, "image/png");
        assert!(image.bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn raw_base64_uses_declared_or_default_extension() {
        assert_eq!(AvatarImage::decode(PNG, Some(".PNG"), 1024).unwrap().extension, "png");
        assert_eq!(AvatarImage::decode(PNG, None, 1024).unwrap().extension, "jpg");
    }

    #[test]
    fn rejects_bad_payloads() {
        assert!(AvatarImage::decode("!!!", None, 1024).is_err());
        assert!(AvatarImage::decode(PNG, Some("exe"), 1024).is_err());
        assert!(AvatarImage::decode("data:application/pdf;base64,AAAA", None, 1024).is_err());
        assert!(AvatarImage::decode("data:image/png,plain", None, 1024).is_err());
        assert!(AvatarImage::decode(PNG, None, 16).is_err());
    }

    #[test]
    fn upload_kinds() {
        assert_eq!(UploadKind::parse("Document").unwrap(), UploadKind::Document);
        assert!(UploadKind::parse("video").is_err());
        assert!(UploadKind::Image.allows("webp"));
        assert!(!UploadKind::Image.allows("pdf"));
        assert!(UploadKind::Document.allows("pdf"));
    }
}
