//! Survey template upload checks.
//!
//! Templates are PNG, JPEG or PDF files of at most [`MAX_TEMPLATE_BYTES`].
//! The extension and declared MIME type gate the request; the content is then
//! sniffed so a renamed file cannot slip through. Images are inspected from
//! their headers only (format and dimensions), never fully decoded.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::error::CoreError;
use crate::survey::image_package_name;
use crate::types::DbId;

pub const MAX_TEMPLATE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Png,
    Jpeg,
    Pdf,
}

impl TemplateKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Pdf => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Pdf => "pdf",
        }
    }
}

/// Check an uploaded template and return its kind.
pub fn validate_template(
    filename: &str,
    content_type: Option<&str>,
    data: &[u8],
) -> Result<TemplateKind, CoreError> {
    if data.len() > MAX_TEMPLATE_BYTES {
        return Err(CoreError::PayloadTooLarge(format!(
            "Template exceeds the {} MB limit",
            MAX_TEMPLATE_BYTES / (1024 * 1024)
        )));
    }

    let ext = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    let kind = TemplateKind::from_extension(ext).ok_or_else(|| {
        CoreError::UnsupportedMediaType(format!(
            "Unsupported extension '.{ext}': only png, jpg, jpeg and pdf are accepted"
        ))
    })?;

    if let Some(declared) = content_type {
        let mime = declared.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if mime != kind.mime_type() {
            return Err(CoreError::UnsupportedMediaType(format!(
                "Unsupported MIME type '{declared}' for a .{ext} file"
            )));
        }
    }

    if data.is_empty() {
        return Err(CoreError::Validation("Template file is empty".into()));
    }

    match kind {
        TemplateKind::Pdf => {
            if !data.starts_with(b"%PDF-") {
                return Err(CoreError::Validation("File is not a valid PDF document".into()));
            }
        }
        TemplateKind::Png | TemplateKind::Jpeg => sniff_image(kind, data)?,
    }

    Ok(kind)
}

fn sniff_image(kind: TemplateKind, data: &[u8]) -> Result<(), CoreError> {
    let invalid = || CoreError::Validation(format!("File is not a valid {} image", kind.extension()));

    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|_| invalid())?;
    let expected = match kind {
        TemplateKind::Png => ImageFormat::Png,
        _ => ImageFormat::Jpeg,
    };
    if reader.format() != Some(expected) {
        return Err(invalid());
    }
    let (width, height) = reader.into_dimensions().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok(())
}

/// Storage path of a template, relative to the storage root:
/// `user_{owner}_q_{survey}/{stem}.{ext}`.
pub fn template_relative_path(owner_id: DbId, survey_id: DbId, stem: &str, kind: TemplateKind) -> String {
    format!(
        "{}/{stem}.{}",
        image_package_name(owner_id, survey_id),
        kind.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// A 1x1 RGBA PNG.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8,
        0xCF, 0xC0, 0xF0, 0x1F, 0x00, 0x05, 0x00, 0x01, 0xFF, 0x89, 0x99, 0x3D, 0x1D, 0x00, 0x00,
        0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn accepts_png_with_matching_mime() {
        assert_eq!(
            validate_template("logo.PNG", Some("image/png"), TINY_PNG).unwrap(),
            TemplateKind::Png
        );
    }

    #[test]
    fn accepts_pdf() {
        assert_eq!(
            validate_template("form.pdf", Some("application/pdf"), b"%PDF-1.7\n...").unwrap(),
            TemplateKind::Pdf
        );
    }

    #[test]
    fn rejects_gif_extension() {
        assert_matches!(
            validate_template("anim.gif", Some("image/gif"), b"GIF89a"),
            Err(CoreError::UnsupportedMediaType(_))
        );
    }

    #[test]
    fn rejects_mismatched_mime() {
        assert_matches!(
            validate_template("logo.png", Some("text/plain"), TINY_PNG),
            Err(CoreError::UnsupportedMediaType(_))
        );
    }

    #[test]
    fn rejects_oversize_file() {
        let data = vec![0u8; MAX_TEMPLATE_BYTES + 1];
        assert_matches!(
            validate_template("big.png", Some("image/png"), &data),
            Err(CoreError::PayloadTooLarge(_))
        );
    }

    #[test]
    fn rejects_renamed_file() {
        assert_matches!(
            validate_template("fake.png", None, b"%PDF-1.4"),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            validate_template("fake.pdf", None, TINY_PNG),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn relative_path_is_scoped_by_owner_and_survey() {
        assert_eq!(
            template_relative_path(3, 9, "abc", TemplateKind::Jpeg),
            "user_3_q_9/abc.jpg"
        );
    }
}
