use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::{error::ConversionError, models::SourceImage};

/// What ingest learned about an accepted upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Checks that `image` is real image content no larger than `max_bytes`.
///
/// Only the header is read; pixel data is left to the recognizer.
pub fn validate_image(image: &SourceImage, max_bytes: u64) -> Result<ImageInfo, ConversionError> {
    let len = image.bytes().len() as u64;
    if len == 0 {
        return Err(ConversionError::InvalidInput(format!("{} is empty", image.name)));
    }
    if len > max_bytes {
        return Err(ConversionError::InvalidInput(format!(
            "{} is {len} bytes, limit is {max_bytes}",
            image.name
        )));
    }
    if let Some(mime) = image.mime.as_deref() {
        if !mime.starts_with("image/") {
            return Err(ConversionError::InvalidInput(format!(
                "{} has type {mime}, expected image/*",
                image.name
            )));
        }
    }

    let reader = ImageReader::new(Cursor::new(image.bytes()))
        .with_guessed_format()
        .map_err(|err| ConversionError::InvalidInput(format!("{}: {err}", image.name)))?;
    let format = reader.format().ok_or_else(|| {
        ConversionError::InvalidInput(format!("{} is not a recognized image format", image.name))
    })?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|err| ConversionError::InvalidInput(format!("{}: {err}", image.name)))?;
    if width == 0 || height == 0 {
        return Err(ConversionError::InvalidInput(format!(
            "{} has no pixels ({width}x{height})",
            image.name
        )));
    }

    Ok(ImageInfo {
        format,
        width,
        height,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn accepts_png_and_reports_dimensions() {
        let image = SourceImage::new("eq.png", png_bytes(12, 7)).with_mime("image/png");
        let info = validate_image(&image, 1024 * 1024).unwrap();
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!((info.width, info.height), (12, 7));
    }

    #[test]
    fn rejects_non_image_bytes() {
        let image = SourceImage::new("notes.txt", b"just some text".to_vec());
        let err = validate_image(&image, 1024).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidInput(_)));
    }

    #[test]
    fn rejects_empty_upload() {
        let image = SourceImage::new("empty.png", Vec::new());
        assert!(matches!(
            validate_image(&image, 1024),
            Err(ConversionError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_oversized_upload() {
        let bytes = png_bytes(16, 16);
        let limit = bytes.len() as u64 - 1;
        let image = SourceImage::new("big.png", bytes);
        let err = validate_image(&image, limit).unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn rejects_declared_non_image_mime() {
        let image = SourceImage::new("eq.png", png_bytes(2, 2)).with_mime("application/pdf");
        assert!(matches!(
            validate_image(&image, 1024 * 1024),
            Err(ConversionError::InvalidInput(_))
        ));
    }
}
