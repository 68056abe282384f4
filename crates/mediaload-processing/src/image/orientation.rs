use exif::{In, Reader, Tag};
use image::DynamicImage;
use std::io::Cursor;

/// EXIF orientation handling (rotation and flipping)
pub struct ImageOrientation;

impl ImageOrientation {
    /// Read the EXIF orientation tag. Missing or unreadable tags count as 1.
    pub fn read_exif_orientation(data: &[u8]) -> u8 {
        let exif = match Reader::new().read_from_container(&mut Cursor::new(data)) {
            Ok(exif) => exif,
            Err(_) => return 1,
        };

        exif.get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .and_then(|value| u8::try_from(value).ok())
            .unwrap_or(1)
    }

    /// Apply the geometric transform for an EXIF orientation value.
    ///
    /// 5 (transpose) and 7 (transverse) are left as no-ops.
    pub fn apply_orientation(img: DynamicImage, orientation: u8) -> DynamicImage {
        tracing::debug!(orientation, "Applying EXIF orientation");

        match orientation {
            2 => img.fliph(),
            3 => img.rotate180(),
            4 => img.flipv(),
            6 => img.rotate90(),
            8 => img.rotate270(),
            _ => img,
        }
    }

    /// Decode-independent shortcut: read the tag from `data` and apply it.
    pub fn apply_exif_orientation(img: DynamicImage, data: &[u8]) -> DynamicImage {
        let orientation = Self::read_exif_orientation(data);
        Self::apply_orientation(img, orientation)
    }
}
