use image::imageops::FilterType;
use image::DynamicImage;

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Target size for a fit-to-width resize. A zero `height` is derived from the aspect ratio.
    pub fn fit_to_width(orig_width: u32, orig_height: u32, width: u32, height: u32) -> (u32, u32) {
        let width = width.max(1);
        if height > 0 {
            return (width, height);
        }
        (width, Self::proportional_height(orig_width, orig_height, width))
    }

    /// `round(width * orig_height / orig_width)`, never below 1.
    pub fn proportional_height(orig_width: u32, orig_height: u32, width: u32) -> u32 {
        if orig_width == 0 {
            return 1;
        }
        let height = (f64::from(width) * f64::from(orig_height) / f64::from(orig_width)).round();
        (height as u32).max(1)
    }

    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> FilterType {
        let width_ratio = orig_width as f32 / new_width.max(1) as f32;
        let height_ratio = orig_height as f32 / new_height.max(1) as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            FilterType::Triangle
        } else if max_ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        }
    }

    /// Resize image to exact dimensions
    pub fn resize_image(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        let filter = Self::select_filter(img.width(), img.height(), width, height);
        img.resize_exact(width, height, filter)
    }

    /// Fit-to-width resize of a decoded image.
    pub fn resize_to_width(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        let (w, h) = Self::fit_to_width(img.width(), img.height(), width, height);
        Self::resize_image(img, w, h)
    }
}
