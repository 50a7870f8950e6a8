//! Opacity mask: decide which pixels belong to the shape.
//!
//! A pixel is foreground when its raw alpha exceeds `alpha_threshold`
//! AND its box-blurred alpha exceeds `binary_threshold`. Both tests are
//! strict. Foreground pixels are 255 in the returned mask, background 0.

use image::{GrayImage, Luma};

use crate::types::{MeshError, RgbaImage};

/// Value of a foreground pixel in the mask.
pub const FOREGROUND: u8 = 255;

/// Extract the alpha channel of an RGBA image.
#[must_use = "returns the alpha channel"]
pub fn alpha_channel(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y).0[3]])
    })
}

/// Build the binary opacity mask.
///
/// # Errors
///
/// Returns [`MeshError::EmptyMask`] when no pixel passes both thresholds,
/// which includes zero-sized images.
pub fn build_mask(
    image: &RgbaImage,
    alpha_threshold: u8,
    blur_kernel_size: u32,
    binary_threshold: u8,
) -> Result<GrayImage, MeshError> {
    let alpha = alpha_channel(image);
    let blurred = crate::blur::box_blur(&alpha, blur_kernel_size);

    let mask = GrayImage::from_fn(alpha.width(), alpha.height(), |x, y| {
        let raw = alpha.get_pixel(x, y).0[0];
        let soft = blurred.get_pixel(x, y).0[0];
        if raw > alpha_threshold && soft > binary_threshold {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    });

    if count_foreground(&mask) == 0 {
        return Err(MeshError::EmptyMask {
            alpha_threshold,
            binary_threshold,
        });
    }
    Ok(mask)
}

/// Number of foreground pixels in a mask.
#[must_use]
pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.pixels()
        .map(|p| u64::from(u8::from(p.0[0] == FOREGROUND)))
        .sum()
}
