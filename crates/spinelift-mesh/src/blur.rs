//! Box blur for smoothing the alpha channel before thresholding.
//!
//! Wraps [`imageproc::filter::box_filter`]. Softening the alpha channel
//! lets a second threshold close pinholes and shave single-pixel spurs
//! off the opacity mask.

use image::GrayImage;

/// Apply a square box blur with the given kernel size.
///
/// Even kernel sizes are bumped to the next odd value so the kernel is
/// centred on the pixel. A kernel size of 0 or 1 returns the image
/// unchanged, as does an empty image.
#[must_use = "returns the blurred image"]
pub fn box_blur(image: &GrayImage, kernel_size: u32) -> GrayImage {
    let kernel = kernel_size | 1;
    if kernel <= 1 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let radius = (kernel - 1) / 2;
    imageproc::filter::box_filter(image, radius, radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 10x10 image whose left half is transparent and right half opaque.
    fn half_opaque() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn kernel_one_is_identity() {
        let img = half_opaque();
        assert_eq!(box_blur(&img, 1), img);
    }

    #[test]
    fn kernel_zero_is_identity() {
        let img = half_opaque();
        assert_eq!(box_blur(&img, 0), img);
    }

    #[test]
    fn blur_softens_the_step() {
        let blurred = box_blur(&half_opaque(), 3);
        let left = blurred.get_pixel(4, 5).0[0];
        let right = blurred.get_pixel(5, 5).0[0];
        assert!(left > 0 && left < 255, "left of step: {left}");
        assert!(right > 0 && right < 255, "right of step: {right}");
    }

    #[test]
    fn far_pixels_unchanged() {
        let blurred = box_blur(&half_opaque(), 3);
        assert_eq!(blurred.get_pixel(1, 5).0[0], 0);
        assert_eq!(blurred.get_pixel(8, 5).0[0], 255);
    }

    #[test]
    fn even_kernel_matches_next_odd() {
        let img = half_opaque();
        assert_eq!(box_blur(&img, 4), box_blur(&img, 5));
    }

    #[test]
    fn dimensions_preserved() {
        let img = GrayImage::new(17, 9);
        let blurred = box_blur(&img, 7);
        assert_eq!(blurred.dimensions(), (17, 9));
    }
}
