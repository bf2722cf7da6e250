//! File adapted from: https://github.com/jamjamjon
//!
//! Turns a source frame into the network's NCHW input.

use fast_image_resize::{
    images::{Image as FirImage, ImageRef},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use ndarray::Array4;
use rayon::prelude::*;
use crate::error::DetectError;
use crate::Result;

/// Stretches `img` to `target_w` x `target_h` (no letterbox), scales pixels to `[0, 1]` and lays
/// them out as `[1, 3, h, w]`. With `swap_rb` the first and last channel trade places.
pub fn preprocess(img: &RgbImage, target_w: u32, target_h: u32, swap_rb: bool) -> Result<Array4<f32>> {
    if target_w == 0 || target_h == 0 {
        return Err(DetectError::Inference(format!("input shape {}x{} is empty", target_w, target_h)));
    }
    let resized = resize_image(img, target_w, target_h)?;
    let planes = nchw_normalize_flat(&resized, target_w as usize, target_h as usize, swap_rb)?;

    Array4::from_shape_vec((1, 3, target_h as usize, target_w as usize), planes)
        .map_err(|e| DetectError::Inference(e.to_string()))
}

fn resize_image(img: &RgbImage, target_w: u32, target_h: u32) -> Result<Vec<u8>> {
    let (w0, h0) = img.dimensions();
    if w0 == 0 || h0 == 0 {
        return Err(DetectError::Inference("frame is empty".to_string()));
    }
    if (w0, h0) == (target_w, target_h) {
        return Ok(img.as_raw().clone());
    }

    let src = ImageRef::new(w0, h0, img.as_raw(), PixelType::U8x3)
        .map_err(|e| DetectError::Inference(format!("{:?}", e)))?;
    let mut dst = FirImage::new(target_w, target_h, PixelType::U8x3);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));

    match Resizer::new().resize(&src, &mut dst, &options) {
        Ok(_) => Ok(dst.into_vec()),
        Err(err) => {
            log::warn!("Failed to use `fast_image_resize`: {:?}. Falling back.", err);
            let fallback = image::imageops::resize(img, target_w, target_h, image::imageops::FilterType::Triangle);
            Ok(fallback.into_raw())
        }
    }
}

fn nchw_normalize_flat(buf: &[u8], w: usize, h: usize, swap_rb: bool) -> Result<Vec<f32>> {
    let hw = w * h;
    if buf.len() != hw * 3 {
        return Err(DetectError::DimensionMismatch { expected: hw * 3, actual: buf.len() });
    }

    let mut out = vec![0.0f32; hw * 3];
    out.par_chunks_mut(hw).enumerate().for_each(|(c, plane)| {
        let src_c = if swap_rb { 2 - c } else { c };
        for (i, v) in plane.iter_mut().enumerate() {
            *v = buf[3 * i + src_c] as f32 / 255.0;
        }
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn output_is_nchw_and_normalized() {
        let img = RgbImage::from_pixel(4, 2, Rgb([255, 0, 51]));
        let x = preprocess(&img, 4, 2, false).unwrap();
        assert_eq!(x.shape(), &[1, 3, 2, 4]);
        assert_eq!(x[[0, 0, 1, 3]], 1.0);
        assert_eq!(x[[0, 1, 0, 0]], 0.0);
        assert!((x[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn swap_rb_reverses_channels() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let x = preprocess(&img, 2, 2, true).unwrap();
        assert_eq!(x[[0, 0, 0, 0]], 0.0);
        assert_eq!(x[[0, 2, 0, 0]], 1.0);
    }

    #[test]
    fn resizes_to_target() {
        let img = RgbImage::from_pixel(64, 48, Rgb([10, 20, 30]));
        let x = preprocess(&img, 32, 32, false).unwrap();
        assert_eq!(x.shape(), &[1, 3, 32, 32]);
        // a flat image stays flat through bilinear resampling
        assert!((x[[0, 1, 16, 16]] - 20.0 / 255.0).abs() < 1e-2);
    }

    #[test]
    fn empty_frame_fails() {
        let img = RgbImage::new(0, 0);
        assert!(preprocess(&img, 32, 32, false).is_err());
    }
}
