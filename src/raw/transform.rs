/// CPU geometry transforms baked into the RAW buffer
///
/// Crop and rotation are destructive: when committed they replace the
/// authoritative `RawImage`. The GPU kernels in `gpu::shaders` preview the
/// same mappings, so the formulas here and there must stay in sync.

use crate::pixels::RawImage;

/// Pixel rectangle `(x, y, width, height)` within an image
pub type PixelRect = (u32, u32, u32, u32);

/// Copy out a sub-rectangle. The rect is clamped to the image and kept at
/// least one pixel in each direction.
pub fn crop(image: &RawImage, rect: PixelRect) -> RawImage {
    if image.is_empty() {
        return image.clone();
    }
    let (x, y, w, h) = rect;
    let x = x.min(image.width.saturating_sub(1));
    let y = y.min(image.height.saturating_sub(1));
    let w = w.clamp(1, image.width - x);
    let h = h.clamp(1, image.height - y);

    let src_stride = image.width as usize * 4;
    let row_len = w as usize * 4;
    let mut data = Vec::with_capacity(row_len * h as usize);
    for row in y..y + h {
        let start = row as usize * src_stride + x as usize * 4;
        data.extend_from_slice(&image.data[start..start + row_len]);
    }

    RawImage { data, width: w, height: h }
}

/// Rotate by `turns` quarter turns clockwise (negative turns go counter-clockwise)
pub fn rotate_quarter(image: &RawImage, turns: i32) -> RawImage {
    let turns = turns.rem_euclid(4);
    if turns == 0 {
        return image.clone();
    }

    let (w, h) = (image.width as usize, image.height as usize);
    let (dw, dh) = if turns == 2 { (w, h) } else { (h, w) };
    let mut data = vec![0u16; dw * dh * 4];

    for y in 0..dh {
        for x in 0..dw {
            let (sx, sy) = match turns {
                1 => (y, h - 1 - x),
                2 => (w - 1 - x, h - 1 - y),
                _ => (w - 1 - y, x),
            };
            let s = (sy * w + sx) * 4;
            let d = (y * dw + x) * 4;
            data[d..d + 4].copy_from_slice(&image.data[s..s + 4]);
        }
    }

    RawImage {
        data,
        width: dw as u32,
        height: dh as u32,
    }
}

/// Scale of the largest same-aspect rectangle that fits inside a `w`x`h`
/// image rotated by `degrees`
pub fn inscribed_scale(width: u32, height: u32, degrees: f32) -> f32 {
    let (w, h) = (width as f32, height as f32);
    let theta = degrees.to_radians();
    let (c, s) = (theta.cos().abs(), theta.sin().abs());
    (w / (w * c + h * s)).min(h / (w * s + h * c))
}

/// Output dimensions of [`rotate_arbitrary`]
pub fn rotated_size(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let scale = inscribed_scale(width, height, degrees);
    (
        ((width as f32 * scale).round() as u32).max(1),
        ((height as f32 * scale).round() as u32).max(1),
    )
}

/// Rotate clockwise by `degrees` with bilinear resampling, cropped to the
/// inscribed rectangle so no empty corners remain
pub fn rotate_arbitrary(image: &RawImage, degrees: f32) -> RawImage {
    if degrees.abs() < 1e-3 || image.is_empty() {
        return image.clone();
    }

    let (dw, dh) = rotated_size(image.width, image.height, degrees);
    let theta = degrees.to_radians();
    let (cos, sin) = (theta.cos(), theta.sin());
    let (cx, cy) = (image.width as f32 * 0.5, image.height as f32 * 0.5);
    let (ocx, ocy) = (dw as f32 * 0.5, dh as f32 * 0.5);

    let mut data = Vec::with_capacity(dw as usize * dh as usize * 4);
    for y in 0..dh {
        for x in 0..dw {
            let u = x as f32 + 0.5 - ocx;
            let v = y as f32 + 0.5 - ocy;
            // Inverse of the clockwise rotation (y points down)
            let sx = u * cos + v * sin + cx - 0.5;
            let sy = -u * sin + v * cos + cy - 0.5;
            data.extend_from_slice(&sample_bilinear(image, sx, sy));
        }
    }

    RawImage { data, width: dw, height: dh }
}

/// Bilinear sample at pixel-center coordinates, clamped to the edge
fn sample_bilinear(image: &RawImage, x: f32, y: f32) -> [u16; 4] {
    let max_x = (image.width - 1) as f32;
    let max_y = (image.height - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(image.width - 1);
    let y1 = (y0 + 1).min(image.height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = image.pixel(x0, y0);
    let p10 = image.pixel(x1, y0);
    let p01 = image.pixel(x0, y1);
    let p11 = image.pixel(x1, y1);

    let mut out = [0u16; 4];
    for c in 0..4 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 65535.0) as u16;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3x2 image where each pixel's red channel is its index
    fn indexed(w: u32, h: u32) -> RawImage {
        let mut data = Vec::new();
        for i in 0..(w * h) as u16 {
            data.extend_from_slice(&[i, 0, 0, 65535]);
        }
        RawImage::new(data, w, h).unwrap()
    }

    fn reds(img: &RawImage) -> Vec<u16> {
        img.data.chunks_exact(4).map(|p| p[0]).collect()
    }

    #[test]
    fn test_crop_copies_region() {
        let img = indexed(4, 3);
        let out = crop(&img, (1, 1, 2, 2));
        assert_eq!((out.width, out.height), (2, 2));
        assert_eq!(reds(&out), vec![5, 6, 9, 10]);
    }

    #[test]
    fn test_crop_clamps_to_image() {
        let img = indexed(4, 3);
        let out = crop(&img, (3, 2, 10, 10));
        assert_eq!((out.width, out.height), (1, 1));
        assert_eq!(reds(&out), vec![11]);
    }

    #[test]
    fn test_quarter_turns() {
        // 0 1 2
        // 3 4 5
        let img = indexed(3, 2);

        let cw = rotate_quarter(&img, 1);
        assert_eq!((cw.width, cw.height), (2, 3));
        assert_eq!(reds(&cw), vec![3, 0, 4, 1, 5, 2]);

        let half = rotate_quarter(&img, 2);
        assert_eq!(reds(&half), vec![5, 4, 3, 2, 1, 0]);

        let ccw = rotate_quarter(&img, -1);
        assert_eq!(reds(&ccw), vec![2, 5, 1, 4, 0, 3]);

        assert_eq!(rotate_quarter(&cw, 3), img);
    }

    #[test]
    fn test_arbitrary_rotation_crops_inside() {
        let img = RawImage::filled(200, 100, [1000, 2000, 3000, 65535]);
        let out = rotate_arbitrary(&img, 10.0);
        assert!(out.width < 200 && out.height < 100);
        let aspect = out.width as f32 / out.height as f32;
        assert!((aspect - 2.0).abs() < 0.05);
        // A flat image stays flat: no border samples leaked in
        assert!(out.data.chunks_exact(4).all(|p| p == [1000, 2000, 3000, 65535]));
    }

    #[test]
    fn test_zero_angle_is_identity() {
        let img = indexed(3, 2);
        assert_eq!(rotate_arbitrary(&img, 0.0), img);
        assert_eq!(inscribed_scale(3, 2, 0.0), 1.0);
    }
}
