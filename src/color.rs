/// Color space conversion utilities
///
/// This module handles conversion between different color spaces:
/// - Camera RGB (sensor-native color space)
/// - XYZ (device-independent color space)
/// - sRGB (standard display color space)

use cgmath::{Matrix3, SquareMatrix};

/// Linear sRGB (D65) to XYZ
/// Source: IEC 61966-2-1:1999 (sRGB standard)
const SRGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

pub const IDENTITY: [f32; 9] = [
    1.0, 0.0, 0.0,
    0.0, 1.0, 0.0,
    0.0, 0.0, 1.0,
];

/// Rec. 709 luma of a linear or encoded RGB triple
pub fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// Calculate the camera-to-sRGB color conversion matrix
///
/// Builds `cam_rgb = xyz_to_cam × srgb_to_xyz`, normalizes each row to sum
/// to 1 so that a white-balanced neutral stays neutral, then inverts it.
///
/// # Arguments
/// * `xyz_to_cam` - The camera's XYZ to camera RGB matrix (row-major, from RAW metadata)
///
/// # Returns
/// * Camera-to-sRGB matrix as a flat row-major `[f32; 9]`, or identity when
///   the metadata is missing, singular or produces extreme values
pub fn calculate_cam_to_srgb_matrix(xyz_to_cam: [f32; 9]) -> [f32; 9] {
    if xyz_to_cam.iter().all(|&v| v == 0.0) || is_identity_matrix(&xyz_to_cam) {
        return IDENTITY;
    }

    // Some formats store the matrix scaled by 10000
    let norm = if xyz_to_cam.iter().any(|v| v.abs() > 10.0) { 10000.0 } else { 1.0 };

    let mut cam_rgb = [[0.0f32; 3]; 3];
    for (i, row) in cam_rgb.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3)
                .map(|k| xyz_to_cam[i * 3 + k] / norm * SRGB_TO_XYZ[k][j])
                .sum();
        }
        let sum: f32 = row.iter().sum();
        if sum.abs() < 1e-6 {
            return IDENTITY;
        }
        for cell in row.iter_mut() {
            *cell /= sum;
        }
    }

    // cgmath is column-major: Matrix3::new takes columns
    let m = Matrix3::new(
        cam_rgb[0][0], cam_rgb[1][0], cam_rgb[2][0],
        cam_rgb[0][1], cam_rgb[1][1], cam_rgb[2][1],
        cam_rgb[0][2], cam_rgb[1][2], cam_rgb[2][2],
    );

    let Some(inv) = m.invert() else {
        tracing::warn!("⚠️  Camera color matrix is singular, using identity");
        return IDENTITY;
    };

    let result = [
        inv[0][0], inv[1][0], inv[2][0],
        inv[0][1], inv[1][1], inv[2][1],
        inv[0][2], inv[1][2], inv[2][2],
    ];

    if result.iter().any(|v| !v.is_finite() || v.abs() > 10.0) {
        tracing::warn!("⚠️  Camera color matrix has extreme values, using identity");
        return IDENTITY;
    }

    result
}

/// Check if a color matrix is the identity matrix (no conversion)
pub fn is_identity_matrix(matrix: &[f32; 9]) -> bool {
    const EPSILON: f32 = 0.001;
    matrix
        .iter()
        .zip(IDENTITY.iter())
        .all(|(a, b)| (a - b).abs() < EPSILON)
}

/// Apply a row-major 3x3 matrix to an RGB triple
pub fn apply_matrix(m: &[f32; 9], rgb: [f32; 3]) -> [f32; 3] {
    [
        m[0] * rgb[0] + m[1] * rgb[1] + m[2] * rgb[2],
        m[3] * rgb[0] + m[4] * rgb[1] + m[5] * rgb[2],
        m[6] * rgb[0] + m[7] * rgb[1] + m[8] * rgb[2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_matrix_detection() {
        assert!(is_identity_matrix(&IDENTITY));

        let non_identity = [1.5, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        assert!(!is_identity_matrix(&non_identity));
    }

    #[test]
    fn test_missing_matrix_falls_back_to_identity() {
        assert_eq!(calculate_cam_to_srgb_matrix([0.0; 9]), IDENTITY);
    }

    #[test]
    fn test_srgb_camera_maps_to_identity() {
        // A "camera" whose native space is sRGB: xyz_to_cam = inverse(srgb_to_xyz)
        let xyz_to_srgb = [
            3.2404542, -1.5371385, -0.4985314,
            -0.9692660, 1.8760108, 0.0415560,
            0.0556434, -0.2040259, 1.0572252,
        ];
        let m = calculate_cam_to_srgb_matrix(xyz_to_srgb);
        for (a, b) in m.iter().zip(IDENTITY.iter()) {
            assert!((a - b).abs() < 0.01, "{m:?}");
        }
    }

    #[test]
    fn test_rows_preserve_neutral() {
        // Any valid result must keep white white
        let xyz_to_cam = [0.7, -0.1, -0.05, -0.4, 1.2, 0.2, -0.05, 0.15, 0.6];
        let m = calculate_cam_to_srgb_matrix(xyz_to_cam);
        let white = apply_matrix(&m, [1.0, 1.0, 1.0]);
        for c in white {
            assert!((c - 1.0).abs() < 1e-3, "{white:?}");
        }
    }
}
