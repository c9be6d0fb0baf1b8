//! Data Augmentation Module for Banana Leaf Classification
//!
//! Random geometric augmentations applied on the fly to training images.
//! Rotation, shift, shear and zoom are composed into a single affine map
//! about the image centre, sampled bilinearly into float CHW data; pixels
//! that fall outside the source repeat the nearest edge pixel. A horizontal
//! flip may follow.
//!
//! # Augmentation Strategy
//!
//! - **Training**: random geometric transforms on already-resized images
//! - **Validation/Inference**: no augmentation

use image::RgbImage;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::loader::to_chw_tensor_data;

/// Configuration for data augmentation
#[derive(Clone, Debug, PartialEq)]
pub struct AugmentationConfig {
    /// Maximum rotation angle in degrees (applies ±rotation_degrees)
    pub rotation_degrees: f32,
    /// Maximum horizontal shift as a fraction of the width
    pub width_shift: f32,
    /// Maximum vertical shift as a fraction of the height
    pub height_shift: f32,
    /// Maximum shear angle in degrees (applies ±shear_degrees)
    pub shear_degrees: f32,
    /// Zoom factors are drawn per axis from `[1 - zoom_range, 1 + zoom_range]`
    pub zoom_range: f32,
    /// Flip horizontally with probability 0.5
    pub horizontal_flip: bool,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_degrees: 25.0,
            width_shift: 0.15,
            height_shift: 0.15,
            shear_degrees: 0.15,
            zoom_range: 0.15,
            horizontal_flip: true,
        }
    }
}

impl AugmentationConfig {
    /// Disable all augmentations (for validation/inference)
    pub fn none() -> Self {
        Self {
            rotation_degrees: 0.0,
            width_shift: 0.0,
            height_shift: 0.0,
            shear_degrees: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
        }
    }

    /// True when no transform can change an image
    pub fn is_identity(&self) -> bool {
        self == &Self::none()
    }
}

/// One concrete draw of the random transform parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformParams {
    /// Rotation in degrees
    pub theta: f32,
    /// Shift along rows, in pixels
    pub tx: f32,
    /// Shift along columns, in pixels
    pub ty: f32,
    /// Shear in degrees
    pub shear: f32,
    /// Zoom along rows
    pub zx: f32,
    /// Zoom along columns
    pub zy: f32,
    /// Mirror left-right after the affine map
    pub flip_horizontal: bool,
}

impl TransformParams {
    /// Parameters that leave an image unchanged
    pub fn identity() -> Self {
        Self {
            theta: 0.0,
            tx: 0.0,
            ty: 0.0,
            shear: 0.0,
            zx: 1.0,
            zy: 1.0,
            flip_horizontal: false,
        }
    }
}

type Mat3 = [[f32; 3]; 3];

fn mat_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0f32; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn uniform(rng: &mut ChaCha8Rng, limit: f32) -> f32 {
    if limit > 0.0 {
        rng.gen_range(-limit..=limit)
    } else {
        0.0
    }
}

/// Image augmenter that applies random transformations
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    /// Create a new augmenter with the given configuration
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// Create an augmenter with the default training augmentation
    pub fn with_defaults() -> Self {
        Self::new(AugmentationConfig::default())
    }

    /// Draw transform parameters for an image of the given size
    pub fn random_params(&self, width: u32, height: u32, rng: &mut ChaCha8Rng) -> TransformParams {
        let cfg = &self.config;

        let theta = uniform(rng, cfg.rotation_degrees);
        let tx = uniform(rng, cfg.height_shift) * height as f32;
        let ty = uniform(rng, cfg.width_shift) * width as f32;
        let shear = uniform(rng, cfg.shear_degrees);
        let (zx, zy) = if cfg.zoom_range > 0.0 {
            let range = (1.0 - cfg.zoom_range)..=(1.0 + cfg.zoom_range);
            (rng.gen_range(range.clone()), rng.gen_range(range))
        } else {
            (1.0, 1.0)
        };
        let flip_horizontal = cfg.horizontal_flip && rng.gen::<f32>() < 0.5;

        TransformParams {
            theta,
            tx,
            ty,
            shear,
            zx,
            zy,
            flip_horizontal,
        }
    }

    /// Apply a random augmentation and return CHW data in `[0, 1]`
    pub fn augment(&self, img: &RgbImage, rng: &mut ChaCha8Rng) -> Vec<f32> {
        if self.config.is_identity() {
            return to_chw_tensor_data(img);
        }
        let params = self.random_params(img.width(), img.height(), rng);
        apply_transform(img, &params)
    }

    /// Full preprocessing pipeline: augment (optional), convert to tensor
    ///
    /// `img` must already have the network input size.
    pub fn preprocess(&self, img: &RgbImage, rng: Option<&mut ChaCha8Rng>) -> Vec<f32> {
        match rng {
            Some(rng) => self.augment(img, rng),
            None => to_chw_tensor_data(img),
        }
    }
}

/// Source-sampling matrix in (row, col) space:
/// `rotation * shift * shear * zoom` applied around the image centre.
fn sampling_matrix(width: u32, height: u32, params: &TransformParams) -> Mat3 {
    let theta = params.theta.to_radians();
    let shear = params.shear.to_radians();

    let rotation: Mat3 = [
        [theta.cos(), -theta.sin(), 0.0],
        [theta.sin(), theta.cos(), 0.0],
        [0.0, 0.0, 1.0],
    ];
    let shift: Mat3 = [
        [1.0, 0.0, params.tx],
        [0.0, 1.0, params.ty],
        [0.0, 0.0, 1.0],
    ];
    let shear_m: Mat3 = [
        [1.0, -shear.sin(), 0.0],
        [0.0, shear.cos(), 0.0],
        [0.0, 0.0, 1.0],
    ];
    let zoom: Mat3 = [
        [params.zx, 0.0, 0.0],
        [0.0, params.zy, 0.0],
        [0.0, 0.0, 1.0],
    ];

    let o_r = height as f32 / 2.0 - 0.5;
    let o_c = width as f32 / 2.0 - 0.5;
    let offset: Mat3 = [[1.0, 0.0, o_r], [0.0, 1.0, o_c], [0.0, 0.0, 1.0]];
    let reset: Mat3 = [[1.0, 0.0, -o_r], [0.0, 1.0, -o_c], [0.0, 0.0, 1.0]];

    let transform = mat_mul(&rotation, &mat_mul(&shift, &mat_mul(&shear_m, &zoom)));
    mat_mul(&offset, &mat_mul(&transform, &reset))
}

/// Apply concrete transform parameters to an image.
///
/// Returns CHW data scaled to `[0, 1]`, in the same layout as
/// [`to_chw_tensor_data`]. Interpolated values are kept as floats.
pub fn apply_transform(img: &RgbImage, params: &TransformParams) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let m = sampling_matrix(width, height, params);

    let plane = width as usize * height as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for r in 0..height {
        for c in 0..width {
            let (rf, cf) = (r as f32, c as f32);
            let src_r = m[0][0] * rf + m[0][1] * cf + m[0][2];
            let src_c = m[1][0] * rf + m[1][1] * cf + m[1][2];

            let out_c = if params.flip_horizontal {
                width - 1 - c
            } else {
                c
            };
            let offset = r as usize * width as usize + out_c as usize;
            let rgb = bilinear_sample(img, src_c, src_r);
            for (channel, value) in rgb.iter().enumerate() {
                data[channel * plane + offset] = value / 255.0;
            }
        }
    }

    data
}

/// Sample a pixel using bilinear interpolation, clamping to the nearest edge
fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> [f32; 3] {
    let (width, height) = img.dimensions();
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;

    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut result = [0.0f32; 3];
    for (c, out) in result.iter_mut().enumerate() {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
        *out = v.clamp(0.0, 255.0);
    }

    result
}
