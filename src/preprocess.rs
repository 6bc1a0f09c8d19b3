//! Image preprocessing for ImageNet-style classifiers: resize, planar layout,
//! per-channel normalization and a leading batch axis.

use crate::decode::{ChannelOrder, PixelGrid};
use crate::error::{PredictError, Result};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};
use ndarray::{Array3, Array4, Axis};

/// Side length the classifier was trained on
pub const DEFAULT_SIZE: u32 = 224;

/// ImageNet channel means, in R,G,B order
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations, in R,G,B order
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A `[1, 3, size, size]` batch of one image, `f32`, planar
pub type Tensor = Array4<f32>;

/// Per-colour normalization constants. Both arrays are indexed R,G,B; they are
/// matched to grid channels through the grid's `ChannelOrder`, never by raw
/// channel position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalization {
    pub const IMAGENET: Normalization = Normalization {
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    };

    /// `(x / 255 - mean) / std` on each plane of a `[3, h, w]` array
    pub fn normalize(&self, planes: &mut Array3<f32>, order: ChannelOrder) {
        for (channel, mut plane) in planes.axis_iter_mut(Axis(0)).enumerate() {
            let colour = order.rgb_index(channel);
            let (mean, std) = (self.mean[colour], self.std[colour]);
            plane.mapv_inplace(|v| (v / 255.0 - mean) / std);
        }
    }

    /// Inverse of `normalize` over a batched tensor, back to the 0..=255 scale
    pub fn denormalize(&self, tensor: &Tensor, order: ChannelOrder) -> Tensor {
        let mut out = tensor.clone();
        for (channel, mut plane) in out.axis_iter_mut(Axis(1)).enumerate() {
            let colour = order.rgb_index(channel);
            let (mean, std) = (self.mean[colour], self.std[colour]);
            plane.mapv_inplace(|v| (v * std + mean) * 255.0);
        }
        out
    }
}

impl Default for Normalization {
    fn default() -> Self {
        Normalization::IMAGENET
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    size: u32,
    filter: FilterType,
    normalization: Normalization,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Preprocessor::new(DEFAULT_SIZE)
    }
}

impl Preprocessor {
    /// Bilinear (`Triangle`) resampling to a `size` x `size` square with
    /// ImageNet normalization
    pub fn new(size: u32) -> Self {
        Preprocessor {
            size,
            filter: FilterType::Triangle,
            normalization: Normalization::IMAGENET,
        }
    }

    pub fn normalization(&self) -> &Normalization {
        &self.normalization
    }

    /// Shape every tensor from this preprocessor has
    pub fn tensor_shape(&self) -> [usize; 4] {
        let side = self.size as usize;
        [1, 3, side, side]
    }

    /// Resize, cast, transpose, normalize and batch
    pub fn run(&self, grid: &PixelGrid) -> Result<Tensor> {
        let resized = self.resize(grid)?;
        Ok(self.to_tensor(&resized))
    }

    /// Stretch the grid to `size` x `size`. Aspect ratio is not preserved.
    pub fn resize(&self, grid: &PixelGrid) -> Result<PixelGrid> {
        if grid.channels() != 3 {
            return Err(PredictError::Shape {
                expected: "[height, width, 3]",
                actual: grid.shape().to_vec(),
            });
        }

        let raw = grid.as_array().as_standard_layout().into_owned().into_raw_vec();
        let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_raw(grid.width() as u32, grid.height() as u32, raw).ok_or_else(|| {
                PredictError::Shape {
                    expected: "[height, width, 3]",
                    actual: grid.shape().to_vec(),
                }
            })?;

        // Channels are resampled independently so the grid's order survives
        let resized = imageops::resize(&buffer, self.size, self.size, self.filter);
        let side = self.size as usize;
        let data = Array3::from_shape_vec((side, side, 3), resized.into_raw()).map_err(|_| {
            PredictError::Shape {
                expected: "[size, size, 3]",
                actual: vec![side, side, 3],
            }
        })?;
        Ok(PixelGrid::from_array(data, grid.order()))
    }

    /// Planar, normalized, batched tensor from an already resized grid
    pub fn to_tensor(&self, grid: &PixelGrid) -> Tensor {
        let pixels = grid.as_array();
        let mut planes = pixels.mapv(f32::from).permuted_axes([2, 0, 1]);
        planes = planes.as_standard_layout().into_owned();
        self.normalization.normalize(&mut planes, grid.order());
        planes.insert_axis(Axis(0))
    }
}
