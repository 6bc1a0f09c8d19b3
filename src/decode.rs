//! Turns the base64 text of a request into a pixel grid

use crate::error::{DecodeError, PredictError, Result};
use base64::{engine::general_purpose, Engine as _};
use image::RgbImage;
use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

/// The order in which colour channels are laid out along the last axis of a
/// `PixelGrid`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// Red, green, blue. What the `image` crate decodes to.
    #[default]
    Rgb,

    /// Blue, green, red. The OpenCV convention.
    Bgr,
}

impl ChannelOrder {
    /// Position in R,G,B order of the colour stored at `channel`
    pub fn rgb_index(self, channel: usize) -> usize {
        match self {
            ChannelOrder::Rgb => channel,
            ChannelOrder::Bgr => 2 - channel,
        }
    }
}

/// An interleaved `[height, width, channel]` grid of 8-bit pixels
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    data: Array3<u8>,
    order: ChannelOrder,
}

impl PixelGrid {
    /// Wrap an already laid out `[height, width, channel]` array. The channel
    /// count is not checked here; the preprocessor rejects anything but 3.
    pub fn from_array(data: Array3<u8>, order: ChannelOrder) -> Self {
        PixelGrid { data, order }
    }

    /// Take ownership of a decoded RGB image, reordering channels if needed
    pub fn from_rgb(image: RgbImage, order: ChannelOrder) -> Result<Self> {
        let (width, height) = image.dimensions();
        let shape = (height as usize, width as usize, 3);
        let mut data = Array3::from_shape_vec(shape, image.into_raw()).map_err(|_| {
            PredictError::Shape {
                expected: "[height, width, 3]",
                actual: vec![shape.0, shape.1, 3],
            }
        })?;
        if order == ChannelOrder::Bgr {
            data.invert_axis(Axis(2));
            data = data.as_standard_layout().into_owned();
        }
        Ok(PixelGrid { data, order })
    }

    pub fn height(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn channels(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn as_array(&self) -> &Array3<u8> {
        &self.data
    }
}

/// Decode standard (padded) base64. ASCII whitespace such as the line breaks
/// MIME encoders insert every 76 characters is ignored.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(DecodeError::from)?;
    Ok(bytes)
}

/// Decode any container the `image` crate recognizes into a 3-channel grid.
/// Alpha is dropped and grayscale is expanded.
pub fn decode_image(bytes: &[u8], order: ChannelOrder) -> Result<PixelGrid> {
    let image = image::load_from_memory(bytes).map_err(DecodeError::from)?;
    PixelGrid::from_rgb(image.to_rgb8(), order)
}

/// Base64 text straight to pixels
pub fn decode(payload: &str, order: ChannelOrder) -> Result<PixelGrid> {
    let bytes = decode_base64(payload)?;
    decode_image(&bytes, order)
}
