//! Burn inference backend for person detection.
//!
//! `BurnDetector` runs a detection model built with the Burn framework on
//! every frame and hands its boxes to the pipeline as [`RawDetection`]s in
//! frame coordinates.
//!
//! # Example
//!
//! ```ignore
//! use headcount_rs::integration::{BurnDetector, BurnModel};
//! use burn::backend::NdArray;
//!
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<RawDetection> {
//!         // Run inference
//!     }
//! }
//!
//! let model = MyYoloModel::load("model.bin");
//! let detector = BurnDetector::new(model, Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use image::imageops::{self, FilterType};
use thiserror::Error;

use crate::integration::{DetectionSource, RawDetection};
use crate::media::Frame;

/// Error type for Burn detection failures.
#[derive(Debug, Clone, Error)]
pub enum BurnDetectorError {
    #[error("invalid model input size {width}x{height}x{channels}")]
    InvalidInputSize {
        channels: u32,
        height: u32,
        width: u32,
    },

    #[error("empty frame")]
    EmptyFrame,

    #[error("inference error: {0}")]
    Inference(String),
}

/// Trait for Burn-based detection models.
///
/// Implement this trait for your specific model architecture.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Run forward pass on the input tensor.
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape [batch, channels, height, width]
    ///
    /// # Returns
    /// Boxes in model input pixels, all classes, after NMS.
    fn forward(&self, input: Tensor<B, 4>) -> Result<Vec<RawDetection>, BurnDetectorError>;

    /// Get the expected input size (channels, height, width).
    fn input_size(&self) -> (u32, u32, u32) {
        (3, 640, 640) // Default YOLO input size
    }

    /// Whether bbox output is in XYWH format (vs TLBR).
    fn bbox_is_xywh(&self) -> bool {
        true // Most YOLO variants use XYWH
    }
}

/// Burn-based object detector implementing `DetectionSource`.
pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Resize `frame` to the model input and lay it out as `[1, C, H, W]`
    /// floats in `[0, 1]`.
    pub fn preprocess(&self, frame: &Frame) -> Result<Tensor<B, 4>, BurnDetectorError> {
        let (channels, target_h, target_w) = self.model.input_size();
        if channels != 3 || target_h == 0 || target_w == 0 {
            return Err(BurnDetectorError::InvalidInputSize {
                channels,
                height: target_h,
                width: target_w,
            });
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(BurnDetectorError::EmptyFrame);
        }

        let resized = if frame.dimensions() == (target_w, target_h) {
            frame.clone()
        } else {
            imageops::resize(frame, target_w, target_h, FilterType::Triangle)
        };

        let plane = (target_w * target_h) as usize;
        let mut data = vec![0f32; plane * 3];
        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = pixel.0[c] as f32 / 255.0;
            }
        }

        let tensor = Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([
            1,
            channels as usize,
            target_h as usize,
            target_w as usize,
        ]);
        Ok(tensor)
    }

    /// Map model boxes back to frame pixels as corner pairs.
    fn postprocess(&self, raw: Vec<RawDetection>, frame: &Frame) -> Vec<RawDetection> {
        let (_, target_h, target_w) = self.model.input_size();
        let sx = frame.width() as f32 / target_w as f32;
        let sy = frame.height() as f32 / target_h as f32;
        let xywh = self.model.bbox_is_xywh();

        raw.into_iter()
            .map(|d| {
                let [a, b, c, e] = d.bbox;
                let [x1, y1, x2, y2] = if xywh {
                    [a - c / 2.0, b - e / 2.0, a + c / 2.0, b + e / 2.0]
                } else {
                    [a, b, c, e]
                };
                RawDetection::new([x1 * sx, y1 * sy, x2 * sx, y2 * sy], d.score, d.class_id)
            })
            .collect()
    }
}

impl<B: Backend, M: BurnModel<B>> DetectionSource for BurnDetector<B, M> {
    type Error = BurnDetectorError;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, Self::Error> {
        let tensor = self.preprocess(frame)?;
        let raw = self.model.forward(tensor)?;
        Ok(self.postprocess(raw, frame))
    }
}
