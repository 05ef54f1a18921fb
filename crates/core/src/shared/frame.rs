use ndarray::ArrayView3;

use super::bounding_box::BoundingBox;

/// A decoded image submitted for analysis: contiguous RGB bytes, row-major.
///
/// Decoding happens at the I/O boundary; analyzers see only pixels.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Samples `bbox` into a `size` x `size` RGB patch (nearest neighbour).
    ///
    /// Pixels outside the frame are left black so a face near an edge
    /// keeps its aspect ratio.
    pub fn sample_square(&self, bbox: &BoundingBox, size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size * size * 3];
        if self.is_empty() || size == 0 {
            return out;
        }
        let src = self.as_ndarray();
        let channels = (self.channels as usize).min(3);
        let step_x = bbox.width / size as f64;
        let step_y = bbox.height / size as f64;

        for y in 0..size {
            let sy = (bbox.y + (y as f64 + 0.5) * step_y).floor();
            if sy < 0.0 || sy >= self.height as f64 {
                continue;
            }
            for x in 0..size {
                let sx = (bbox.x + (x as f64 + 0.5) * step_x).floor();
                if sx < 0.0 || sx >= self.width as f64 {
                    continue;
                }
                let offset = (y * size + x) * 3;
                for c in 0..channels {
                    out[offset + c] = src[[sy as usize, sx as usize, c]];
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.data(), &data[..]);
        assert!(!frame.is_empty());
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3);
    }

    #[test]
    fn test_as_ndarray_shape_is_hwc() {
        let frame = Frame::new(vec![0u8; 24], 4, 2, 3);
        assert_eq!(frame.as_ndarray().shape(), &[2, 4, 3]);
    }

    #[test]
    fn test_sample_square_copies_pixels() {
        // 2x2 image, top-left pixel red
        let mut data = vec![0u8; 12];
        data[0] = 255;
        let frame = Frame::new(data, 2, 2, 3);

        let patch = frame.sample_square(&BoundingBox::new(0.0, 0.0, 2.0, 2.0), 2);

        assert_eq!(patch.len(), 12);
        assert_eq!(&patch[0..3], &[255, 0, 0]);
        assert_eq!(&patch[3..6], &[0, 0, 0]);
    }

    #[test]
    fn test_sample_square_outside_frame_is_black() {
        let frame = Frame::new(vec![200u8; 12], 2, 2, 3);
        let patch = frame.sample_square(&BoundingBox::new(-10.0, -10.0, 4.0, 4.0), 4);
        assert!(patch.iter().all(|&p| p == 0));
    }
}
