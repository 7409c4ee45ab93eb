//! Image and detection value types shared across the stack.

/// Packed 8-bit RGB image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    /// Wrap an RGB buffer. Returns `None` when the buffer length does not
    /// match `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(Self::CHANNELS)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Solid-colour frame, mostly for simulation and tests.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let n = width as usize * height as usize;
        let mut data = Vec::with_capacity(n * Self::CHANNELS);
        for _ in 0..n {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Copy out the region covered by `bbox`, clipped to the frame.
    /// A box entirely outside the frame yields an empty (0x0) frame.
    pub fn crop(&self, bbox: &BoundingBox) -> Frame {
        let x1 = bbox.x1.min(self.width);
        let x2 = bbox.x2.min(self.width);
        let y1 = bbox.y1.min(self.height);
        let y2 = bbox.y2.min(self.height);
        let w = x2.saturating_sub(x1);
        let h = y2.saturating_sub(y1);
        let row_len = w as usize * Self::CHANNELS;
        let mut data = Vec::with_capacity(row_len * h as usize);
        for y in y1..y2 {
            let start = (y as usize * self.width as usize + x1 as usize) * Self::CHANNELS;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Frame {
            width: w,
            height: h,
            data,
        }
    }
}

/// Axis-aligned pixel box, `x1 < x2` and `y1 < y2` once constructed through
/// [`BoundingBox::clamped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Clamp raw model coordinates into a `width` x `height` image.
    /// Returns `None` for boxes that are degenerate after clamping.
    pub fn clamped(x1: i64, y1: i64, x2: i64, y2: i64, width: u32, height: u32) -> Option<Self> {
        let cx = |v: i64| v.clamp(0, i64::from(width)) as u32;
        let cy = |v: i64| v.clamp(0, i64::from(height)) as u32;
        let b = Self::new(cx(x1), cy(y1), cx(x2), cy(y2));
        b.is_valid().then_some(b)
    }

    pub fn is_valid(&self) -> bool {
        self.x2 > self.x1 && self.y2 > self.y1
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x2 <= width && self.y2 <= height
    }
}

/// One detector candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub bbox: BoundingBox,
    /// Confidence in `[0, 1]`.
    pub score: f32,
}

impl Detection {
    pub const fn new(class_id: u32, bbox: BoundingBox, score: f32) -> Self {
        Self {
            class_id,
            bbox,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_rejects_wrong_length() {
        assert!(Frame::from_rgb(2, 2, vec![0; 11]).is_none());
        assert!(Frame::from_rgb(2, 2, vec![0; 12]).is_some());
    }

    #[test]
    fn crop_copies_region() {
        let mut data = Vec::new();
        for y in 0..4u8 {
            for x in 0..4u8 {
                data.extend_from_slice(&[x, y, 0]);
            }
        }
        let frame = Frame::from_rgb(4, 4, data).unwrap();
        let crop = frame.crop(&BoundingBox::new(1, 2, 3, 4));
        assert_eq!((crop.width(), crop.height()), (2, 2));
        assert_eq!(crop.pixel(0, 0), Some([1, 2, 0]));
        assert_eq!(crop.pixel(1, 1), Some([2, 3, 0]));
    }

    #[test]
    fn crop_outside_frame_is_empty() {
        let frame = Frame::filled(10, 10, [0, 0, 0]);
        assert!(frame.crop(&BoundingBox::new(20, 20, 30, 30)).is_empty());
    }

    #[test]
    fn clamped_drops_degenerate_boxes() {
        assert_eq!(
            BoundingBox::clamped(-5, -5, 50, 40, 32, 32),
            Some(BoundingBox::new(0, 0, 32, 32))
        );
        assert_eq!(BoundingBox::clamped(40, 0, 60, 10, 32, 32), None);
        assert_eq!(BoundingBox::clamped(5, 5, 5, 9, 32, 32), None);
    }
}
