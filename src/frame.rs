use ndarray::prelude::*;

/// One decoded video frame: BGR pixels in `(height, width, channel)` layout.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: Array3<u8>,
    pub timestamp: f64, // in seconds
}

impl VideoFrame {
    #[inline]
    pub fn new(image: Array3<u8>, timestamp: f64) -> Self {
        Self { image, timestamp }
    }

    /// Uniformly colored frame, handy for synthetic input.
    pub fn filled(width: usize, height: usize, bgr: [u8; 3], timestamp: f64) -> Self {
        let image = Array3::from_shape_fn((height, width, 3), |(_, _, c)| bgr[c]);

        Self { image, timestamp }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.image.dim().1
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.image.dim().0
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    /// Paints the `[x1, x2) x [y1, y2)` region, clipped to the frame.
    #[inline]
    pub fn fill_rect(&mut self, x1: usize, y1: usize, x2: usize, y2: usize, bgr: [u8; 3]) {
        paint_rect(&mut self.image, x1, y1, x2, y2, bgr);
    }
}

/// Paints the `[x1, x2) x [y1, y2)` region of a BGR image, clipped to its bounds.
pub fn paint_rect(image: &mut Array3<u8>, x1: usize, y1: usize, x2: usize, y2: usize, bgr: [u8; 3]) {
    let (h, w, _) = image.dim();
    let (x2, y2) = (x2.min(w), y2.min(h));
    if x1 >= x2 || y1 >= y2 {
        return;
    }

    image
        .slice_mut(s![y1..y2, x1..x2, ..])
        .indexed_iter_mut()
        .for_each(|((_, _, c), v)| *v = bgr[c]);
}
