use serde::Serialize;

/// One detected logo, in pixel coordinates of the submitted image.
///
/// `x_min < x_max <= width` and `y_min < y_max <= height` hold for every
/// detection a predictor returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
    pub confidence: f32,
}

impl Detection {
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }

    /// True when the box is non-empty and lies inside a `width x height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x_min < self.x_max
            && self.y_min < self.y_max
            && self.x_max <= width
            && self.y_max <= height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x_min: u32, y_min: u32, x_max: u32, y_max: u32) -> Detection {
        Detection {
            x_min,
            y_min,
            x_max,
            y_max,
            confidence: 0.8,
        }
    }

    #[test]
    fn fits_within_checks_bounds_and_ordering() {
        assert!(detection(0, 0, 10, 10).fits_within(10, 10));
        assert!(!detection(0, 0, 11, 10).fits_within(10, 10));
        assert!(!detection(5, 0, 5, 10).fits_within(10, 10));
        assert!(!detection(0, 6, 10, 4).fits_within(10, 10));
    }

    #[test]
    fn width_and_height() {
        let d = detection(10, 20, 35, 60);
        assert_eq!(d.width(), 25);
        assert_eq!(d.height(), 40);
    }
}
