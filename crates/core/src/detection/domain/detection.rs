/// One model output in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    /// Clamps the box to `[0, width] x [0, height]`.
    ///
    /// Returns `None` when nothing of the box remains inside the frame, so
    /// every detection handed on satisfies `x1 < x2` and `y1 < y2`.
    pub fn clamped(mut self, width: u32, height: u32) -> Option<Self> {
        let w = width as f32;
        let h = height as f32;
        self.x1 = self.x1.clamp(0.0, w);
        self.x2 = self.x2.clamp(0.0, w);
        self.y1 = self.y1.clamp(0.0, h);
        self.y2 = self.y2.clamp(0.0, h);
        self.confidence = self.confidence.clamp(0.0, 1.0);
        if self.x1 < self.x2 && self.y1 < self.y2 {
            Some(self)
        } else {
            None
        }
    }

    /// Text drawn above the box, e.g. `"cat 0.91"`.
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.label, self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            x1,
            y1,
            x2,
            y2,
            class_id: 0,
            label: "cat".into(),
            confidence: 0.5,
        }
    }

    #[test]
    fn test_clamped_inside_is_unchanged() {
        let d = det(1.0, 2.0, 10.0, 20.0);
        assert_eq!(d.clone().clamped(50, 50), Some(d));
    }

    #[test]
    fn test_clamped_trims_to_frame() {
        let d = det(-5.0, -3.0, 60.0, 70.0).clamped(50, 40).unwrap();
        assert_relative_eq!(d.x1, 0.0);
        assert_relative_eq!(d.y1, 0.0);
        assert_relative_eq!(d.x2, 50.0);
        assert_relative_eq!(d.y2, 40.0);
    }

    #[rstest]
    #[case::fully_left(det(-20.0, 0.0, -5.0, 10.0))]
    #[case::fully_below(det(0.0, 60.0, 10.0, 80.0))]
    #[case::zero_width(det(5.0, 5.0, 5.0, 10.0))]
    #[case::inverted(det(10.0, 10.0, 5.0, 5.0))]
    fn test_clamped_drops_degenerate_boxes(#[case] d: Detection) {
        assert!(d.clamped(50, 50).is_none());
    }

    #[test]
    fn test_clamped_bounds_confidence() {
        let mut d = det(0.0, 0.0, 10.0, 10.0);
        d.confidence = 1.7;
        assert_relative_eq!(d.clamped(50, 50).unwrap().confidence, 1.0);
    }

    #[rstest]
    #[case(0.91, "cat 0.91")]
    #[case(0.424, "cat 0.42")]
    #[case(1.0, "cat 1.00")]
    #[case(0.0, "cat 0.00")]
    fn test_caption_uses_two_decimals(#[case] confidence: f32, #[case] expected: &str) {
        let mut d = det(0.0, 0.0, 1.0, 1.0);
        d.confidence = confidence;
        assert_eq!(d.caption(), expected);
    }
}
