//! Utility functions shared across pipeline stages.

pub mod mat_ops;
pub mod safe_cast;

use opencv::core::{Point, Rect};

/// Bounding rectangle of a point set, expanded by `pad` pixels and clamped to
/// the frame. Returns `None` for fewer than 3 points or a degenerate box.
#[must_use]
pub fn padded_rect(points: &[Point], pad: i32, frame_width: i32, frame_height: i32) -> Option<Rect> {
    if points.len() < 3 {
        return None;
    }

    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let x = (min_x - pad).max(0);
    let y = (min_y - pad).max(0);
    let w = (max_x + pad).min(frame_width - 1) - x + 1;
    let h = (max_y + pad).min(frame_height - 1) - y + 1;

    if w < 2 || h < 2 {
        return None;
    }

    Some(Rect::new(x, y, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_rect_basic() {
        let points = vec![Point::new(10, 10), Point::new(30, 10), Point::new(20, 40)];
        let rect = padded_rect(&points, 5, 100, 100).unwrap();

        assert_eq!(rect.x, 5);
        assert_eq!(rect.y, 5);
        assert_eq!(rect.width, 31);
        assert_eq!(rect.height, 41);
    }

    #[test]
    fn test_padded_rect_clamps_to_frame() {
        let points = vec![Point::new(2, 2), Point::new(98, 2), Point::new(50, 98)];
        let rect = padded_rect(&points, 10, 100, 100).unwrap();

        assert_eq!(rect.x, 0);
        assert_eq!(rect.y, 0);
        assert!(rect.x + rect.width <= 100);
        assert!(rect.y + rect.height <= 100);
    }

    #[test]
    fn test_padded_rect_too_few_points() {
        let points = vec![Point::new(10, 10), Point::new(20, 20)];
        assert!(padded_rect(&points, 5, 100, 100).is_none());
    }

    #[test]
    fn test_padded_rect_degenerate() {
        let points = vec![Point::new(10, 10); 5];
        assert!(padded_rect(&points, 0, 100, 100).is_none());
    }
}
