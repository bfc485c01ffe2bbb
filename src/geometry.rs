//! Integer geometry shared by the overlay, the compositor and the capture pipeline.
//!
//! All coordinates are in pixels. `Rect` edges are half-open: a rectangle at
//! `x` with `width` covers columns `x..x + width`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two corner points, regardless of drag direction.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let left = a.x.min(b.x);
        let top = a.y.min(b.y);
        let right = a.x.max(b.x);
        let bottom = a.y.max(b.y);
        Self {
            x: left,
            y: top,
            width: span(left, right),
            height: span(top, bottom),
        }
    }

    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, point: Point) -> bool {
        let (px, py) = (i64::from(point.x), i64::from(point.y));
        px >= i64::from(self.x) && px < self.right() && py >= i64::from(self.y) && py < self.bottom()
    }

    pub const fn translated(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            width: self.width,
            height: self.height,
        }
    }

    /// Re-expresses the rectangle with `origin` as the new (0, 0).
    pub const fn relative_to(&self, origin: Point) -> Self {
        self.translated(origin.x.saturating_neg(), origin.y.saturating_neg())
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = i64::from(self.x).max(i64::from(other.x));
        let top = i64::from(self.y).max(i64::from(other.y));
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rect {
            x: clamp_i32(left),
            y: clamp_i32(top),
            width: clamp_u32(right - left),
            height: clamp_u32(bottom - top),
        })
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let left = i64::from(self.x).min(i64::from(other.x));
        let top = i64::from(self.y).min(i64::from(other.y));
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect {
            x: clamp_i32(left),
            y: clamp_i32(top),
            width: clamp_u32(right - left),
            height: clamp_u32(bottom - top),
        }
    }
}

/// Smallest rectangle containing every non-empty input; empty input yields a zero rect.
pub fn bounding_rect<I>(rects: I) -> Rect
where
    I: IntoIterator<Item = Rect>,
{
    rects
        .into_iter()
        .fold(Rect::default(), |acc, rect| acc.union(&rect))
}

fn span(low: i32, high: i32) -> u32 {
    clamp_u32(i64::from(high) - i64::from(low))
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_corners_normalizes_any_drag_direction() {
        let expected = Rect::new(100, 100, 300, 200);
        assert_eq!(
            Rect::from_corners(Point::new(400, 300), Point::new(100, 100)),
            expected
        );
        assert_eq!(
            Rect::from_corners(Point::new(100, 300), Point::new(400, 100)),
            expected
        );
        assert_eq!(
            Rect::from_corners(Point::new(100, 100), Point::new(400, 300)),
            expected
        );
    }

    #[test]
    fn relative_to_negative_origin_shifts_right() {
        let rect = Rect::new(100, 100, 300, 200).relative_to(Point::new(-500, 0));
        assert_eq!(rect, Rect::new(600, 100, 300, 200));
    }

    #[test]
    fn intersect_clips_to_overlap() {
        let image = Rect::new(0, 0, 100, 80);
        let selection = Rect::new(60, -20, 100, 50);
        assert_eq!(selection.intersect(&image), Some(Rect::new(60, 0, 40, 30)));
    }

    #[test]
    fn intersect_returns_none_for_disjoint_or_touching_rects() {
        let image = Rect::new(0, 0, 100, 80);
        assert_eq!(Rect::new(100, 0, 10, 10).intersect(&image), None);
        assert_eq!(Rect::new(-50, -50, 20, 20).intersect(&image), None);
    }

    #[test]
    fn bounding_rect_spans_side_by_side_monitors() {
        let bounds = bounding_rect([
            Rect::new(0, 0, 1920, 1080),
            Rect::new(1920, 0, 1280, 1024),
        ]);
        assert_eq!(bounds, Rect::new(0, 0, 3200, 1080));
    }

    #[test]
    fn bounding_rect_keeps_negative_origin() {
        let bounds = bounding_rect([
            Rect::new(-1280, 200, 1280, 1024),
            Rect::new(0, 0, 1920, 1080),
        ]);
        assert_eq!(bounds, Rect::new(-1280, 0, 3200, 1224));
    }

    #[test]
    fn bounding_rect_of_nothing_is_empty() {
        let bounds = bounding_rect(std::iter::empty());
        assert!(bounds.is_empty());
        assert_eq!(bounds, Rect::default());
    }

    #[test]
    fn contains_uses_half_open_edges() {
        let rect = Rect::new(12, 12, 32, 32);
        assert!(rect.contains(Point::new(12, 12)));
        assert!(rect.contains(Point::new(43, 43)));
        assert!(!rect.contains(Point::new(44, 20)));
        assert!(!rect.contains(Point::new(11, 20)));
    }
}
