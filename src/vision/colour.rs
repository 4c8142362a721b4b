//! HSV colour segmentation
//!
//! Hue follows the 8-bit convention (degrees halved, 0–179); saturation and
//! value span 0–255. Ranges are inclusive on every channel.

use std::path::Path;
use std::sync::RwLock;

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::VisionError;
use crate::geometry::{Point, Rect};

/// A named HSV interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColourRange {
    pub name: String,
    /// Lower bound `[h, s, v]`
    pub min: [u8; 3],
    /// Upper bound `[h, s, v]`
    pub max: [u8; 3],
}

impl ColourRange {
    pub fn new(name: &str, min: [u8; 3], max: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            min,
            max,
        }
    }

    /// Whether an HSV triple falls inside the range
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.min[i] && hsv[i] <= self.max[i])
    }
}

/// Convert one RGB pixel to 8-bit HSV
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (rgb[0] as i32, rgb[1] as i32, rgb[2] as i32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v == 0 {
        0
    } else {
        (255.0 * diff as f64 / v as f64).round() as i32
    };

    let h = if diff == 0 {
        0
    } else {
        let sector = if v == r {
            (g - b) as f64
        } else if v == g {
            (b - r) as f64 + 2.0 * diff as f64
        } else {
            (r - g) as f64 + 4.0 * diff as f64
        };
        let mut h = (30.0 * sector / diff as f64).round() as i32;
        if h < 0 {
            h += 180;
        }
        if h >= 180 {
            h -= 180;
        }
        h
    };

    [h as u8, s.clamp(0, 255) as u8, v as u8]
}

/// Binary mask: 255 where the pixel's HSV value is inside `range`, else 0
pub fn mask(image: &RgbImage, range: &ColourRange) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let px = image.get_pixel(x, y).0;
        if range.contains(rgb_to_hsv(px)) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Outer borders of the foreground regions, holes ignored
pub fn contours(mask: &GrayImage) -> Vec<Vec<Point>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points.into_iter().map(|p| Point::new(p.x, p.y)).collect())
        .collect()
}

/// A connected region of one colour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedBlob {
    pub id: usize,
    pub contour: Vec<Point>,
    pub bounding_box: Rect,
}

fn bounding_box(contour: &[Point]) -> Rect {
    let min_x = contour.iter().map(|p| p.x).min().unwrap_or(0);
    let max_x = contour.iter().map(|p| p.x).max().unwrap_or(0);
    let min_y = contour.iter().map(|p| p.y).min().unwrap_or(0);
    let max_y = contour.iter().map(|p| p.y).max().unwrap_or(0);
    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

static LAST_OBJECTS: Lazy<RwLock<Vec<DetectedBlob>>> = Lazy::new(|| RwLock::new(Vec::new()));

/// Every blob of `range` in `image`
///
/// The result also replaces the list returned by [`last_objects`].
pub fn objects(image: &RgbImage, range: &ColourRange) -> Vec<DetectedBlob> {
    let blobs: Vec<DetectedBlob> = contours(&mask(image, range))
        .into_iter()
        .enumerate()
        .map(|(id, contour)| DetectedBlob {
            id,
            bounding_box: bounding_box(&contour),
            contour,
        })
        .collect();
    log::debug!("{} '{}' objects found", blobs.len(), range.name);

    match LAST_OBJECTS.write() {
        Ok(mut last) => *last = blobs.clone(),
        Err(poisoned) => *poisoned.into_inner() = blobs.clone(),
    }
    blobs
}

/// Blobs from the most recent [`objects`] call
pub fn last_objects() -> Vec<DetectedBlob> {
    LAST_OBJECTS
        .read()
        .map(|last| last.clone())
        .unwrap_or_else(|e| e.into_inner().clone())
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    let cross = (b.x - a.x) as i64 * (p.y - a.y) as i64 - (b.y - a.y) as i64 * (p.x - a.x) as i64;
    cross == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

/// True only for points strictly inside the closed polyline
///
/// Points on an edge or a vertex are outside.
pub fn point_in_contour(p: Point, contour: &[Point]) -> bool {
    if contour.len() < 3 {
        return false;
    }
    let n = contour.len();
    let mut inside = false;
    for i in 0..n {
        let a = contour[i];
        let b = contour[(i + 1) % n];
        if on_segment(p, a, b) {
            return false;
        }
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x as f64
                + (p.y - a.y) as f64 * (b.x - a.x) as f64 / (b.y - a.y) as f64;
            if (p.x as f64) < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Named colour ranges
#[derive(Debug, Clone)]
pub struct ColourRegistry {
    ranges: Vec<ColourRange>,
}

impl Default for ColourRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ColourRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Built-in ranges for the client's highlight and text colours
    pub fn with_defaults() -> Self {
        Self {
            ranges: vec![
                ColourRange::new("Red", [0, 100, 100], [10, 255, 255]),
                ColourRange::new("Blue", [100, 150, 50], [130, 255, 255]),
                ColourRange::new("White", [0, 0, 200], [179, 30, 255]),
                ColourRange::new("Cyan", [85, 200, 200], [95, 255, 255]),
                ColourRange::new("Green", [59, 254, 254], [60, 255, 255]),
                ColourRange::new("Yellow", [25, 200, 200], [35, 255, 255]),
                ColourRange::new("Purple", [140, 150, 100], [155, 255, 255]),
            ],
        }
    }

    /// Add a range; a name that is already taken keeps its first definition
    pub fn register(&mut self, range: ColourRange) -> bool {
        if self.get(&range.name).is_some() {
            log::warn!("Colour '{}' already registered, ignoring", range.name);
            return false;
        }
        self.ranges.push(range);
        true
    }

    /// Register every range in a JSON array file
    pub fn load_json(&mut self, path: &Path) -> Result<usize, VisionError> {
        let text = std::fs::read_to_string(path).map_err(|source| VisionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ranges: Vec<ColourRange> = serde_json::from_str(&text).map_err(|e| VisionError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        Ok(ranges.into_iter().filter(|r| self.register(r.clone())).count())
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&ColourRange> {
        self.ranges.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ranges.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb};

    fn white_range() -> ColourRange {
        ColourRange::new("White", [0, 0, 200], [179, 30, 255])
    }

    fn paint(image: &mut RgbImage, rect: Rect, colour: Rgb<u8>) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                image.put_pixel(x as u32, y as u32, colour);
            }
        }
    }

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 255]), [90, 255, 255]);
        assert_eq!(rgb_to_hsv([255, 255, 255]), [0, 0, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
    }

    #[test]
    fn test_mask_of_mask_is_identical() {
        let mut image = RgbImage::new(30, 20);
        paint(&mut image, Rect::new(4, 4, 6, 5), Rgb([255, 255, 255]));
        paint(&mut image, Rect::new(15, 10, 3, 3), Rgb([230, 230, 235]));
        paint(&mut image, Rect::new(20, 2, 4, 4), Rgb([200, 10, 10]));

        let range = white_range();
        let first = mask(&image, &range);
        let second = mask(&DynamicImage::ImageLuma8(first.clone()).to_rgb8(), &range);
        assert_eq!(first, second);
        assert_eq!(first.get_pixel(5, 5)[0], 255);
        assert_eq!(first.get_pixel(21, 3)[0], 0);
    }

    #[test]
    fn test_objects_bounding_boxes() {
        let mut image = RgbImage::new(40, 40);
        paint(&mut image, Rect::new(2, 3, 4, 4), Rgb([255, 0, 0]));
        paint(&mut image, Rect::new(20, 25, 10, 6), Rgb([255, 0, 0]));
        paint(&mut image, Rect::new(30, 2, 5, 5), Rgb([0, 0, 255]));

        let red = ColourRegistry::with_defaults().get("red").cloned().unwrap();
        let mut boxes: Vec<Rect> = objects(&image, &red)
            .into_iter()
            .map(|b| b.bounding_box)
            .collect();
        boxes.sort_by_key(|r| (r.y, r.x));
        assert_eq!(boxes, vec![Rect::new(2, 3, 3, 3), Rect::new(20, 25, 9, 5)]);
    }

    #[test]
    fn test_ring_yields_one_outer_contour() {
        let mut image = RgbImage::new(20, 20);
        paint(&mut image, Rect::new(2, 2, 12, 12), Rgb([255, 255, 255]));
        paint(&mut image, Rect::new(5, 5, 6, 6), Rgb([0, 0, 0]));
        let found = contours(&mask(&image, &white_range()));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_point_in_contour_is_strict() {
        let square = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert!(point_in_contour(Point::new(5, 5), &square));
        assert!(point_in_contour(Point::new(1, 9), &square));
        assert!(!point_in_contour(Point::new(0, 5), &square));
        assert!(!point_in_contour(Point::new(10, 10), &square));
        assert!(!point_in_contour(Point::new(5, 0), &square));
        assert!(!point_in_contour(Point::new(11, 5), &square));
        assert!(!point_in_contour(Point::new(5, 5), &square[..2]));
    }

    #[test]
    fn test_registry_lookup_and_json() {
        let mut registry = ColourRegistry::with_defaults();
        assert!(registry.get("Cyan").is_some());
        assert!(registry.get("Magenta").is_none());
        assert!(!registry.register(ColourRange::new("red", [0, 0, 0], [1, 1, 1])));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colours.json");
        std::fs::write(
            &path,
            r#"[{"name":"Magenta","min":[145,200,200],"max":[155,255,255]},
               {"name":"Blue","min":[0,0,0],"max":[1,1,1]}]"#,
        )
        .unwrap();
        assert_eq!(registry.load_json(&path).unwrap(), 1);
        assert_eq!(registry.get("magenta").unwrap().min, [145, 200, 200]);
        assert_eq!(registry.get("Blue").unwrap().min, [100, 150, 50]);
    }
}
