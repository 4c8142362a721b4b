//! Click targets inside detected objects

use std::path::Path;

use image::RgbImage;

use crate::geometry::Point;
use crate::input::distribution::generate_random_point;
use crate::vision::colour::{objects, point_in_contour, ColourRange};
use crate::vision::TemplateMatcher;
use crate::Result;

/// Random point inside the best match of a template image
///
/// `origin` is the screen position of `base`'s top-left pixel. `None` when
/// the template is not found under `threshold`.
pub fn random_point_in_image(
    matcher: &TemplateMatcher,
    template: &Path,
    base: &RgbImage,
    origin: Point,
    threshold: f64,
) -> Result<Option<Point>> {
    let found = matcher.match_template(template, base, origin, threshold, false)?;
    Ok(found.map(generate_random_point))
}

/// Random point strictly inside the first blob of `colour`
///
/// Samples the blob's bounding box until a point lands inside its contour.
/// Gives up with `None` after `max_attempts` misses or when there is no blob.
pub fn random_point_in_colour(
    image: &RgbImage,
    colour: &ColourRange,
    origin: Point,
    max_attempts: u32,
) -> Option<Point> {
    let blob = objects(image, colour).into_iter().next()?;
    for _ in 0..max_attempts {
        let p = generate_random_point(blob.bounding_box);
        if point_in_contour(p, &blob.contour) {
            return Some(p.translate(origin.x, origin.y));
        }
    }
    log::debug!(
        "No point inside '{}' blob after {} attempts",
        colour.name,
        max_attempts
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use image::{Rgb, Rgba, RgbaImage};

    fn red_square() -> RgbImage {
        RgbImage::from_fn(60, 60, |x, y| {
            if (20..40).contains(&x) && (20..40).contains(&y) {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    fn red() -> ColourRange {
        ColourRange::new("Red", [0, 100, 100], [10, 255, 255])
    }

    #[test]
    fn test_point_in_colour_lands_inside_blob() {
        let image = red_square();
        let inner = Rect::new(121, 71, 18, 18);
        for _ in 0..20 {
            let p = random_point_in_colour(&image, &red(), Point::new(100, 50), 50).unwrap();
            assert!(inner.contains(p), "{:?} outside the square", p);
        }
    }

    #[test]
    fn test_point_in_colour_without_blob() {
        let image = RgbImage::new(30, 30);
        assert_eq!(random_point_in_colour(&image, &red(), Point::new(0, 0), 10), None);
        assert_eq!(random_point_in_colour(&red_square(), &red(), Point::new(0, 0), 0), None);
    }

    #[test]
    fn test_point_in_image() {
        let base = RgbImage::from_fn(80, 60, crate::testing::noise);
        let template = RgbaImage::from_fn(12, 10, |x, y| {
            let p = base.get_pixel(30 + x, 20 + y);
            Rgba([p[0], p[1], p[2], 255])
        });
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.png");
        template.save(&path).unwrap();

        let matcher = TemplateMatcher::new();
        let p = random_point_in_image(&matcher, &path, &base, Point::new(5, 5), 0.05)
            .unwrap()
            .unwrap();
        assert!(Rect::new(35, 25, 12, 10).contains(p));

        let missing = RgbaImage::from_pixel(12, 10, Rgba([255, 0, 255, 255]));
        missing.save(&path).unwrap();
        assert_eq!(
            random_point_in_image(&matcher, &path, &base, Point::new(5, 5), 0.05).unwrap(),
            None
        );
    }
}
