//! Click point sampling
//!
//! Points are drawn from an axis-aligned Gaussian centred on the target
//! rectangle so clicks cluster in the middle of a button but still spread.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::InputError;
use crate::geometry::{Point, Rect};

/// Rectangles narrower or shorter than this always yield their centre
const MIN_SAMPLING_SIDE: i32 = 5;

/// Tightness picked from the side length when the caller gives none
pub fn adaptive_tightness(side: i32) -> f64 {
    match side {
        s if s >= 50 => 4.0,
        s if s >= 25 => 7.0,
        s if s >= 15 => 8.0,
        _ => 9.0,
    }
}

/// Sample with per-axis adaptive tightness
pub fn generate_random_point(rect: Rect) -> Point {
    let mut rng = rand::thread_rng();
    sample(
        &mut rng,
        rect,
        adaptive_tightness(rect.width),
        adaptive_tightness(rect.height),
    )
}

/// Sample with a fixed tightness on both axes; it must be positive
pub fn generate_random_point_with(rect: Rect, tightness: f64) -> Result<Point, InputError> {
    if tightness.is_nan() || tightness <= 0.0 {
        return Err(InputError::InvalidArgument(format!(
            "tightness must be positive, got {}",
            tightness
        )));
    }
    let mut rng = rand::thread_rng();
    Ok(sample(&mut rng, rect, tightness, tightness))
}

fn sample<R: Rng>(rng: &mut R, rect: Rect, tight_x: f64, tight_y: f64) -> Point {
    if rect.width < MIN_SAMPLING_SIDE || rect.height < MIN_SAMPLING_SIDE {
        return rect.center();
    }

    let mean_x = rect.x as f64 + rect.width as f64 / 2.0;
    let mean_y = rect.y as f64 + rect.height as f64 / 2.0;
    let (Ok(along_x), Ok(along_y)) = (
        Normal::new(mean_x, rect.width as f64 / tight_x),
        Normal::new(mean_y, rect.height as f64 / tight_y),
    ) else {
        return rect.center();
    };

    loop {
        let candidate = Point::new(
            along_x.sample(rng).round() as i32,
            along_y.sample(rng).round() as i32,
        );
        if rect.contains(candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_rect_returns_centre() {
        let rect = Rect::new(10, 20, 4, 4);
        for _ in 0..20 {
            assert_eq!(generate_random_point(rect), Point::new(12, 22));
        }
    }

    #[test]
    fn test_five_by_five_is_sampled_inside() {
        let rect = Rect::new(0, 0, 5, 5);
        for _ in 0..500 {
            assert!(rect.contains(generate_random_point(rect)));
        }
    }

    #[test]
    fn test_zero_tightness_rejected() {
        let rect = Rect::new(0, 0, 40, 40);
        assert!(matches!(
            generate_random_point_with(rect, 0.0),
            Err(InputError::InvalidArgument(_))
        ));
        assert!(generate_random_point_with(rect, -2.0).is_err());
        assert!(generate_random_point_with(rect, f64::NAN).is_err());
    }

    #[test]
    fn test_points_concentrate_near_centre() {
        let rect = Rect::new(100, 200, 40, 30);
        let centre_x = rect.x as f64 + rect.width as f64 / 2.0;
        let centre_y = rect.y as f64 + rect.height as f64 / 2.0;
        let limit = rect.width.min(rect.height) as f64 / 2.0;

        let draws = 10_000;
        let mut near = 0;
        for _ in 0..draws {
            let p = generate_random_point(rect);
            assert!(rect.contains(p));
            let distance = (p.x as f64 - centre_x).hypot(p.y as f64 - centre_y);
            if distance <= limit {
                near += 1;
            }
        }
        assert!(near as f64 >= draws as f64 * 0.95, "only {} near centre", near);
    }

    #[test]
    fn test_explicit_tightness_inside() {
        let rect = Rect::new(-30, -30, 60, 12);
        for _ in 0..500 {
            let p = generate_random_point_with(rect, 2.5).unwrap();
            assert!(rect.contains(p));
        }
    }
}
