//! Masked template matching
//!
//! Scores every placement of a template over a base image with the
//! normalised squared difference, counting only template pixels whose
//! alpha is fully opaque. Lower scores are better; 0 is an exact match.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use image::{RgbImage, RgbaImage};
use ndarray::Array2;
use rayon::prelude::*;

use super::VisionError;
use crate::geometry::{Point, Rect};

/// Alpha of an opaque pixel, squared; the base is promoted with this alpha
const OPAQUE_SQ: f64 = 255.0 * 255.0;

#[derive(Debug, Clone, Copy)]
struct ActivePixel {
    dx: usize,
    dy: usize,
    rgb: [f64; 3],
}

fn active_pixels(template: &RgbaImage) -> Vec<ActivePixel> {
    template
        .enumerate_pixels()
        .filter(|(_, _, px)| px[3] == 255)
        .map(|(x, y, px)| ActivePixel {
            dx: x as usize,
            dy: y as usize,
            rgb: [px[0] as f64, px[1] as f64, px[2] as f64],
        })
        .collect()
}

/// Score map of `template` over `base`, one entry per top-left placement
pub fn score_map(template: &RgbaImage, base: &RgbImage) -> Result<Array2<f32>, VisionError> {
    let (tw, th) = template.dimensions();
    let (bw, bh) = base.dimensions();
    if tw == 0 || th == 0 || bw == 0 || bh == 0 {
        return Err(VisionError::EmptyImage);
    }
    if tw > bw || th > bh {
        return Err(VisionError::TemplateLargerThanBase {
            template: (tw, th),
            base: (bw, bh),
        });
    }

    let active = active_pixels(template);
    let template_energy: f64 = active
        .iter()
        .map(|p| p.rgb.iter().map(|c| c * c).sum::<f64>() + OPAQUE_SQ)
        .sum();

    let out_w = (bw - tw + 1) as usize;
    let out_h = (bh - th + 1) as usize;
    let stride = bw as usize * 3;
    let raw = base.as_raw();

    let scores: Vec<f32> = (0..out_h)
        .into_par_iter()
        .flat_map_iter(|y| {
            let active = &active;
            (0..out_w).map(move |x| {
                let mut diff = 0.0f64;
                let mut base_energy = 0.0f64;
                for p in active {
                    let at = (y + p.dy) * stride + (x + p.dx) * 3;
                    for c in 0..3 {
                        let i = raw[at + c] as f64;
                        let d = p.rgb[c] - i;
                        diff += d * d;
                        base_energy += i * i;
                    }
                    base_energy += OPAQUE_SQ;
                }
                let denom = (template_energy * base_energy).sqrt();
                if denom > 0.0 {
                    (diff / denom) as f32
                } else {
                    1.0
                }
            })
        })
        .collect();

    Array2::from_shape_vec((out_h, out_w), scores)
        .map_err(|_| VisionError::EmptyImage)
}

/// Lowest score and its (x, y); the first one in row-major order on ties
fn min_location(scores: &Array2<f32>) -> Option<(f32, usize, usize)> {
    let mut best: Option<(f32, usize, usize)> = None;
    for ((y, x), &score) in scores.indexed_iter() {
        let better = match best {
            Some((b, _, _)) => score < b,
            None => true,
        };
        if better {
            best = Some((score, x, y));
        }
    }
    best
}

/// Finds UI elements by masked template matching
#[derive(Debug)]
pub struct TemplateMatcher {
    last_score: AtomicU64,
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateMatcher {
    pub fn new() -> Self {
        Self {
            last_score: AtomicU64::new(f64::INFINITY.to_bits()),
        }
    }

    /// Minimum score of the most recent match attempt
    pub fn last_score(&self) -> f64 {
        f64::from_bits(self.last_score.load(Ordering::SeqCst))
    }

    /// Decode the template at `path` and look for it in `base`
    ///
    /// `origin` is the screen position of the base image's top-left pixel.
    pub fn match_template(
        &self,
        path: &Path,
        base: &RgbImage,
        origin: Point,
        threshold: f64,
        debug: bool,
    ) -> Result<Option<Rect>, VisionError> {
        let template = image::open(path)?.to_rgba8();
        let found = self.match_image(&template, base, origin, threshold)?;
        if debug {
            log::info!(
                "{}: score {:.5} (threshold {}) -> {:?}",
                path.display(),
                self.last_score(),
                threshold,
                found
            );
        }
        Ok(found)
    }

    /// Look for an in-memory template; `None` when the best score exceeds `threshold`
    pub fn match_image(
        &self,
        template: &RgbaImage,
        base: &RgbImage,
        origin: Point,
        threshold: f64,
    ) -> Result<Option<Rect>, VisionError> {
        let scores = score_map(template, base)?;
        let Some((score, x, y)) = min_location(&scores) else {
            return Ok(None);
        };
        let score = score as f64;
        self.last_score.store(score.to_bits(), Ordering::SeqCst);

        if score > threshold {
            log::debug!("Best template score {:.5} above threshold {}", score, threshold);
            return Ok(None);
        }
        let (tw, th) = template.dimensions();
        Ok(Some(Rect::new(
            origin.x + x as i32,
            origin.y + y as i32,
            tw as i32,
            th as i32,
        )))
    }
}
