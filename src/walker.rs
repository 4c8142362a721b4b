//! World navigation helpers
//!
//! Reads the player's tile from the world-location overlay, estimates the
//! camera heading from the minimap compass and asks a [`PathService`] for
//! routes.

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbImage;
use ndarray::Array2;
use once_cell::sync::OnceCell;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::settings::AssetSettings;
use crate::geometry::Point;
use crate::input::distribution::generate_random_point;
use crate::input::motion::Speed;
use crate::input::mouse::VirtualMouse;
use crate::runtime::interrupt::InterruptToken;
use crate::vision::capture::FrameGrabber;
use crate::vision::colour::ColourRange;
use crate::vision::ocr::GlyphOcr;
use crate::vision::VisionError;
use crate::zones::ZoneMapper;
use crate::{Error, Result};

/// Font of the world-location overlay
const TILE_FONT: &str = "Plain 12";

const CARDINALS: [u32; 4] = [0, 90, 180, 270];

/// A world tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub plane: i32,
}

impl Tile {
    pub const fn new(x: i32, y: i32, plane: i32) -> Self {
        Self { x, y, plane }
    }
}

/// Parse overlay text of the form `x,y,plane`
pub fn parse_tile(text: &str) -> Option<Tile> {
    let mut parts = text.split(',').map(|p| p.trim().parse::<i32>());
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let plane = match parts.next() {
        Some(p) => p.ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(Tile::new(x, y, plane))
}

/// Route planning between two tiles
pub trait PathService: Send + Sync {
    fn generate_path(&self, start: Tile, end: Tile, members: bool) -> Result<Vec<Tile>>;
}

/// Used when no route planner is configured
#[derive(Debug, Default)]
pub struct NoPathService;

impl PathService for NoPathService {
    fn generate_path(&self, start: Tile, end: Tile, _members: bool) -> Result<Vec<Tile>> {
        Err(Error::PathUnavailable(format!(
            "no path service configured for {:?} -> {:?}",
            start, end
        )))
    }
}

const SSIM_C1: f64 = 6.5025;
const SSIM_C2: f64 = 58.5225;

fn gaussian_kernel() -> [f64; 11] {
    let sigma = 1.5f64;
    let mut kernel = [0.0; 11];
    for (i, k) in kernel.iter_mut().enumerate() {
        let d = i as f64 - 5.0;
        *k = (-(d * d) / (2.0 * sigma * sigma)).exp();
    }
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Separable 11-tap Gaussian, edges replicated
fn blur(a: &Array2<f64>) -> Array2<f64> {
    let kernel = gaussian_kernel();
    let (h, w) = a.dim();
    let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;

    let mut rows = Array2::<f64>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            rows[[y, x]] = kernel
                .iter()
                .enumerate()
                .map(|(i, k)| k * a[[y, clamp(x as isize + i as isize - 5, w)]])
                .sum();
        }
    }
    let mut out = Array2::<f64>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            out[[y, x]] = kernel
                .iter()
                .enumerate()
                .map(|(i, k)| k * rows[[clamp(y as isize + i as isize - 5, h), x]])
                .sum();
        }
    }
    out
}

fn channel_ssim(x: &Array2<f64>, y: &Array2<f64>) -> f64 {
    let mu_x = blur(x);
    let mu_y = blur(y);
    let mu_xx = &mu_x * &mu_x;
    let mu_yy = &mu_y * &mu_y;
    let mu_xy = &mu_x * &mu_y;
    let sigma_xx = blur(&(x * x)) - &mu_xx;
    let sigma_yy = blur(&(y * y)) - &mu_yy;
    let sigma_xy = blur(&(x * y)) - &mu_xy;

    let num = (mu_xy * 2.0 + SSIM_C1) * (sigma_xy * 2.0 + SSIM_C2);
    let den = (mu_xx + mu_yy + SSIM_C1) * (sigma_xx + sigma_yy + SSIM_C2);
    (num / den).mean().unwrap_or(0.0)
}

/// Mean structural similarity over the RGB channels
///
/// Images of different sizes are compared over their common top-left area.
pub fn ssim(a: &RgbImage, b: &RgbImage) -> f64 {
    let w = a.width().min(b.width()) as usize;
    let h = a.height().min(b.height()) as usize;
    if w == 0 || h == 0 {
        return 0.0;
    }
    let plane = |img: &RgbImage, c: usize| {
        Array2::from_shape_fn((h, w), |(y, x)| img.get_pixel(x as u32, y as u32)[c] as f64)
    };
    (0..3)
        .map(|c| channel_ssim(&plane(a, c), &plane(b, c)))
        .sum::<f64>()
        / 3.0
}

/// Heading with the best similarity; cardinal headings win ties
pub fn best_heading(similarities: &[(u32, f64)]) -> Option<u32> {
    let mut best: Option<(u32, f64)> = None;
    for &(angle, score) in similarities {
        let better = match best {
            Some((_, b)) => score > b,
            None => true,
        };
        if better {
            best = Some((angle, score));
        }
    }
    let (angle, max) = best?;
    CARDINALS
        .iter()
        .find(|c| similarities.iter().any(|&(a, s)| a == **c && s == max))
        .copied()
        .or(Some(angle))
}

/// Navigation helpers bound to a running controller
pub struct Walker {
    ocr: Arc<GlyphOcr>,
    zones: Arc<ZoneMapper>,
    grabber: Arc<FrameGrabber>,
    mouse: Arc<VirtualMouse>,
    text_colour: ColourRange,
    compass_dir: PathBuf,
    compass: OnceCell<Vec<(u32, RgbImage)>>,
    paths: Arc<dyn PathService>,
    interrupt: InterruptToken,
}

impl Walker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ocr: Arc<GlyphOcr>,
        zones: Arc<ZoneMapper>,
        grabber: Arc<FrameGrabber>,
        mouse: Arc<VirtualMouse>,
        text_colour: ColourRange,
        assets: &AssetSettings,
        paths: Arc<dyn PathService>,
        interrupt: InterruptToken,
    ) -> Self {
        let variant = if zones.is_fixed() {
            "fixed_classic"
        } else {
            "resizable_classic"
        };
        Self {
            ocr,
            compass_dir: assets.ui_image("compass_degrees").join(variant),
            zones,
            grabber,
            mouse,
            text_colour,
            compass: OnceCell::new(),
            paths,
            interrupt,
        }
    }

    /// Tile the player stands on, read from the overlay
    pub fn current_tile(&self) -> Result<Tile> {
        let zone = self
            .zones
            .map()
            .grid_info("Tile")
            .ok_or_else(|| Error::ZoneUnavailable("Tile".into()))?;
        let text = self.ocr.extract_text(zone, TILE_FONT, &self.text_colour, true)?;
        parse_tile(&text)
            .ok_or_else(|| Error::InvalidArgument(format!("unreadable tile text '{}'", text)))
    }

    fn compass_templates(&self) -> Result<&Vec<(u32, RgbImage)>> {
        self.compass.get_or_try_init(|| {
            let templates: Vec<(u32, RgbImage)> = (0..360u32)
                .into_par_iter()
                .filter_map(|angle| {
                    let path = self.compass_dir.join(format!("{}.png", angle));
                    image::open(&path).ok().map(|img| (angle, img.to_rgb8()))
                })
                .collect();
            if templates.is_empty() {
                return Err(Error::Vision(VisionError::Io {
                    path: self.compass_dir.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no compass templates",
                    ),
                }));
            }
            log::info!("Loaded {} compass headings", templates.len());
            Ok(templates)
        })
    }

    /// Camera heading in degrees, 0 facing north
    pub fn compass_angle(&self) -> Result<u32> {
        let zone = self
            .zones
            .map()
            .minimap("compassSimilarity")
            .ok_or_else(|| Error::ZoneUnavailable("compassSimilarity".into()))?;
        let templates = self.compass_templates()?;
        let crop = self.grabber.capture_zone(zone)?;

        let similarities: Vec<(u32, f64)> = templates
            .par_iter()
            .map(|(angle, template)| (*angle, ssim(template, &crop)))
            .collect();
        best_heading(&similarities).ok_or_else(|| Error::InvalidArgument("no compass headings".into()))
    }

    /// Route from the current tile to `end`
    pub fn path_to(&self, end: Tile, members: bool) -> Result<Vec<Tile>> {
        let start = self.current_tile()?;
        self.paths.generate_path(start, end, members)
    }

    /// Click towards each waypoint in turn
    ///
    /// `project` maps the current tile and a waypoint to a screen point,
    /// or `None` when the waypoint is not clickable from here.
    pub fn walk_path(&self, path: &[Tile], project: &dyn Fn(Tile, Tile) -> Option<Point>) -> Result<()> {
        for &waypoint in path {
            self.interrupt.check()?;
            let here = self.current_tile()?;
            if here == waypoint {
                continue;
            }
            let Some(target) = project(here, waypoint) else {
                log::debug!("Waypoint {:?} not reachable from {:?}", waypoint, here);
                continue;
            };
            let target = generate_random_point(crate::geometry::Rect::new(target.x - 2, target.y - 2, 5, 5));
            self.mouse.move_to(target, Speed::Medium)?;
            self.mouse.left_click()?;
            let pause = rand::thread_rng().gen_range(600..=1200);
            self.interrupt.sleep_millis(pause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_parse_tile() {
        assert_eq!(parse_tile("3222,3218,0"), Some(Tile::new(3222, 3218, 0)));
        assert_eq!(parse_tile(" 10, 20 ,1"), Some(Tile::new(10, 20, 1)));
        assert_eq!(parse_tile("10,20"), Some(Tile::new(10, 20, 0)));
        assert_eq!(parse_tile("10,x,0"), None);
        assert_eq!(parse_tile(""), None);
        assert_eq!(parse_tile("1,2,3,4"), None);
    }

    #[test]
    fn test_no_path_service() {
        let result = NoPathService.generate_path(Tile::new(0, 0, 0), Tile::new(1, 1, 0), false);
        assert!(matches!(result, Err(Error::PathUnavailable(_))));
    }

    #[test]
    fn test_ssim_identical_and_different() {
        let a = RgbImage::from_fn(24, 24, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 50]));
        let b = RgbImage::from_fn(24, 24, |x, y| Rgb([(y * 10) as u8, 200 - (x * 5) as u8, 0]));
        assert!((ssim(&a, &a) - 1.0).abs() < 1e-9);
        assert!(ssim(&a, &b) < 0.9);
    }

    fn compass_crop(fixture: &crate::testing::Fixture) -> RgbImage {
        let (x, y) = crate::testing::MINIMAP_AT;
        image::imageops::crop_imm(&fixture.frame, x as u32 + 39, y as u32 + 8, 24, 24).to_image()
    }

    #[test]
    fn test_compass_angle_from_templates() {
        let fixture = crate::testing::Fixture::new();
        let dir = fixture.root().join("images/ui/compass_degrees/resizable_classic");
        std::fs::create_dir_all(&dir).unwrap();
        let exact = compass_crop(&fixture);
        let other = RgbImage::from_fn(24, 24, |x, y| Rgb([(x * 9) as u8, (y * 9) as u8, 128]));
        exact.save(dir.join("45.png")).unwrap();
        other.save(dir.join("0.png")).unwrap();
        other.save(dir.join("180.png")).unwrap();

        let (controller, _recording) = fixture.controller();
        controller.init().unwrap();
        assert_eq!(controller.walker().unwrap().compass_angle().unwrap(), 45);
    }

    #[test]
    fn test_compass_tie_resolves_to_cardinal() {
        let fixture = crate::testing::Fixture::new();
        let dir = fixture.root().join("images/ui/compass_degrees/resizable_classic");
        std::fs::create_dir_all(&dir).unwrap();
        let exact = compass_crop(&fixture);
        exact.save(dir.join("45.png")).unwrap();
        exact.save(dir.join("90.png")).unwrap();

        let (controller, _recording) = fixture.controller();
        controller.init().unwrap();
        assert_eq!(controller.walker().unwrap().compass_angle().unwrap(), 90);
    }

    #[test]
    fn test_compass_without_templates_fails() {
        let fixture = crate::testing::Fixture::new();
        let (controller, _recording) = fixture.controller();
        controller.init().unwrap();
        assert!(matches!(
            controller.walker().unwrap().compass_angle(),
            Err(Error::Vision(VisionError::Io { .. }))
        ));
    }

    #[test]
    fn test_path_to_without_service() {
        let fixture = crate::testing::Fixture::new();
        let (controller, _recording) = fixture.controller();
        controller.init().unwrap();
        // No glyph set on disk, so the tile cannot be read
        assert!(controller.walker().unwrap().path_to(Tile::new(1, 1, 0), false).is_err());
    }

    #[test]
    fn test_best_heading_prefers_cardinals_on_ties() {
        assert_eq!(best_heading(&[(10, 0.2), (45, 0.9), (300, 0.5)]), Some(45));
        assert_eq!(best_heading(&[(45, 0.9), (90, 0.9)]), Some(90));
        assert_eq!(best_heading(&[(89, 0.9), (91, 0.9)]), Some(89));
        assert_eq!(best_heading(&[]), None);
    }
}
