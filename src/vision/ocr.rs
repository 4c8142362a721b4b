//! Glyph OCR
//!
//! Reads text by correlating every glyph bitmap of a font with a colour
//! mask of the zone. Each font lives in `fonts/<name>/` next to a
//! `<name>.index` file listing one `<codepoint>.bmp` per line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as ImageRect;
use ndarray::Array2;
use once_cell::sync::Lazy;
use rayon::prelude::*;

use super::capture::FrameGrabber;
use super::colour::{mask, ColourRange};
use super::VisionError;
use crate::geometry::Rect;
use crate::runtime::interrupt::InterruptToken;

/// Correlation needed to accept a glyph
pub const MATCH_THRESHOLD: f32 = 0.99;

/// Interval between reads in [`GlyphOcr::wait_for_text_change`]
const POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Glyphs whose thin strokes match inside other characters
const AMBIGUOUS: &[char] = &[
    'Ì', 'Í', 'Î', 'Ï', 'ì', 'í', 'î', 'ï', 'Ĺ', 'Ļ', 'Ľ', 'Ŀ', 'Ł', 'ĺ', 'ļ', 'ľ', 'ŀ', 'ł', '|',
    '¦', '!', 'ĵ', 'ǰ', 'ȷ', 'ɉ', 'Ĵ', 'Ĩ', 'Ī', 'Ĭ', 'Į', 'İ', 'Ɨ', 'Ỉ', 'Ị', 'ĩ', 'ī', 'ĭ', 'į',
    'ı', 'ƚ', 'ỉ', 'ị', 'ˈ', 'ˌ', 'ʻ', 'ʼ', 'ʽ', '˚', 'ʾ', 'ʿ', '˙', '`', '¨', '¯', '´', '¹', ' ',
    '\t', '\n', '·',
];

/// One character bitmap
#[derive(Debug, Clone)]
pub struct Glyph {
    pub character: char,
    pub bitmap: GrayImage,
}

/// All glyphs of one font, ordered by character
#[derive(Debug, Clone)]
pub struct GlyphSet {
    pub name: String,
    pub glyphs: Vec<Glyph>,
}

impl GlyphSet {
    /// Rows trimmed off the top of each bitmap before matching
    pub fn top_crop(&self) -> u32 {
        if self.name == "Plain 12" {
            2
        } else {
            1
        }
    }
}

/// A recognised character, in zone coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharMatch {
    pub character: char,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

static FONT_CACHE: Lazy<RwLock<HashMap<PathBuf, Arc<GlyphSet>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn font_error(name: &str, reason: impl ToString) -> VisionError {
    VisionError::FontLoad {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn read_font(dir: &Path, name: &str) -> Result<GlyphSet, VisionError> {
    let index = dir.join(format!("{}.index", name));
    let listing = std::fs::read_to_string(&index).map_err(|source| VisionError::Io {
        path: index.clone(),
        source,
    })?;

    let mut glyphs = Vec::new();
    for line in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let code = line
            .strip_suffix(".bmp")
            .and_then(|stem| stem.parse::<u32>().ok())
            .ok_or_else(|| font_error(name, format!("bad index entry '{}'", line)))?;
        let character = char::from_u32(code)
            .ok_or_else(|| font_error(name, format!("invalid code point {}", code)))?;
        let bitmap = image::open(dir.join(line))
            .map_err(|e| font_error(name, format!("{}: {}", line, e)))?
            .to_luma8();
        glyphs.push(Glyph { character, bitmap });
    }
    glyphs.sort_by_key(|g| g.character);

    Ok(GlyphSet {
        name: name.to_string(),
        glyphs,
    })
}

/// Load a font from `<fonts_root>/<name>/`, once per process
pub fn load_font(fonts_root: &Path, name: &str) -> Result<Arc<GlyphSet>, VisionError> {
    let dir = fonts_root.join(name);
    if let Some(set) = FONT_CACHE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(&dir)
    {
        return Ok(set.clone());
    }

    let set = Arc::new(read_font(&dir, name)?);
    log::info!("Loaded font '{}' ({} glyphs)", name, set.glyphs.len());
    let mut cache = FONT_CACHE.write().unwrap_or_else(|e| e.into_inner());
    Ok(cache.entry(dir).or_insert(set).clone())
}

/// Inclusive-exclusive summed-area tables of values and squares
fn integral_tables(image: &GrayImage) -> (Array2<f64>, Array2<f64>) {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut sum = Array2::<f64>::zeros((h + 1, w + 1));
    let mut sq = Array2::<f64>::zeros((h + 1, w + 1));
    for y in 0..h {
        let mut row = 0.0;
        let mut row_sq = 0.0;
        for x in 0..w {
            let v = image.get_pixel(x as u32, y as u32)[0] as f64;
            row += v;
            row_sq += v * v;
            sum[[y + 1, x + 1]] = sum[[y, x + 1]] + row;
            sq[[y + 1, x + 1]] = sq[[y, x + 1]] + row_sq;
        }
    }
    (sum, sq)
}

fn window_sum(table: &Array2<f64>, x: usize, y: usize, w: usize, h: usize) -> f64 {
    table[[y + h, x + w]] - table[[y, x + w]] - table[[y + h, x]] + table[[y, x]]
}

/// Normalised correlation coefficient of `template` at every placement
///
/// Placements where either the window or the template is flat score 0.
pub fn correlation_map(image: &GrayImage, template: &GrayImage) -> Option<Array2<f32>> {
    let (iw, ih) = (image.width() as usize, image.height() as usize);
    let (tw, th) = (template.width() as usize, template.height() as usize);
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return None;
    }

    let n = (tw * th) as f64;
    let mean = template.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
    let centred: Vec<f64> = template.pixels().map(|p| p[0] as f64 - mean).collect();
    let template_norm: f64 = centred.iter().map(|t| t * t).sum();

    let (sum, sq) = integral_tables(image);
    let out_w = iw - tw + 1;
    let out_h = ih - th + 1;
    let raw = image.as_raw();

    let scores: Vec<f32> = (0..out_h)
        .into_par_iter()
        .flat_map_iter(|y| {
            let (centred, sum, sq) = (&centred, &sum, &sq);
            (0..out_w).map(move |x| {
                let s = window_sum(sum, x, y, tw, th);
                let s2 = window_sum(sq, x, y, tw, th);
                let window_norm = s2 - s * s / n;
                let denom = (window_norm * template_norm).sqrt();
                if window_norm <= f64::EPSILON || denom <= f64::EPSILON {
                    return 0.0;
                }
                let mut num = 0.0;
                for dy in 0..th {
                    let row = (y + dy) * iw + x;
                    for dx in 0..tw {
                        num += centred[dy * tw + dx] * raw[row + dx] as f64;
                    }
                }
                (num / denom) as f32
            })
        })
        .collect();

    Array2::from_shape_vec((out_h, out_w), scores).ok()
}

/// Highest score and its (x, y), first in row-major order on ties
fn max_location(scores: &Array2<f32>) -> Option<(f32, usize, usize)> {
    let mut best: Option<(f32, usize, usize)> = None;
    for ((y, x), &score) in scores.indexed_iter() {
        let better = match best {
            Some((b, _, _)) => score > b,
            None => true,
        };
        if better {
            best = Some((score, x, y));
        }
    }
    best
}

fn zero_region(scores: &mut Array2<f32>, x: usize, y: usize, w: usize, h: usize) {
    let (rows, cols) = scores.dim();
    for yy in y..(y + h).min(rows) {
        for xx in x..(x + w).min(cols) {
            scores[[yy, xx]] = 0.0;
        }
    }
}

/// Find every glyph of `font` in a binary mask, sorted by `(y, x)`
pub fn read_mask(mask: &GrayImage, font: &GlyphSet) -> Vec<CharMatch> {
    let mut mask = mask.clone();
    let crop = font.top_crop();
    let mut matches = Vec::new();

    for glyph in &font.glyphs {
        if AMBIGUOUS.contains(&glyph.character) || glyph.character.is_whitespace() {
            continue;
        }
        let (gw, gh) = glyph.bitmap.dimensions();
        if gh <= crop {
            continue;
        }
        let template = image::imageops::crop_imm(&glyph.bitmap, 0, crop, gw, gh - crop).to_image();
        let (tw, th) = (template.width() as usize, template.height() as usize);
        let Some(mut scores) = correlation_map(&mask, &template) else {
            continue;
        };

        while let Some((score, x, y)) = max_location(&scores) {
            if score < MATCH_THRESHOLD {
                break;
            }
            matches.push(CharMatch {
                character: glyph.character,
                x: x as i32,
                y: y as i32,
                width: tw as i32,
                height: th as i32,
            });
            zero_region(&mut scores, x, y, tw, th);
            draw_filled_rect_mut(
                &mut mask,
                ImageRect::at(x as i32, y as i32).of_size(tw as u32, th as u32),
                Luma([0]),
            );
        }
    }

    matches.sort_by_key(|m| (m.y, m.x));
    matches
}

fn join(matches: &[CharMatch]) -> String {
    matches.iter().map(|m| m.character).collect()
}

/// Reads text from zones of the captured canvas
pub struct GlyphOcr {
    grabber: Arc<FrameGrabber>,
    fonts_root: PathBuf,
    interrupt: InterruptToken,
    last_matches: Mutex<Vec<CharMatch>>,
}

impl GlyphOcr {
    pub fn new(grabber: Arc<FrameGrabber>, fonts_root: PathBuf, interrupt: InterruptToken) -> Self {
        Self {
            grabber,
            fonts_root,
            interrupt,
            last_matches: Mutex::new(Vec::new()),
        }
    }

    pub fn font(&self, name: &str) -> Result<Arc<GlyphSet>, VisionError> {
        load_font(&self.fonts_root, name)
    }

    /// Read the text drawn in `colour` inside a screen zone
    ///
    /// With `clear` unset the individual matches stay available through
    /// [`last_matches`](Self::last_matches).
    pub fn extract_text(
        &self,
        zone: Rect,
        font: &str,
        colour: &ColourRange,
        clear: bool,
    ) -> Result<String, VisionError> {
        let glyphs = self.font(font)?;
        let image = self.grabber.capture_zone(zone)?;
        let matches = read_mask(&mask(&image, colour), &glyphs);
        let text = join(&matches);
        log::debug!("OCR {:?} '{}' -> '{}'", zone, font, text);

        let mut last = self.last_matches.lock().unwrap_or_else(|e| e.into_inner());
        *last = if clear { Vec::new() } else { matches };
        Ok(text)
    }

    /// Matches kept by the last `extract_text` call that did not clear them
    pub fn last_matches(&self) -> Vec<CharMatch> {
        self.last_matches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Canvas-sized mask of the characters, if the zone reads `expected`
    pub fn extract_text_mask(
        &self,
        zone: Rect,
        font: &str,
        expected: &str,
        colour: &ColourRange,
    ) -> Result<Option<GrayImage>, VisionError> {
        let window = self.grabber.canvas_bounds()?;
        if self.extract_text(zone, font, colour, false)? != expected {
            return Ok(None);
        }
        if !window.contains_rect(&zone) {
            return Err(VisionError::ZoneOutsideWindow(zone));
        }

        let mut full = GrayImage::new(window.width as u32, window.height as u32);
        let (dx, dy) = (zone.x - window.x, zone.y - window.y);
        for m in self.last_matches() {
            draw_filled_rect_mut(
                &mut full,
                ImageRect::at(dx + m.x, dy + m.y).of_size(m.width as u32, m.height as u32),
                Luma([255]),
            );
        }
        Ok(Some(full))
    }

    /// Poll until the zone reads differently from the first reading
    ///
    /// Returns the new text, or `None` once `timeout` passes unchanged.
    pub fn wait_for_text_change(
        &self,
        zone: Rect,
        font: &str,
        colour: &ColourRange,
        timeout: Duration,
    ) -> crate::Result<Option<String>> {
        let initial = self.extract_text(zone, font, colour, true)?;
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            self.interrupt.sleep(POLL_INTERVAL)?;
            let current = self.extract_text(zone, font, colour, true)?;
            if current != initial {
                return Ok(Some(current));
            }
        }
        Ok(None)
    }
}
