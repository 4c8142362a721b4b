//! Interface zone map
//!
//! Locates three anchor images on the canvas (minimap, side panel, chat box)
//! and derives every other interface rectangle from fixed offsets. The map
//! is built once per controller start and never changes afterwards.

pub mod layout;

use std::collections::BTreeMap;
use std::sync::Arc;

use image::{Rgb, RgbImage};

use crate::config::settings::{AssetSettings, ZoneSettings};
use crate::geometry::{Point, Rect};
use crate::vision::capture::FrameGrabber;
use crate::vision::template::TemplateMatcher;
use crate::vision::VisionError;
use layout::ZoneOffset;

/// Screen rectangles of the located anchor images
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Anchors {
    pub minimap: Option<Rect>,
    pub inventory: Option<Rect>,
    pub chat: Option<Rect>,
}

impl Anchors {
    fn iter(&self) -> impl Iterator<Item = Rect> {
        [self.minimap, self.inventory, self.chat].into_iter().flatten()
    }
}

/// Every named interface rectangle, in screen coordinates
#[derive(Debug, Clone, Default)]
pub struct ZoneMap {
    pub fixed: bool,
    pub anchors: Anchors,
    pub minimap: BTreeMap<String, Rect>,
    pub ctrl_panel: BTreeMap<String, Rect>,
    pub chat_tabs: BTreeMap<String, Rect>,
    pub grid_info: BTreeMap<String, Rect>,
    /// Row-major, top-left slot first
    pub inventory_slots: Vec<Rect>,
    pub mouse_over: Option<Rect>,
}

/// Keep `rect` only if it lies on the canvas
fn admit(canvas: Rect, name: &str, rect: Rect) -> Option<Rect> {
    if canvas.contains_rect(&rect) {
        Some(rect)
    } else {
        log::warn!("Zone '{}' {:?} falls outside the canvas {:?}, dropped", name, rect, canvas);
        None
    }
}

fn place(canvas: Rect, origin: Point, offsets: &[ZoneOffset]) -> BTreeMap<String, Rect> {
    offsets
        .iter()
        .filter_map(|o| {
            let rect = Rect::offset_from(origin, o.dx, o.dy, o.width, o.height);
            admit(canvas, o.name, rect).map(|r| (o.name.to_string(), r))
        })
        .collect()
}

fn chat_tabs(canvas: Rect, origin: Point) -> BTreeMap<String, Rect> {
    let (x0, y0) = layout::CHAT_TAB_ORIGIN;
    let (w, h) = layout::CHAT_TAB_SIZE;
    let mut tabs = BTreeMap::new();
    for (i, name) in layout::CHAT_TAB_NAMES.iter().enumerate() {
        let rect = Rect::offset_from(origin, x0 + layout::CHAT_TAB_STRIDE * i as i32, y0, w, h);
        if let Some(rect) = admit(canvas, name, rect) {
            tabs.insert(name.to_string(), rect);
        }
    }
    tabs.extend(place(canvas, origin, &[layout::CHAT_BOX]));
    tabs
}

fn inventory_slots(canvas: Rect, origin: Point) -> Vec<Rect> {
    let (x0, y0) = layout::INVENTORY_ORIGIN;
    let (w, h) = layout::SLOT_SIZE;
    let (gx, gy) = layout::SLOT_GAP;
    let mut slots = Vec::with_capacity((layout::INVENTORY_ROWS * layout::INVENTORY_COLUMNS) as usize);
    for row in 0..layout::INVENTORY_ROWS {
        for col in 0..layout::INVENTORY_COLUMNS {
            let rect = Rect::offset_from(origin, x0 + col * (w + gx), y0 + row * (h + gy), w, h);
            if let Some(rect) = admit(canvas, "inventorySlot", rect) {
                slots.push(rect);
            }
        }
    }
    slots
}

impl ZoneMap {
    /// Derive every zone from located anchors; a missing anchor leaves its maps empty
    pub fn from_anchors(canvas: Rect, anchors: Anchors, fixed: bool) -> Self {
        let mut map = ZoneMap {
            fixed,
            anchors,
            ..Default::default()
        };

        match anchors.minimap {
            Some(anchor) => {
                let table = if fixed {
                    &layout::FIXED_MINIMAP
                } else {
                    &layout::RESIZABLE_MINIMAP
                };
                map.minimap = place(canvas, anchor.origin(), table);
            }
            None => log::warn!("Minimap not found, minimap zones unavailable"),
        }

        match anchors.inventory {
            Some(anchor) => {
                map.ctrl_panel = place(canvas, anchor.origin(), &layout::CTRL_PANEL);
                map.inventory_slots = inventory_slots(canvas, anchor.origin());
            }
            None => log::warn!("Side panel not found, inventory zones unavailable"),
        }

        match anchors.chat {
            Some(anchor) => map.chat_tabs = chat_tabs(canvas, anchor.origin()),
            None => log::warn!("Chat box not found, chat zones unavailable"),
        }

        map.grid_info = place(canvas, canvas.origin(), &layout::GRID_INFO);
        let hover = layout::MOUSE_OVER;
        map.mouse_over = admit(
            canvas,
            hover.name,
            Rect::offset_from(canvas.origin(), hover.dx, hover.dy, hover.width, hover.height),
        );
        map
    }

    pub fn minimap(&self, name: &str) -> Option<Rect> {
        self.minimap.get(name).copied()
    }

    pub fn ctrl_panel(&self, name: &str) -> Option<Rect> {
        self.ctrl_panel.get(name).copied()
    }

    pub fn chat_tab(&self, name: &str) -> Option<Rect> {
        self.chat_tabs.get(name).copied()
    }

    pub fn grid_info(&self, name: &str) -> Option<Rect> {
        self.grid_info.get(name).copied()
    }

    pub fn inventory_slot(&self, index: usize) -> Option<Rect> {
        self.inventory_slots.get(index).copied()
    }
}

/// Zone map bound to a live canvas
pub struct ZoneMapper {
    grabber: Arc<FrameGrabber>,
    map: ZoneMap,
}

impl ZoneMapper {
    /// Locate the anchors on a fresh frame and build the map
    ///
    /// Unreadable anchor images are an error; anchors that are simply not
    /// on screen only leave their zones empty.
    pub fn init(
        grabber: Arc<FrameGrabber>,
        matcher: &TemplateMatcher,
        assets: &AssetSettings,
        thresholds: &ZoneSettings,
    ) -> Result<Self, VisionError> {
        let frame = grabber.capture()?;
        let canvas = grabber.canvas_bounds()?;
        let origin = canvas.origin();

        let locate = |name: &str, threshold: f64| -> Result<(Option<Rect>, f64), VisionError> {
            let found = matcher.match_template(&assets.ui_image(name), &frame, origin, threshold, false)?;
            Ok((found, matcher.last_score()))
        };

        let (resizable, resizable_score) = locate("minimap.png", thresholds.minimap_threshold)?;
        let (fixed_minimap, fixed_score) = locate("minimap_fixed.png", thresholds.fixed_minimap_threshold)?;
        let (inventory, _) = locate("inv.png", thresholds.inventory_threshold)?;
        let (chat, _) = locate("chat.png", thresholds.chat_threshold)?;

        let fixed = fixed_score < resizable_score;
        log::info!(
            "Client mode: {} (minimap scores {:.4} resizable, {:.4} fixed)",
            if fixed { "fixed" } else { "resizable" },
            resizable_score,
            fixed_score
        );

        let anchors = Anchors {
            minimap: if fixed { fixed_minimap } else { resizable },
            inventory,
            chat,
        };
        let map = ZoneMap::from_anchors(canvas, anchors, fixed);
        log::info!(
            "Zones mapped: {} minimap, {} panel, {} chat, {} slots",
            map.minimap.len(),
            map.ctrl_panel.len(),
            map.chat_tabs.len(),
            map.inventory_slots.len()
        );
        Ok(Self { grabber, map })
    }

    pub fn map(&self) -> &ZoneMap {
        &self.map
    }

    pub fn is_fixed(&self) -> bool {
        self.map.fixed
    }

    /// Image of the 3D world without interface panels
    ///
    /// A fixed client has a dedicated viewport box. In resizable mode the
    /// whole canvas is returned with the minimap, side panel and chat anchors
    /// blacked out.
    pub fn game_view(&self) -> Result<RgbImage, VisionError> {
        let mut frame = self.grabber.capture()?;
        let bounds = Rect::new(0, 0, frame.width() as i32, frame.height() as i32);
        if self.map.fixed {
            let view = layout::FIXED_GAME_VIEW;
            let clip = bounds
                .intersect(&Rect::new(view.dx, view.dy, view.width, view.height))
                .ok_or(VisionError::EmptyImage)?;
            return Ok(image::imageops::crop_imm(
                &frame,
                clip.x as u32,
                clip.y as u32,
                clip.width as u32,
                clip.height as u32,
            )
            .to_image());
        }

        let canvas = self.grabber.canvas_bounds()?;
        for anchor in self.map.anchors.iter() {
            let local = anchor.translate(-canvas.x, -canvas.y);
            let Some(clip) = bounds.intersect(&local) else {
                continue;
            };
            for y in clip.y..clip.bottom() {
                for x in clip.x..clip.right() {
                    frame.put_pixel(x as u32, y as u32, Rgb([0, 0, 0]));
                }
            }
        }
        Ok(frame)
    }
}
