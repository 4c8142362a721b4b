//! Bundled demo scripts

use crate::actions::{drop_inventory, random_point_in_colour, DropOrder};
use crate::input::Speed;
use crate::runtime::script::{Script, ScriptContext, ScriptRegistry};
use crate::runtime::state::SemanticState;
use crate::vision::colour::last_objects;
use crate::Result;

/// Attempts at landing a point inside a blob's outline
const POINT_ATTEMPTS: u32 = 15;

/// Clicks inside the first blob of a colour in the game view
///
/// Suits highlighted objects such as marked rocks or trees.
pub struct ColourClicker {
    colour: String,
}

impl ColourClicker {
    pub fn new(colour: &str) -> Self {
        Self {
            colour: colour.to_string(),
        }
    }
}

impl Default for ColourClicker {
    fn default() -> Self {
        Self::new("Cyan")
    }
}

impl Script for ColourClicker {
    fn name(&self) -> &str {
        "colour-clicker"
    }

    fn cycle(&mut self, ctx: &ScriptContext) -> Result<()> {
        let controller = ctx.controller();
        let colour = controller.colour(&self.colour)?.clone();
        let view = ctx.zones()?.game_view()?;
        let origin = controller.grabber()?.canvas_bounds()?.origin();

        let target = random_point_in_colour(&view, &colour, origin, POINT_ATTEMPTS);
        ctx.stats().add_objects_detected(last_objects().len() as u64);
        let Some(target) = target else {
            log::debug!("No '{}' object in view", colour.name);
            return Ok(());
        };

        ctx.set_state(SemanticState::Acting);
        let mouse = ctx.mouse()?;
        mouse.move_to(target, Speed::Medium)?;
        mouse.left_click()?;

        ctx.set_state(SemanticState::Waiting);
        ctx.wait_random_millis(800, 1000)
    }
}

/// Shift-drops the inventory each cycle
#[derive(Default)]
pub struct InventoryDropper {
    order: DropOrder,
    keep: Vec<usize>,
}

impl InventoryDropper {
    /// Drop everything except the slots in `keep`
    pub fn new(order: DropOrder, keep: Vec<usize>) -> Self {
        Self { order, keep }
    }
}

impl Script for InventoryDropper {
    fn name(&self) -> &str {
        "inventory-dropper"
    }

    fn cycle(&mut self, ctx: &ScriptContext) -> Result<()> {
        ctx.set_state(SemanticState::Acting);
        drop_inventory(ctx.controller(), self.order, &self.keep)?;
        ctx.set_state(SemanticState::Waiting);
        ctx.wait_random_millis(1000, 2000)
    }
}

/// Registry with every bundled script
pub fn default_registry() -> ScriptRegistry {
    let mut registry = ScriptRegistry::new();
    registry.register("colour-clicker", || Box::new(ColourClicker::default()));
    registry.register("inventory-dropper", || Box::new(InventoryDropper::default()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::input::injector::MOUSE_PRESSED;
    use crate::runtime::state::StateManager;
    use crate::testing::{self, Fixture};
    use image::Rgb;
    use std::sync::Arc;

    /// Black canvas except for the anchors and a cyan square
    fn cyan_fixture() -> Fixture {
        let mut fixture = Fixture::new();
        let anchors = [testing::MINIMAP_AT, testing::INVENTORY_AT, testing::CHAT_AT];
        for (x, y, pixel) in fixture.frame.enumerate_pixels_mut() {
            let (x, y) = (x as i32, y as i32);
            let keep = anchors
                .iter()
                .any(|&(ax, ay)| (ax..ax + 6).contains(&x) && (ay..ay + 6).contains(&y));
            if !keep {
                *pixel = Rgb([0, 0, 0]);
            }
            if (200..240).contains(&x) && (150..190).contains(&y) {
                *pixel = Rgb([0, 255, 255]);
            }
        }
        fixture
    }

    #[test]
    fn test_registry_lists_demos() {
        let registry = default_registry();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["colour-clicker", "inventory-dropper"]
        );
    }

    #[test]
    fn test_colour_clicker_clicks_inside_blob() {
        let fixture = cyan_fixture();
        let (controller, recording) = fixture.controller();
        controller.init().unwrap();
        recording.drain();

        let ctx = ScriptContext::new(controller.clone(), Arc::new(StateManager::new()));
        ColourClicker::default().cycle(&ctx).unwrap();

        let presses: Vec<_> = recording
            .mouse_events()
            .into_iter()
            .filter(|e| e.id == MOUSE_PRESSED)
            .collect();
        assert_eq!(presses.len(), 1);
        // Client coordinates, strictly inside the square
        let inner = Rect::new(201, 151, 38, 38);
        assert!(inner.contains(crate::geometry::Point::new(presses[0].x, presses[0].y)));
    }

    #[test]
    fn test_colour_clicker_idles_without_blob() {
        let fixture = cyan_fixture();
        let (controller, recording) = fixture.controller();
        controller.init().unwrap();
        recording.drain();

        let ctx = ScriptContext::new(controller.clone(), Arc::new(StateManager::new()));
        ColourClicker::new("Green").cycle(&ctx).unwrap();
        assert!(recording.mouse_events().is_empty());
        assert!(ColourClicker::new("Nope").cycle(&ctx).is_err());
    }

    #[test]
    fn test_dropper_cycle() {
        let fixture = Fixture::new();
        let (controller, recording) = fixture.controller();
        controller.init().unwrap();
        recording.drain();

        let ctx = ScriptContext::new(controller.clone(), Arc::new(StateManager::new()));
        let keep: Vec<usize> = (1..28).collect();
        let mut dropper = InventoryDropper::new(DropOrder::Standard, keep);
        dropper.cycle(&ctx).unwrap();

        let presses = recording
            .mouse_events()
            .into_iter()
            .filter(|e| e.id == MOUSE_PRESSED)
            .count();
        assert_eq!(presses, 1);
    }
}
