//! Shift-click dropping of inventory items

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::controller::Controller;
use crate::input::distribution::generate_random_point;
use crate::input::{KeyAction, Speed};
use crate::runtime::interrupt::InterruptToken;
use crate::zones::layout::{INVENTORY_COLUMNS, INVENTORY_ROWS};
use crate::{Error, Result};

/// Order in which slots are visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DropOrder {
    /// Row by row, left to right
    Standard,
    /// Down each column pair before moving across
    #[default]
    Zigzag,
}

/// Slot indices in visiting order
pub fn slot_order(order: DropOrder) -> Vec<usize> {
    let slots = (INVENTORY_ROWS * INVENTORY_COLUMNS) as usize;
    match order {
        DropOrder::Standard => (0..slots).collect(),
        DropOrder::Zigzag => {
            let mut out = Vec::with_capacity(slots);
            for group in 0..3 {
                let base = group * 8;
                for col in 0..4 {
                    out.push(base + col);
                    out.push(base + col + 4);
                }
            }
            out.extend(24..slots);
            out
        }
    }
}

fn pause(interrupt: &InterruptToken, min: u64, max: u64) -> Result<()> {
    let millis = rand::thread_rng().gen_range(min..=max);
    interrupt.sleep_millis(millis).map_err(Error::from)
}

/// Hold shift and click every slot not listed in `skip`
///
/// Shift is released on every exit path, interrupts included.
pub fn drop_inventory(controller: &Controller, order: DropOrder, skip: &[usize]) -> Result<()> {
    let zones = controller.zones()?;
    let mouse = controller.mouse()?;
    let keyboard = controller.keyboard()?;
    let interrupt = controller.interrupt();

    keyboard.send_modifier(KeyAction::Press, "shift")?;
    let dropped = (|| -> Result<usize> {
        pause(interrupt, 100, 250)?;
        let mut count = 0;
        for slot in slot_order(order) {
            if skip.contains(&slot) {
                continue;
            }
            let rect = zones
                .map()
                .inventory_slot(slot)
                .ok_or_else(|| Error::ZoneUnavailable(format!("inventory slot {}", slot)))?;
            mouse.move_to(generate_random_point(rect), Speed::Fast)?;
            mouse.left_click()?;
            count += 1;
            pause(interrupt, 40, 90)?;
        }
        Ok(count)
    })();

    // Cut short by an interrupt; the release below still goes out
    let _ = pause(interrupt, 100, 200);
    let released = keyboard.release_modifier("shift");

    let count = dropped?;
    released?;
    log::info!("Dropped {} inventory slots", count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::injector::{KEY_PRESSED, KEY_RELEASED, MOUSE_PRESSED};
    use crate::input::recording::ChannelCall;
    use crate::testing::Fixture;

    #[test]
    fn test_slot_orders() {
        assert_eq!(DropOrder::default(), DropOrder::Zigzag);
        assert_eq!(slot_order(DropOrder::Standard), (0..28).collect::<Vec<_>>());
        let zigzag = slot_order(DropOrder::Zigzag);
        assert_eq!(&zigzag[..8], &[0, 4, 1, 5, 2, 6, 3, 7]);
        assert_eq!(&zigzag[8..10], &[8, 12]);
        assert_eq!(&zigzag[24..], &[24, 25, 26, 27]);
        let mut sorted = zigzag.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..28).collect::<Vec<_>>());
    }

    #[test]
    fn test_drop_holds_shift_around_clicks() {
        let fixture = Fixture::new();
        let (controller, recording) = fixture.controller();
        controller.init().unwrap();
        recording.drain();

        let skip: Vec<usize> = (2..28).collect();
        drop_inventory(&controller, DropOrder::Standard, &skip).unwrap();

        let calls = recording.drain();
        let keys: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                ChannelCall::Key { event, .. } => Some((event.id, event.key_code)),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec![(KEY_PRESSED, 16), (KEY_RELEASED, 16)]);

        let first_key = calls.iter().position(|c| matches!(c, ChannelCall::Key { .. })).unwrap();
        let last_key = calls.iter().rposition(|c| matches!(c, ChannelCall::Key { .. })).unwrap();
        let presses: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, ChannelCall::Mouse { event, .. } if event.id == MOUSE_PRESSED))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(presses.len(), 2);
        assert!(presses.iter().all(|&i| i > first_key && i < last_key));
    }

    #[test]
    fn test_interrupt_still_releases_shift() {
        let fixture = Fixture::new();
        let (controller, recording) = fixture.controller();
        controller.init().unwrap();
        recording.drain();

        let interrupt = controller.interrupt().clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            interrupt.interrupt();
        });
        let result = drop_inventory(&controller, DropOrder::Zigzag, &[]);
        stopper.join().unwrap();

        assert!(result.unwrap_err().is_interrupted());
        let keys: Vec<_> = recording.key_events().iter().map(|e| e.id).collect();
        assert_eq!(keys.first(), Some(&KEY_PRESSED));
        assert_eq!(keys.last(), Some(&KEY_RELEASED));
    }

    #[test]
    fn test_requires_running_controller() {
        let fixture = Fixture::new();
        let (controller, recording) = fixture.controller();
        assert!(matches!(
            drop_inventory(&controller, DropOrder::Standard, &[]),
            Err(Error::NotRunning)
        ));
        assert!(recording.drain().is_empty());
    }
}
