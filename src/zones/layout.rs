//! Fixed offsets of client interface elements
//!
//! Offsets are measured from the top-left corner of the anchor each table
//! belongs to.

/// A named box relative to an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneOffset {
    pub name: &'static str,
    pub dx: i32,
    pub dy: i32,
    pub width: i32,
    pub height: i32,
}

const fn zone(name: &'static str, dx: i32, dy: i32, width: i32, height: i32) -> ZoneOffset {
    ZoneOffset {
        name,
        dx,
        dy,
        width,
        height,
    }
}

/// Minimap in resizable mode, from `minimap.png`
pub const RESIZABLE_MINIMAP: [ZoneOffset; 10] = [
    zone("specOrb", 62, 143, 19, 19),
    zone("specText", 36, 151, 19, 12),
    zone("runOrb", 40, 118, 18, 20),
    zone("runText", 14, 126, 19, 12),
    zone("prayerOrb", 30, 86, 19, 19),
    zone("prayerText", 4, 94, 19, 12),
    zone("hpOrb", 30, 52, 19, 19),
    zone("hpText", 4, 60, 19, 12),
    zone("compass", 39, 8, 24, 24),
    zone("compassSimilarity", 39, 8, 24, 24),
];

/// Minimap in fixed mode, from `minimap_fixed.png`
pub const FIXED_MINIMAP: [ZoneOffset; 10] = [
    zone("specOrb", 62, 137, 18, 20),
    zone("specText", 36, 146, 19, 12),
    zone("runOrb", 40, 112, 18, 20),
    zone("runText", 14, 121, 19, 12),
    zone("prayerOrb", 29, 80, 18, 20),
    zone("prayerText", 4, 89, 19, 12),
    zone("hpOrb", 29, 46, 18, 20),
    zone("hpText", 4, 55, 19, 12),
    zone("compass", 32, 7, 23, 25),
    zone("compassSimilarity", 32, 7, 23, 25),
];

/// Side panel tabs and the inventory area, from `inv.png`
pub const CTRL_PANEL: [ZoneOffset; 15] = [
    zone("combatTab", 7, 6, 26, 24),
    zone("skillsTab", 41, 2, 26, 28),
    zone("summaryTab", 74, 2, 26, 28),
    zone("inventoryTab", 107, 2, 26, 28),
    zone("equipmentTab", 140, 2, 26, 28),
    zone("prayerTab", 173, 2, 26, 28),
    zone("spellbookTab", 206, 6, 27, 24),
    zone("channelTab", 7, 300, 28, 25),
    zone("friendsTab", 41, 300, 26, 30),
    zone("accountTab", 74, 300, 26, 30),
    zone("logoutTab", 107, 300, 26, 30),
    zone("settingsTab", 140, 300, 26, 30),
    zone("emotesTab", 173, 300, 26, 30),
    zone("musicTab", 206, 300, 27, 25),
    zone("inventoryPanel", 28, 35, 183, 261),
];

/// Chat filter tabs, left to right, from `chat.png`
pub const CHAT_TAB_NAMES: [&str; 7] = ["All", "Game", "Public", "Private", "Channel", "Clan", "Group"];
pub const CHAT_TAB_ORIGIN: (i32, i32) = (5, 143);
pub const CHAT_TAB_STRIDE: i32 = 62;
pub const CHAT_TAB_SIZE: (i32, i32) = (52, 19);
/// The message area above the tabs
pub const CHAT_BOX: ZoneOffset = zone("Chat", 5, 5, 506, 129);

/// Inventory grid, from `inv.png`
pub const INVENTORY_ROWS: i32 = 7;
pub const INVENTORY_COLUMNS: i32 = 4;
pub const INVENTORY_ORIGIN: (i32, i32) = (40, 44);
pub const SLOT_SIZE: (i32, i32) = (36, 32);
pub const SLOT_GAP: (i32, i32) = (6, 4);

/// World-location overlay lines, from the canvas top-left
pub const GRID_INFO: [ZoneOffset; 3] = [
    zone("Tile", 9, 28, 130, 14),
    zone("ChunkID", 9, 43, 130, 14),
    zone("RegionID", 9, 58, 130, 14),
];

/// 3D viewport of a fixed-size client, from the canvas top-left
pub const FIXED_GAME_VIEW: ZoneOffset = zone("GameView", 4, 4, 511, 333);

/// Hover text in the canvas top-left
pub const MOUSE_OVER: ZoneOffset = zone("mouseOver", 0, 0, 407, 26);
