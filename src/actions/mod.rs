//! Reusable multi-step actions built on the controller

pub mod dropper;
pub mod point;

pub use dropper::{drop_inventory, slot_order, DropOrder};
pub use point::{random_point_in_colour, random_point_in_image};
