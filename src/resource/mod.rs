//! Resource model: classes, keys, policies and upstream payload shapes.

mod class;
mod key;
pub mod models;

pub use class::{ClassPolicy, ResourceClass, CLASS_COUNT};
pub use key::{ResourceKey, ResourceParams};
