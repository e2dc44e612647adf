pub mod combat;
pub mod entity;
pub mod skill;

pub use combat::*;
pub use entity::*;
pub use skill::*;
