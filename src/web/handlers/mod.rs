pub mod content;
pub mod keys;
pub mod reactions;
pub mod youtube;
