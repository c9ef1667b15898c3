// Public handlers: service info and health. No JWT or profile is required.
pub mod health;

pub use health::{health, root};
