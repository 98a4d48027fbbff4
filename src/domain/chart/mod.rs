//! Chart aggregate: the per-key session, camera policy and hover lookup.

pub mod entities;
pub mod services;
pub mod value_objects;
pub mod viewport;

pub use entities::*;
pub use services::*;
pub use value_objects::*;
pub use viewport::ViewportController;
