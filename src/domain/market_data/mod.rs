//! Market data aggregate: bars, the bounded series, indicators and the
//! collaborator seams used to feed them.

pub mod entities;
pub mod indicator_engine;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use indicator_engine::{IndicatorSeries, MovingAverageEngine};
pub use repositories::*;
pub use value_objects::*;
