pub mod coordinator;
pub mod stream_merger;

pub use coordinator::*;
pub use stream_merger::*;
