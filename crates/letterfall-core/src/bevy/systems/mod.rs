//! ECS systems for letterfall.

pub mod feed;
pub mod frame;
pub mod pointer;
pub mod rendering;

pub use feed::*;
pub use frame::*;
pub use pointer::*;
pub use rendering::*;
