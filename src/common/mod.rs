pub mod codes;
pub mod frame;
pub mod request;

pub use codes::Codes;
pub use frame::Frame;
pub use request::{FrameAnnotation, Point, PriorResponse, Props, Region, Request};
