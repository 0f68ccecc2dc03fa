pub mod bounding_box;
pub mod math_helper;
pub mod symmetric3x3;
pub mod thread_dispatcher;

pub use self::bounding_box::BoundingBox;
pub use self::symmetric3x3::Symmetric3x3;
pub use self::thread_dispatcher::ThreadDispatcher;
