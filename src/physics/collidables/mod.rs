pub mod box_shape;
pub mod collidable;
pub mod compound;
pub mod level_set;
pub mod shape;
pub mod sphere;

pub use box_shape::BoxShape;
pub use collidable::Collidable;
pub use compound::{Compound, CompoundChild};
pub use level_set::LevelSet;
pub use shape::{ConvexShape, ShapeGeometry, ShapeType};
pub use sphere::Sphere;
