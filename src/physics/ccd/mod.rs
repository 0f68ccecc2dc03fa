pub mod ccd_manager;
pub mod ccd_particle;

pub use ccd_manager::{CcdManager, CcdReport};
pub use ccd_particle::{CcdConstraint, CcdIsland, CcdParticle};
