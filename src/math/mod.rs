mod bounds;
mod spherical;

pub use bounds::BoundingVolume;
pub use spherical::{wrap_angle, Spherical, POLE_EPSILON};
