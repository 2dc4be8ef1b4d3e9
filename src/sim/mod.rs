//! Kinematics of the orbiting bodies
//!
//! Everything here is driven by the logic worker only:
//! - Orbits and straight-line motions advance with `update(dt)`
//! - Collisions redirect them with `morph(impulse)`
//! - Renderers read the composed `transform()`
//! - No rendering or platform dependencies

pub mod directional;
pub mod ellipse;
pub mod motion;
pub mod orbit;
pub mod satellite;
pub mod scene;

pub use directional::{DirectionalMotion, DirectionalRole};
pub use ellipse::{Ellipse, ramanujan_perimeter};
pub use motion::{CollisionFlags, Motion, MotionVariant, ORBIT_TAG};
pub use orbit::Orbit;
pub use satellite::{AXIS_SPIN_TAG, AxisSpin, SatelliteTransformation, WOBBLE_TAG, Wobble};
pub use scene::Scene;
