//! Motion capability contract and the tagged motion variant
//!
//! Every simulated body owns exactly one motion. The logic worker drives it
//! with `update`, the collision layer redirects it with `morph`, and the render
//! layer only ever reads `transform`.

use std::io::{Read, Write};

use glam::{Mat4, Vec3};

use super::directional::{DirectionalMotion, DirectionalRole};
use super::orbit::Orbit;
use super::satellite::SatelliteTransformation;
use crate::config::UniverseConfig;
use crate::persistence::{PersistError, PersistResult, Persistable, ReadExt, WriteExt};

pub const ORBIT_TAG: &str = "orbit";

/// Collision bookkeeping carried through snapshots
///
/// The kinematics never read these; the collision layer owns their meaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionFlags {
    /// Body is currently inside the planet bounds
    pub inside_planet: bool,
    /// Skip planet collision tests for this body
    pub filter_planet_collision: bool,
    /// The impact sound for the current contact already played
    pub played_collision_sound: bool,
}

impl Persistable for CollisionFlags {
    fn persist(&self, out: &mut dyn Write) -> PersistResult<()> {
        out.write_bool(self.inside_planet)?;
        out.write_bool(self.filter_planet_collision)?;
        out.write_bool(self.played_collision_sound)
    }

    fn restore(&mut self, input: &mut dyn Read) -> PersistResult<()> {
        self.inside_planet = input.read_bool()?;
        self.filter_planet_collision = input.read_bool()?;
        self.played_collision_sound = input.read_bool()?;
        Ok(())
    }
}

/// Kinematic behavior of a single body
pub trait Motion: Persistable + Send + std::fmt::Debug {
    /// Advance one tick; `dt` must be finite and >= 0
    fn update(&mut self, dt: f32);

    /// Transform as of the last `update`/`morph`/`restore`
    fn transform(&self) -> Mat4;

    fn speed(&self) -> f32;

    fn set_speed(&mut self, speed: f32);

    fn basic_orientation(&self) -> Mat4;

    fn set_basic_orientation(&mut self, orientation: Mat4);

    /// Instantaneous heading (not normalized for orbits)
    fn curr_direction_vec(&self) -> Vec3;

    /// Redirect the motion by an impulse while keeping the position continuous
    fn morph(&mut self, impulse: Vec3);

    fn sat_trans(&self) -> Option<&dyn SatelliteTransformation>;

    fn sat_trans_mut(&mut self) -> Option<&mut (dyn SatelliteTransformation + 'static)>;

    /// Attach a transformation, returning the one it replaces
    fn set_sat_trans(
        &mut self,
        sat_trans: Option<Box<dyn SatelliteTransformation>>,
    ) -> Option<Box<dyn SatelliteTransformation>>;

    /// Detach the transformation
    fn take_sat_trans(&mut self) -> Option<Box<dyn SatelliteTransformation>> {
        self.set_sat_trans(None)
    }

    fn flags(&self) -> CollisionFlags;

    fn flags_mut(&mut self) -> &mut CollisionFlags;
}

/// Basic orientation, then spin, then translation to `position`
pub(crate) fn compose_transform(
    basic_orientation: Mat4,
    sat_trans: Option<&dyn SatelliteTransformation>,
    position: Vec3,
) -> Mat4 {
    let mut transform = match sat_trans {
        Some(sat_trans) => basic_orientation * sat_trans.transform(),
        None => basic_orientation,
    };
    transform.w_axis += position.extend(0.0);
    transform
}

/// Closed set of motion variants, persisted with a leading tag
#[derive(Debug)]
pub enum MotionVariant {
    Orbit(Orbit),
    Directional(DirectionalMotion),
}

impl MotionVariant {
    /// Stable snapshot tag of this variant
    pub fn tag(&self) -> &'static str {
        match self {
            MotionVariant::Orbit(_) => ORBIT_TAG,
            MotionVariant::Directional(motion) => motion.role().tag(),
        }
    }

    /// Default-construct the variant registered under `tag`
    pub fn construct(tag: &str, config: UniverseConfig) -> Option<Self> {
        if tag == ORBIT_TAG {
            return Some(MotionVariant::Orbit(Orbit::empty(config)));
        }
        DirectionalRole::from_tag(tag)
            .map(|role| MotionVariant::Directional(DirectionalMotion::empty(role, config)))
    }

    pub fn as_motion(&self) -> &dyn Motion {
        match self {
            MotionVariant::Orbit(orbit) => orbit,
            MotionVariant::Directional(motion) => motion,
        }
    }

    pub fn as_motion_mut(&mut self) -> &mut dyn Motion {
        match self {
            MotionVariant::Orbit(orbit) => orbit,
            MotionVariant::Directional(motion) => motion,
        }
    }

    pub fn as_orbit(&self) -> Option<&Orbit> {
        match self {
            MotionVariant::Orbit(orbit) => Some(orbit),
            MotionVariant::Directional(_) => None,
        }
    }

    pub fn as_directional(&self) -> Option<&DirectionalMotion> {
        match self {
            MotionVariant::Directional(motion) => Some(motion),
            MotionVariant::Orbit(_) => None,
        }
    }

    /// Tag of a satellite transformation dropped by the last restore
    ///
    /// The dropped record is still in the stream, so nothing after this
    /// motion can be read.
    pub fn unknown_spin(&self) -> Option<&str> {
        match self {
            MotionVariant::Orbit(orbit) => orbit.unknown_spin(),
            MotionVariant::Directional(motion) => motion.unknown_spin(),
        }
    }

    /// Write the tag followed by the variant record
    pub fn persist_tagged(&self, out: &mut dyn Write) -> PersistResult<()> {
        out.write_utf(self.tag())?;
        self.as_motion().persist(out)
    }

    /// Read a tag and the matching variant record
    pub fn restore_tagged(input: &mut dyn Read, config: UniverseConfig) -> PersistResult<Self> {
        let tag = input.read_utf()?;
        let mut variant =
            Self::construct(&tag, config).ok_or_else(|| PersistError::UnknownMotion(tag.clone()))?;
        variant.as_motion_mut().restore(input)?;
        Ok(variant)
    }
}

impl From<Orbit> for MotionVariant {
    fn from(orbit: Orbit) -> Self {
        MotionVariant::Orbit(orbit)
    }
}

impl From<DirectionalMotion> for MotionVariant {
    fn from(motion: DirectionalMotion) -> Self {
        MotionVariant::Directional(motion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::satellite::AxisSpin;
    use std::io::Cursor;

    #[test]
    fn test_compose_transform_translates_last() {
        let basic = Mat4::from_rotation_z(0.5);
        let position = Vec3::new(3.0, -2.0, 1.0);
        let transform = compose_transform(basic, None, position);
        assert_eq!(transform.w_axis, position.extend(1.0));
        assert_eq!(transform.x_axis, basic.x_axis);

        let spin = AxisSpin::new(Vec3::Z, 1.0, Mat4::IDENTITY);
        let spun = compose_transform(basic, Some(&spin as &dyn SatelliteTransformation), position);
        let expected = Mat4::from_translation(position) * basic * spin.transform();
        assert!(spun.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_flags_roundtrip() {
        let flags = CollisionFlags {
            inside_planet: true,
            filter_planet_collision: false,
            played_collision_sound: true,
        };
        let mut buf = Vec::new();
        flags.persist(&mut buf).unwrap();
        assert_eq!(buf, vec![1, 0, 1]);

        let mut back = CollisionFlags::default();
        back.restore(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back, flags);
    }

    #[test]
    fn test_tags_resolve_to_variants() {
        let config = UniverseConfig::default();
        for tag in [ORBIT_TAG, "directional", "directional_planet", "directional_satellite"] {
            let variant = MotionVariant::construct(tag, config).unwrap();
            assert_eq!(variant.tag(), tag);
        }
        assert!(MotionVariant::construct("asteroid", config).is_none());
    }

    #[test]
    fn test_unknown_motion_tag_is_error() {
        let mut buf = Vec::new();
        buf.write_utf("asteroid").unwrap();
        let result = MotionVariant::restore_tagged(&mut Cursor::new(buf), UniverseConfig::default());
        assert!(matches!(result, Err(PersistError::UnknownMotion(tag)) if tag == "asteroid"));
    }
}
