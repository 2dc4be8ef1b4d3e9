//! Straight-line motion
//!
//! Used for debris flying off after a planet break-up and for satellites
//! that were knocked out of their orbit. The role only selects the snapshot
//! tag; all roles move the same way.

use std::io::{Read, Write};

use glam::{Mat4, Vec3};

use super::motion::{CollisionFlags, Motion, compose_transform};
use super::satellite::{self, SatelliteTransformation};
use crate::config::UniverseConfig;
use crate::persistence::{PersistResult, Persistable, ReadExt, WriteExt};

/// What kind of body a directional motion belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectionalRole {
    Plain,
    /// Fragment of a planet
    Planet,
    /// Satellite kicked out of its orbit
    Satellite,
}

impl DirectionalRole {
    pub const ALL: [DirectionalRole; 3] = [
        DirectionalRole::Plain,
        DirectionalRole::Planet,
        DirectionalRole::Satellite,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            DirectionalRole::Plain => "directional",
            DirectionalRole::Planet => "directional_planet",
            DirectionalRole::Satellite => "directional_satellite",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.tag() == tag)
    }
}

/// Constant-velocity motion along a unit direction
#[derive(Debug)]
pub struct DirectionalMotion {
    config: UniverseConfig,
    role: DirectionalRole,
    /// Unit heading (zero when the body stands still)
    direction_vec: Vec3,
    position: Vec3,
    speed: f32,
    transform: Mat4,
    basic_orientation: Mat4,
    sat_trans: Option<Box<dyn SatelliteTransformation>>,
    /// Tag of a transformation the last restore could not resolve
    unknown_spin: Option<String>,
    flags: CollisionFlags,
}

impl DirectionalMotion {
    pub fn new(
        start_pos: Vec3,
        direction_vec: Vec3,
        speed: f32,
        basic_orientation: Mat4,
        role: DirectionalRole,
        config: UniverseConfig,
    ) -> Self {
        let mut motion = Self::empty(role, config);
        motion.reconfigure(start_pos, direction_vec, speed, basic_orientation);
        motion
    }

    /// Blank motion, the target of `restore`
    pub fn empty(role: DirectionalRole, config: UniverseConfig) -> Self {
        Self {
            config,
            role,
            direction_vec: Vec3::ZERO,
            position: Vec3::ZERO,
            speed: 0.0,
            transform: Mat4::IDENTITY,
            basic_orientation: Mat4::IDENTITY,
            sat_trans: None,
            unknown_spin: None,
            flags: CollisionFlags::default(),
        }
    }

    /// Restart from `start_pos`; the satellite transformation is kept
    pub fn reconfigure(
        &mut self,
        start_pos: Vec3,
        direction_vec: Vec3,
        speed: f32,
        basic_orientation: Mat4,
    ) {
        self.direction_vec = direction_vec.normalize_or_zero();
        self.position = start_pos;
        self.speed = speed;
        self.basic_orientation = basic_orientation;
        self.compose();
    }

    pub fn role(&self) -> DirectionalRole {
        self.role
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Tag of a satellite transformation dropped by the last restore
    pub fn unknown_spin(&self) -> Option<&str> {
        self.unknown_spin.as_deref()
    }

    fn compose(&mut self) {
        self.transform = compose_transform(self.basic_orientation, self.sat_trans.as_deref(), self.position);
    }
}

impl Motion for DirectionalMotion {
    fn update(&mut self, dt: f32) {
        self.position += self.direction_vec.normalize_or_zero() * self.speed * dt;
        if let Some(sat_trans) = self.sat_trans.as_mut() {
            sat_trans.update(dt);
        }
        self.compose();
    }

    fn transform(&self) -> Mat4 {
        self.transform
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    fn basic_orientation(&self) -> Mat4 {
        self.basic_orientation
    }

    fn set_basic_orientation(&mut self, orientation: Mat4) {
        self.basic_orientation = orientation;
    }

    fn curr_direction_vec(&self) -> Vec3 {
        self.direction_vec
    }

    /// Add the impulse to the velocity; the resulting speed is capped at the
    /// universe speed limit
    fn morph(&mut self, impulse: Vec3) {
        let velocity = self.direction_vec * self.speed + impulse;
        self.speed = velocity.length().min(self.config.universe_speed_limit);
        self.direction_vec = velocity.normalize_or_zero();
        log::debug!(
            "morph {}: speed {:.2}, heading {:?}",
            self.role.tag(),
            self.speed,
            self.direction_vec
        );
    }

    fn sat_trans(&self) -> Option<&dyn SatelliteTransformation> {
        self.sat_trans.as_deref()
    }

    fn sat_trans_mut(&mut self) -> Option<&mut (dyn SatelliteTransformation + 'static)> {
        self.sat_trans.as_deref_mut()
    }

    fn set_sat_trans(
        &mut self,
        sat_trans: Option<Box<dyn SatelliteTransformation>>,
    ) -> Option<Box<dyn SatelliteTransformation>> {
        std::mem::replace(&mut self.sat_trans, sat_trans)
    }

    fn flags(&self) -> CollisionFlags {
        self.flags
    }

    fn flags_mut(&mut self) -> &mut CollisionFlags {
        &mut self.flags
    }
}

impl Persistable for DirectionalMotion {
    fn persist(&self, out: &mut dyn Write) -> PersistResult<()> {
        out.write_vec3(self.direction_vec)?;
        out.write_vec3(self.position)?;
        out.write_f32(self.speed)?;
        out.write_mat4(&self.basic_orientation)?;
        self.flags.persist(out)?;
        satellite::persist_optional(self.sat_trans.as_deref(), out)
    }

    fn restore(&mut self, input: &mut dyn Read) -> PersistResult<()> {
        self.direction_vec = input.read_vec3()?;
        self.position = input.read_vec3()?;
        self.speed = input.read_f32()?;
        self.basic_orientation = input.read_mat4()?;
        self.flags.restore(input)?;
        let spin = satellite::restore_spin(input)?;
        self.unknown_spin = spin.unknown_tag().map(str::to_owned);
        self.sat_trans = spin.into_transformation();
        self.compose();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::to_bytes;
    use crate::sim::satellite::{AxisSpin, Wobble};
    use std::io::Cursor;

    fn fragment(direction: Vec3, speed: f32) -> DirectionalMotion {
        DirectionalMotion::new(
            Vec3::new(1.0, 2.0, 3.0),
            direction,
            speed,
            Mat4::IDENTITY,
            DirectionalRole::Planet,
            UniverseConfig::default(),
        )
    }

    #[test]
    fn test_role_tags_roundtrip() {
        for role in DirectionalRole::ALL {
            assert_eq!(DirectionalRole::from_tag(role.tag()), Some(role));
        }
        assert_eq!(DirectionalRole::from_tag("orbit"), None);
    }

    #[test]
    fn test_direction_is_normalized() {
        let motion = fragment(Vec3::new(0.0, 0.0, 5.0), 2.0);
        assert!((motion.curr_direction_vec() - Vec3::Z).length() < 1e-6);
        assert_eq!(motion.transform().w_axis, Vec3::new(1.0, 2.0, 3.0).extend(1.0));
    }

    #[test]
    fn test_update_moves_along_direction() {
        let mut motion = fragment(Vec3::X, 2.0);
        motion.update(0.5);
        assert!((motion.position() - Vec3::new(2.0, 2.0, 3.0)).length() < 1e-6);
        assert_eq!(motion.transform().w_axis.truncate(), motion.position());

        motion.update(0.0);
        assert!((motion.position() - Vec3::new(2.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn test_morph_adds_impulse() {
        let mut motion = fragment(Vec3::X, 2.0);
        motion.morph(Vec3::new(0.0, 2.0, 0.0));
        assert!((motion.speed() - 8.0f32.sqrt()).abs() < 1e-5);
        let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!((motion.curr_direction_vec() - expected).length() < 1e-6);
    }

    #[test]
    fn test_morph_caps_speed() {
        let mut motion = fragment(Vec3::X, 5.0);
        motion.morph(Vec3::X * 10.0);
        assert_eq!(motion.speed(), UniverseConfig::default().universe_speed_limit);
        assert!((motion.curr_direction_vec() - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_morph_to_standstill() {
        let mut motion = fragment(Vec3::X, 3.0);
        motion.morph(Vec3::X * -3.0);
        assert_eq!(motion.speed(), 0.0);
        assert_eq!(motion.curr_direction_vec(), Vec3::ZERO);
        motion.update(1.0);
        assert!(motion.position().is_finite());
    }

    #[test]
    fn test_zero_direction_does_not_move() {
        let mut motion = fragment(Vec3::ZERO, 3.0);
        motion.update(1.0);
        assert_eq!(motion.position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_reconfigure_keeps_spin() {
        let mut motion = fragment(Vec3::X, 1.0);
        motion.set_sat_trans(Some(Box::new(Wobble::new(Vec3::X, 0.2, 1.0))));
        motion.reconfigure(Vec3::ZERO, Vec3::Y * 3.0, 4.0, Mat4::IDENTITY);
        assert_eq!(motion.position(), Vec3::ZERO);
        assert!((motion.curr_direction_vec() - Vec3::Y).length() < 1e-6);
        assert_eq!(motion.speed(), 4.0);
        assert!(motion.sat_trans().is_some());
    }

    #[test]
    fn test_take_sat_trans_detaches() {
        let mut motion = fragment(Vec3::X, 1.0);
        motion.set_sat_trans(Some(Box::new(AxisSpin::new(Vec3::Y, 1.0, Mat4::IDENTITY))));
        let spin = motion.take_sat_trans();
        assert!(spin.is_some());
        assert!(motion.sat_trans().is_none());
    }

    #[test]
    fn test_persist_restore_continues_identically() {
        let mut motion = DirectionalMotion::new(
            Vec3::new(-4.0, 0.5, 2.0),
            Vec3::new(1.0, -1.0, 0.5),
            3.0,
            Mat4::from_rotation_y(0.7),
            DirectionalRole::Satellite,
            UniverseConfig::default(),
        );
        motion.set_sat_trans(Some(Box::new(AxisSpin::new(Vec3::Z, 1.3, Mat4::IDENTITY))));
        motion.flags_mut().filter_planet_collision = true;
        motion.update(0.25);

        let bytes = to_bytes(&motion).unwrap();
        let mut restored = DirectionalMotion::empty(DirectionalRole::Satellite, UniverseConfig::default());
        restored.restore(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(restored.transform(), motion.transform());
        assert_eq!(restored.flags(), motion.flags());
        motion.update(0.1);
        restored.update(0.1);
        assert_eq!(restored.transform(), motion.transform());
    }
}
