//! Satellite transformations: spin of a body around its own axis
//!
//! A motion owns at most one transformation and composes its transform into
//! the motion transform each tick. Snapshots store a stable tag next to the
//! record, and restoring resolves the tag through a closed registry.

use std::f32::consts::TAU;
use std::io::{Read, Write};

use glam::{Mat4, Vec3};

use crate::persistence::{Persistable, PersistResult, ReadExt, WriteExt};

pub const AXIS_SPIN_TAG: &str = "axis_spin";
pub const WOBBLE_TAG: &str = "wobble";

/// Rotational behavior of a body around its own axis
pub trait SatelliteTransformation: Persistable + Send + std::fmt::Debug {
    /// Stable registry tag written into snapshots
    fn tag(&self) -> &'static str;

    /// Advance the rotation by `dt`
    fn update(&mut self, dt: f32);

    /// Current rotation (basic orientation included)
    fn transform(&self) -> Mat4;

    fn basic_orientation(&self) -> Mat4;

    /// Replace the basic orientation, e.g. when the behavior moves to another body
    fn set_basic_orientation(&mut self, orientation: Mat4);

    /// Rewind the rotation parameter
    fn reset(&mut self);
}

/// Default-construct the transformation registered under `tag`
pub fn construct(tag: &str) -> Option<Box<dyn SatelliteTransformation>> {
    match tag {
        AXIS_SPIN_TAG => Some(Box::new(AxisSpin::default())),
        WOBBLE_TAG => Some(Box::new(Wobble::default())),
        _ => None,
    }
}

/// Write the optional transformation: presence flag, tag, record
pub fn persist_optional(
    sat_trans: Option<&dyn SatelliteTransformation>,
    out: &mut dyn Write,
) -> PersistResult<()> {
    match sat_trans {
        Some(sat_trans) => {
            out.write_bool(true)?;
            out.write_utf(sat_trans.tag())?;
            sat_trans.persist(out)
        }
        None => out.write_bool(false),
    }
}

/// Outcome of reading an optional transformation record
#[derive(Debug)]
pub enum RestoredSpin {
    /// No transformation was stored
    Absent,
    Restored(Box<dyn SatelliteTransformation>),
    /// The tag is not registered; its record was left unread
    Unknown(String),
}

impl RestoredSpin {
    /// Tag of an unregistered transformation, if that is what was read
    pub fn unknown_tag(&self) -> Option<&str> {
        match self {
            RestoredSpin::Unknown(tag) => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn into_transformation(self) -> Option<Box<dyn SatelliteTransformation>> {
        match self {
            RestoredSpin::Restored(sat_trans) => Some(sat_trans),
            RestoredSpin::Absent | RestoredSpin::Unknown(_) => None,
        }
    }
}

/// Read an optional transformation written by [`persist_optional`]
///
/// An unknown tag is logged and yields `None` so the owning motion still
/// restores. Stream errors are returned.
///
/// Records carry no length prefix, so the record behind an unknown tag
/// cannot be skipped and the stream is left positioned inside it. Anything
/// read afterwards is misaligned; callers reading further records should use
/// [`restore_spin`] and stop on [`RestoredSpin::Unknown`].
pub fn restore_optional(
    input: &mut dyn Read,
) -> PersistResult<Option<Box<dyn SatelliteTransformation>>> {
    Ok(restore_spin(input)?.into_transformation())
}

/// Like [`restore_optional`], but reports an unknown tag
pub fn restore_spin(input: &mut dyn Read) -> PersistResult<RestoredSpin> {
    if !input.read_bool()? {
        return Ok(RestoredSpin::Absent);
    }
    let tag = input.read_utf()?;
    match restore_tagged(&tag, input)? {
        Some(sat_trans) => Ok(RestoredSpin::Restored(sat_trans)),
        None => Ok(RestoredSpin::Unknown(tag)),
    }
}

/// Construct the transformation for `tag` and restore its record
pub fn restore_tagged(
    tag: &str,
    input: &mut dyn Read,
) -> PersistResult<Option<Box<dyn SatelliteTransformation>>> {
    let Some(mut sat_trans) = construct(tag) else {
        log::error!("Could not restore satellite transformation: unknown tag '{}'", tag);
        return Ok(None);
    };
    sat_trans.restore(input)?;
    Ok(Some(sat_trans))
}

#[inline]
fn unit_axis(axis: Vec3) -> Vec3 {
    if axis.is_normalized() {
        return axis;
    }
    axis.try_normalize().unwrap_or(Vec3::Y)
}

/// Constant-speed spin about a fixed body axis
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpin {
    axis: Vec3,
    /// Radians per time unit (sign gives the spin sense)
    angular_speed: f32,
    /// Current angle in [0, 2π)
    angle: f32,
    basic_orientation: Mat4,
}

impl Default for AxisSpin {
    fn default() -> Self {
        Self {
            axis: Vec3::Y,
            angular_speed: 0.0,
            angle: 0.0,
            basic_orientation: Mat4::IDENTITY,
        }
    }
}

impl AxisSpin {
    pub fn new(axis: Vec3, angular_speed: f32, basic_orientation: Mat4) -> Self {
        Self {
            axis: unit_axis(axis),
            angular_speed,
            angle: 0.0,
            basic_orientation,
        }
    }

    /// Spin caused by an impact: faster hits spin harder
    pub fn from_impact(axis: Vec3, impact_speed: f32, speed_rotation_ratio: f32) -> Self {
        let angular_speed = if speed_rotation_ratio > 0.0 {
            impact_speed / speed_rotation_ratio
        } else {
            0.0
        };
        Self::new(axis, angular_speed, Mat4::IDENTITY)
    }

    pub fn axis(&self) -> Vec3 {
        self.axis
    }

    pub fn angular_speed(&self) -> f32 {
        self.angular_speed
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }
}

impl SatelliteTransformation for AxisSpin {
    fn tag(&self) -> &'static str {
        AXIS_SPIN_TAG
    }

    fn update(&mut self, dt: f32) {
        self.angle = (self.angle + self.angular_speed * dt).rem_euclid(TAU);
    }

    fn transform(&self) -> Mat4 {
        self.basic_orientation * Mat4::from_axis_angle(self.axis, self.angle)
    }

    fn basic_orientation(&self) -> Mat4 {
        self.basic_orientation
    }

    fn set_basic_orientation(&mut self, orientation: Mat4) {
        self.basic_orientation = orientation;
    }

    fn reset(&mut self) {
        self.angle = 0.0;
    }
}

impl Persistable for AxisSpin {
    fn persist(&self, out: &mut dyn Write) -> PersistResult<()> {
        out.write_vec3(self.axis)?;
        out.write_f32(self.angular_speed)?;
        out.write_f32(self.angle)?;
        out.write_mat4(&self.basic_orientation)
    }

    fn restore(&mut self, input: &mut dyn Read) -> PersistResult<()> {
        self.axis = unit_axis(input.read_vec3()?);
        self.angular_speed = input.read_f32()?;
        self.angle = input.read_f32()?;
        self.basic_orientation = input.read_mat4()?;
        Ok(())
    }
}

/// Sinusoidal tilt back and forth about an axis
#[derive(Debug, Clone, PartialEq)]
pub struct Wobble {
    axis: Vec3,
    /// Peak tilt (radians)
    amplitude: f32,
    /// Oscillations per time unit
    frequency: f32,
    /// Oscillation phase in [0, 2π)
    phase: f32,
    basic_orientation: Mat4,
}

impl Default for Wobble {
    fn default() -> Self {
        Self {
            axis: Vec3::X,
            amplitude: 0.0,
            frequency: 0.0,
            phase: 0.0,
            basic_orientation: Mat4::IDENTITY,
        }
    }
}

impl Wobble {
    pub fn new(axis: Vec3, amplitude: f32, frequency: f32) -> Self {
        Self {
            axis: unit_axis(axis),
            amplitude,
            frequency,
            phase: 0.0,
            basic_orientation: Mat4::IDENTITY,
        }
    }

    /// Current tilt angle
    pub fn tilt(&self) -> f32 {
        self.amplitude * self.phase.sin()
    }
}

impl SatelliteTransformation for Wobble {
    fn tag(&self) -> &'static str {
        WOBBLE_TAG
    }

    fn update(&mut self, dt: f32) {
        self.phase = (self.phase + self.frequency * TAU * dt).rem_euclid(TAU);
    }

    fn transform(&self) -> Mat4 {
        self.basic_orientation * Mat4::from_axis_angle(self.axis, self.tilt())
    }

    fn basic_orientation(&self) -> Mat4 {
        self.basic_orientation
    }

    fn set_basic_orientation(&mut self, orientation: Mat4) {
        self.basic_orientation = orientation;
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

impl Persistable for Wobble {
    fn persist(&self, out: &mut dyn Write) -> PersistResult<()> {
        out.write_vec3(self.axis)?;
        out.write_f32(self.amplitude)?;
        out.write_f32(self.frequency)?;
        out.write_f32(self.phase)?;
        out.write_mat4(&self.basic_orientation)
    }

    fn restore(&mut self, input: &mut dyn Read) -> PersistResult<()> {
        self.axis = unit_axis(input.read_vec3()?);
        self.amplitude = input.read_f32()?;
        self.frequency = input.read_f32()?;
        self.phase = input.read_f32()?;
        self.basic_orientation = input.read_mat4()?;
        Ok(())
    }
}
