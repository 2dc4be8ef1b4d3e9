//! Elliptic orbit with live reshaping
//!
//! The orbit is an ellipse around `center_pos`:
//! - `center_vec` (main axis): from the center to the u=0 point
//! - `direction_vec` (secondary axis): encodes the iteration sense
//! - `normal_vec`: unit normal of the orbit plane, the only rotation axis
//!
//! Shape, speed and direction-vector rotation change through linear eases
//! that run independently of each other. A new request overwrites the running
//! one (no queuing). Impulses re-anchor the ellipse at the current position so
//! the body never jumps.

use std::f32::consts::{FRAC_PI_2, TAU};
use std::io::{Read, Write};

use glam::{Mat4, Quat, Vec3};

use super::ellipse::Ellipse;
use super::motion::{CollisionFlags, Motion, compose_transform};
use super::satellite::{self, SatelliteTransformation};
use crate::config::UniverseConfig;
use crate::persistence::{PersistResult, Persistable, ReadExt, WriteExt};

/// Number of unit-time steps a scheduled ease is divided into
pub const EASE_STEPS: f32 = 100.0;
/// Remaining change below which an ease snaps onto its target
///
/// Axis scaling compares ratios against it, so its last step may jump by up
/// to 1% of the axis length. Speed and rotation compare absolute amounts.
pub const EASE_EPSILON: f32 = 1e-2;

/// Linear ease of one axis length, as a ratio of the reference vector
#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisScale {
    /// Final ratio
    target: f32,
    /// Ratio change per time unit (before `rate`)
    step: f32,
    /// Current ratio
    current: f32,
    /// Rate multiplier
    rate: f32,
}

impl AxisScale {
    const IDLE: Self = Self {
        target: 1.0,
        step: 0.0,
        current: 1.0,
        rate: 0.0,
    };

    fn schedule(&mut self, factor: f32, rate: f32) {
        self.rate = rate;
        self.target = factor;
        self.step = (factor - 1.0) / EASE_STEPS;
        self.current = 1.0;
    }

    fn is_active(&self) -> bool {
        if self.step < 0.0 {
            self.target < self.current
        } else {
            self.target > self.current
        }
    }

    /// Stop at the current ratio
    fn freeze(&mut self) {
        self.target = self.current;
    }

    /// Returns true when the ratio was advanced this tick
    fn advance(&mut self, dt: f32) -> bool {
        if !self.is_active() {
            return false;
        }

        let mut iteration = self.step * dt * self.rate;
        let overshoots = if self.step < 0.0 {
            self.current + iteration < self.target
        } else {
            self.current + iteration > self.target
        };
        if overshoots {
            iteration = self.target - self.current;
        }
        self.current += iteration;

        if (self.target - self.current).abs() < EASE_EPSILON {
            self.current = self.target;
        }
        true
    }
}

/// Linear ease of the orbit speed
#[derive(Debug, Clone, Copy, PartialEq)]
struct SpeedMorph {
    /// Reference speed the ease runs towards
    target: f32,
    /// Speed change per time unit (before `dynamic_rate`)
    step: f32,
    /// Remaining magnitude of change; 0 = idle
    remaining: f32,
    /// Caller-supplied rate multiplier
    dynamic_rate: f32,
}

impl SpeedMorph {
    fn idle(speed: f32) -> Self {
        Self {
            target: speed,
            step: 0.0,
            remaining: 0.0,
            dynamic_rate: 1.0,
        }
    }

    fn advance(&mut self, speed: &mut f32, dt: f32) {
        if self.remaining <= 0.0 {
            return;
        }

        let iteration = self.step * dt * self.dynamic_rate;
        let overshoots = if self.step < 0.0 {
            *speed + iteration < self.target
        } else {
            *speed + iteration > self.target
        };
        if overshoots {
            *speed = self.target;
        } else {
            *speed += iteration;
        }

        self.remaining -= iteration.abs();
        if self.remaining < EASE_EPSILON {
            self.remaining = 0.0;
            *speed = self.target;
        }
    }
}

/// Rotation of the direction vector about the orbit normal
#[derive(Debug, Clone, Copy, PartialEq)]
struct DirRotation {
    /// Remaining angle (radians, >= 0); 0 = idle
    remaining: f32,
    /// Signed angle per time unit
    step: f32,
}

impl DirRotation {
    const IDLE: Self = Self {
        remaining: 0.0,
        step: 0.0,
    };

    /// Signed angle to rotate by this tick, if any
    fn advance(&mut self, dt: f32) -> Option<f32> {
        if self.remaining <= 0.0 {
            return None;
        }

        let sign = if self.step < 0.0 { -1.0 } else { 1.0 };
        let mut iteration = self.step * dt;
        if self.remaining - iteration.abs() < 0.0 {
            iteration = sign * self.remaining;
        }
        self.remaining -= iteration.abs();

        if self.remaining < EASE_EPSILON {
            iteration += sign * self.remaining;
            self.remaining = 0.0;
        }
        (iteration != 0.0).then_some(iteration)
    }
}

/// Elliptic motion around a center point
#[derive(Debug)]
pub struct Orbit {
    config: UniverseConfig,

    /// Iteration speed (arc length per time unit, roughly)
    speed: f32,
    /// Ellipse parameter in [0, 2π)
    u: f32,
    /// Parameter increment per unit of speed and time (2π / perimeter)
    step: f32,

    a_scale: AxisScale,
    b_scale: AxisScale,
    /// Main axis at the start of the running axis scaling
    ref_center_vec: Vec3,
    /// Secondary axis at the start of the running axis scaling
    ref_direction_vec: Vec3,

    speed_morph: SpeedMorph,
    rotation: DirRotation,

    /// Current position on the ellipse
    position: Vec3,
    /// Position at u=0
    entity_pos: Vec3,
    /// center = center_pos, a = center_vec, b = direction_vec
    ellipse: Ellipse,
    normal_vec: Vec3,

    transform: Mat4,
    basic_orientation: Mat4,
    sat_trans: Option<Box<dyn SatelliteTransformation>>,
    /// Tag of a transformation the last restore could not resolve
    unknown_spin: Option<String>,
    flags: CollisionFlags,
}

impl Orbit {
    /// Create an orbit starting at `entity_pos`
    ///
    /// `direction_vec` is the secondary axis; its side of the main axis picks
    /// the iteration sense. Out-of-band axes and speeds are eased back into the
    /// universe limits right away.
    pub fn new(
        entity_pos: Vec3,
        center_pos: Vec3,
        direction_vec: Vec3,
        speed: f32,
        basic_orientation: Mat4,
        config: UniverseConfig,
    ) -> Self {
        let mut orbit = Self::empty(config);
        orbit.reconfigure(entity_pos, center_pos, direction_vec, speed, basic_orientation);
        orbit
    }

    /// Blank orbit, the target of `restore`
    pub fn empty(config: UniverseConfig) -> Self {
        Self {
            config,
            speed: 0.0,
            u: 0.0,
            step: 0.0,
            a_scale: AxisScale::IDLE,
            b_scale: AxisScale::IDLE,
            ref_center_vec: Vec3::ZERO,
            ref_direction_vec: Vec3::ZERO,
            speed_morph: SpeedMorph::idle(0.0),
            rotation: DirRotation::IDLE,
            position: Vec3::ZERO,
            entity_pos: Vec3::ZERO,
            ellipse: Ellipse::default(),
            normal_vec: Vec3::Z,
            transform: Mat4::IDENTITY,
            basic_orientation: Mat4::IDENTITY,
            sat_trans: None,
            unknown_spin: None,
            flags: CollisionFlags::default(),
        }
    }

    /// Reuse this orbit for a new path; running eases are dropped, the
    /// satellite transformation and collision flags are kept
    pub fn reconfigure(
        &mut self,
        entity_pos: Vec3,
        center_pos: Vec3,
        direction_vec: Vec3,
        speed: f32,
        basic_orientation: Mat4,
    ) {
        self.speed = speed;
        self.speed_morph = SpeedMorph::idle(speed);
        self.a_scale = AxisScale::IDLE;
        self.b_scale = AxisScale::IDLE;
        self.rotation = DirRotation::IDLE;
        self.u = 0.0;

        self.entity_pos = entity_pos;
        self.ellipse = Ellipse::new(center_pos, entity_pos - center_pos, direction_vec);
        self.ref_center_vec = self.ellipse.a;
        self.ref_direction_vec = self.ellipse.b;
        self.basic_orientation = basic_orientation;
        self.update_normal();

        self.step = TAU / self.ellipse.perimeter();
        self.limit_universe();
        self.evaluate_pos();
    }

    pub fn config(&self) -> &UniverseConfig {
        &self.config
    }

    pub fn u(&self) -> f32 {
        self.u
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Tag of a satellite transformation dropped by the last restore
    pub fn unknown_spin(&self) -> Option<&str> {
        self.unknown_spin.as_deref()
    }

    pub fn entity_pos(&self) -> Vec3 {
        self.entity_pos
    }

    pub fn center_pos(&self) -> Vec3 {
        self.ellipse.center
    }

    pub fn center_vec(&self) -> Vec3 {
        self.ellipse.a
    }

    pub fn direction_vec(&self) -> Vec3 {
        self.ellipse.b
    }

    pub fn normal_vec(&self) -> Vec3 {
        self.normal_vec
    }

    pub fn ellipse(&self) -> &Ellipse {
        &self.ellipse
    }

    /// Speed the running (or last) speed ease aims for
    pub fn target_speed(&self) -> f32 {
        self.speed_morph.target
    }

    pub fn is_scaling(&self) -> bool {
        self.a_scale.is_active() || self.b_scale.is_active()
    }

    pub fn is_speed_morphing(&self) -> bool {
        self.speed_morph.remaining > 0.0
    }

    pub fn is_rotating(&self) -> bool {
        self.rotation.remaining > 0.0
    }

    /// Target axis ratios of the axis scaling (main, secondary)
    pub fn axis_scale_targets(&self) -> (f32, f32) {
        (self.a_scale.target, self.b_scale.target)
    }

    /// Ease both axis lengths linearly to `a_factor`/`b_factor` times their
    /// current length (1 = no change)
    pub fn morph_axis_scale(&mut self, a_factor: f32, b_factor: f32, a_rate: f32, b_rate: f32) {
        self.ref_center_vec = self.ellipse.a;
        self.ref_direction_vec = self.ellipse.b;
        self.a_scale.schedule(a_factor, a_rate);
        self.b_scale.schedule(b_factor, b_rate);
    }

    /// Ease the speed linearly to `target`
    ///
    /// The target is clamped into `[orbit_min_speed, temp_max_speed]`.
    /// `dynamic_rate` multiplies the ease rate.
    pub fn morph_speed(&mut self, target: f32, dynamic_rate: f32) {
        let target = target
            .max(self.config.orbit_min_speed)
            .min(self.config.temp_max_speed());

        self.speed_morph = SpeedMorph {
            target,
            step: (target - self.speed) / EASE_STEPS,
            remaining: (target - self.speed).abs(),
            dynamic_rate,
        };
    }

    /// Rotate the direction vector about the orbit normal by `angle`
    ///
    /// The pacing is fixed (`dir_rotation_step` per time unit), so larger
    /// angles take proportionally longer.
    pub fn rotate_direction_vec(&mut self, angle: f32) {
        let pace = self.config.dir_rotation_step;
        self.rotation = DirRotation {
            remaining: angle.abs(),
            step: if angle < 0.0 { -pace } else { pace },
        };
    }

    /// Ease axis lengths and speed back into the universe limits
    pub fn limit_universe(&mut self) {
        let config = self.config;
        let center_len = self.ellipse.a.length();
        let dir_len = self.ellipse.b.length();

        let mut center_cap = 1.0;
        let mut dir_cap = 1.0;

        if center_len == 0.0 || dir_len == 0.0 {
            log::warn!("zero-length orbit axis, cannot rescale");
        } else {
            if center_len > config.universe_center_length_limit
                || center_len < config.forcefield_center_length_limit
            {
                center_cap = config.forcefield_new_center_length / center_len;
            }
            if dir_len > config.universe_dir_length_limit
                || dir_len < config.forcefield_dir_length_limit
            {
                dir_cap = config.forcefield_new_dir_length / dir_len;
            }
        }

        if center_cap != 1.0 || dir_cap != 1.0 {
            log::debug!(
                "limit axes: center {:.2} (x{:.3}), direction {:.2} (x{:.3})",
                center_len,
                center_cap,
                dir_len,
                dir_cap
            );
            self.morph_axis_scale(
                center_cap,
                dir_cap,
                config.forcefield_center_scale_speed,
                config.forcefield_dir_scale_speed,
            );
        }

        if self.speed_morph.target > config.universe_speed_limit {
            log::debug!(
                "limit speed: {:.2} -> {:.2}",
                self.speed_morph.target,
                config.universe_speed_limit
            );
            self.morph_speed(config.universe_speed_limit, 1.0);
        }
    }

    /// Unit normal from the current axes; keeps the previous normal when the
    /// axes are parallel
    fn update_normal(&mut self) {
        match self.ellipse.a.cross(self.ellipse.b).try_normalize() {
            Some(normal) => self.normal_vec = normal,
            None => log::warn!(
                "degenerate orbit plane (center {:?}, direction {:?}), keeping normal {:?}",
                self.ellipse.a,
                self.ellipse.b,
                self.normal_vec
            ),
        }
    }

    /// Keep one revolution at one unit of speed after the axes changed
    fn update_step_size(&mut self) {
        self.step = TAU / self.ellipse.recalc_perimeter();
    }

    fn update_axis_scaling(&mut self, dt: f32) {
        let center_scaled = self.a_scale.advance(dt);
        if center_scaled {
            self.ellipse.a = self.ref_center_vec * self.a_scale.current;
        }

        let direction_scaled = self.b_scale.advance(dt);
        if direction_scaled {
            self.ellipse.b = self.ref_direction_vec * self.b_scale.current;
        }

        if center_scaled || direction_scaled {
            self.update_step_size();
        }
    }

    fn update_dir_rotation(&mut self, dt: f32) {
        if let Some(angle) = self.rotation.advance(dt) {
            let rotation = Quat::from_axis_angle(self.normal_vec, angle);
            self.ellipse.b = rotation * self.ellipse.b;
            // the axis scaling reference has to follow
            self.ref_direction_vec = rotation * self.ref_direction_vec;
        }
    }

    fn evaluate_pos(&mut self) {
        self.position = self.ellipse.point_at(self.u);
        self.transform = compose_transform(self.basic_orientation, self.sat_trans.as_deref(), self.position);
    }

    /// Normalized heading, approximated one step ahead on the ellipse
    fn tangent(&self) -> Vec3 {
        (self.ellipse.point_at(self.u + self.step) - self.position).normalize_or_zero()
    }

    /// Speed after adding `impulse` to the current velocity, before the
    /// universe limits apply
    fn provisional_speed(&self, impulse: Vec3) -> f32 {
        (self.tangent() * self.speed + impulse).length()
    }
}

impl Motion for Orbit {
    fn update(&mut self, dt: f32) {
        self.u += self.speed * self.step * dt;
        if self.u >= TAU {
            // one subtraction for normal ticks, more for oversized ones
            self.u %= TAU;
        }

        if let Some(sat_trans) = self.sat_trans.as_mut() {
            sat_trans.update(dt);
        }

        self.speed_morph.advance(&mut self.speed, dt);
        self.update_axis_scaling(dt);
        self.update_dir_rotation(dt);

        self.evaluate_pos();
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
        self.ellipse.point_at(self.u + self.step) - self.position
    }

    fn morph(&mut self, impulse: Vec3) {
        log::debug!("morph orbit: impulse {:?} at {:?}", impulse, self.position);

        self.a_scale.freeze();
        self.b_scale.freeze();
        let rotation_in_progress = self.rotation.remaining != 0.0;

        let tangent = self.tangent();
        self.speed_morph.target = self.provisional_speed(impulse);
        let direction_vec = tangent * self.ellipse.b.length() + impulse;

        // re-anchor: the current position becomes u=0
        self.entity_pos = self.position;
        self.ellipse.b = direction_vec;
        self.ellipse.a = self.entity_pos - self.ellipse.center;
        self.update_normal();

        self.limit_universe();

        if rotation_in_progress {
            let angle = self
                .ellipse
                .a
                .normalize_or_zero()
                .angle_between(self.ellipse.b.normalize_or_zero());
            let angle = if angle.is_nan() { 0.0 } else { FRAC_PI_2 - angle };
            self.rotate_direction_vec(angle);
            log::debug!("direction rotation re-targeted: {:.2} deg", angle.to_degrees());
        }

        self.update_step_size();
        self.u = 0.0;

        // kick: snaps faster the larger the change
        let push = impulse.length() * self.config.orbit_speed_morph_push_factor;
        let dynamic_factor = self.config.orbit_dynamic_speed_factor;
        let provisional = self.speed_morph.target;
        if provisional < self.speed {
            self.morph_speed(self.speed - push, (provisional / self.speed) * dynamic_factor);
        } else if provisional > 0.0 && self.speed > 0.0 {
            self.morph_speed(self.speed + push, (self.speed / provisional) * dynamic_factor);
        } else {
            self.morph_speed(self.speed + push, dynamic_factor);
        }
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

impl Persistable for Orbit {
    fn persist(&self, out: &mut dyn Write) -> PersistResult<()> {
        out.write_f32(self.speed)?;
        out.write_f32(self.u)?;
        out.write_f32(self.step)?;

        // axis scaling
        out.write_f32(self.a_scale.rate)?;
        out.write_f32(self.b_scale.rate)?;
        out.write_f32(self.a_scale.target)?;
        out.write_f32(self.a_scale.step)?;
        out.write_f32(self.a_scale.current)?;
        out.write_f32(self.b_scale.target)?;
        out.write_f32(self.b_scale.step)?;
        out.write_f32(self.b_scale.current)?;
        out.write_vec3(self.ref_center_vec)?;
        out.write_vec3(self.ref_direction_vec)?;

        // speed morphing
        out.write_f32(self.speed_morph.target)?;
        out.write_f32(self.speed_morph.step)?;
        out.write_f32(self.speed_morph.remaining)?;
        out.write_f32(self.speed_morph.dynamic_rate)?;

        // direction vector rotation
        out.write_f32(self.rotation.remaining)?;
        out.write_f32(self.rotation.step)?;

        out.write_vec3(self.ellipse.center)?;
        out.write_vec3(self.ellipse.a)?;
        out.write_vec3(self.ellipse.b)?;
        out.write_vec3(self.normal_vec)?;
        out.write_mat4(&self.basic_orientation)?;

        self.flags.persist(out)?;
        satellite::persist_optional(self.sat_trans.as_deref(), out)
    }

    fn restore(&mut self, input: &mut dyn Read) -> PersistResult<()> {
        self.speed = input.read_f32()?;
        self.u = input.read_f32()?;
        self.step = input.read_f32()?;

        self.a_scale.rate = input.read_f32()?;
        self.b_scale.rate = input.read_f32()?;
        self.a_scale.target = input.read_f32()?;
        self.a_scale.step = input.read_f32()?;
        self.a_scale.current = input.read_f32()?;
        self.b_scale.target = input.read_f32()?;
        self.b_scale.step = input.read_f32()?;
        self.b_scale.current = input.read_f32()?;
        self.ref_center_vec = input.read_vec3()?;
        self.ref_direction_vec = input.read_vec3()?;

        self.speed_morph.target = input.read_f32()?;
        self.speed_morph.step = input.read_f32()?;
        self.speed_morph.remaining = input.read_f32()?;
        self.speed_morph.dynamic_rate = input.read_f32()?;

        self.rotation.remaining = input.read_f32()?;
        self.rotation.step = input.read_f32()?;

        let center_pos = input.read_vec3()?;
        let center_vec = input.read_vec3()?;
        let direction_vec = input.read_vec3()?;
        self.normal_vec = input.read_vec3()?;
        self.basic_orientation = input.read_mat4()?;

        self.flags.restore(input)?;
        let spin = satellite::restore_spin(input)?;
        self.unknown_spin = spin.unknown_tag().map(str::to_owned);
        self.sat_trans = spin.into_transformation();

        // the ellipse is never stored, rebuild it from the axes
        self.ellipse = Ellipse::new(center_pos, center_vec, direction_vec);
        self.entity_pos = center_pos + center_vec;
        self.evaluate_pos();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::to_bytes;
    use crate::sim::satellite::AxisSpin;
    use std::io::Cursor;

    fn config() -> UniverseConfig {
        UniverseConfig::default()
    }

    /// Circular orbit of radius 15 in the XY plane, counter-clockwise
    fn circle(speed: f32) -> Orbit {
        Orbit::new(
            Vec3::new(15.0, 0.0, 0.0),
            Vec3::ZERO,
            Vec3::new(0.0, 15.0, 0.0),
            speed,
            Mat4::IDENTITY,
            config(),
        )
    }

    fn run(orbit: &mut Orbit, ticks: usize, dt: f32) {
        for _ in 0..ticks {
            orbit.update(dt);
        }
    }

    #[test]
    fn test_new_orbit_starts_at_entity_pos() {
        let orbit = circle(2.0);
        assert!((orbit.position() - Vec3::new(15.0, 0.0, 0.0)).length() < 1e-5);
        assert_eq!(orbit.transform().w_axis.truncate(), orbit.position());
        assert!((orbit.normal_vec() - Vec3::Z).length() < 1e-6);
        assert!((orbit.step() - TAU / (TAU * 15.0)).abs() < 1e-5);
        assert!(!orbit.is_scaling());
        assert!(!orbit.is_speed_morphing());
    }

    #[test]
    fn test_update_moves_counter_clockwise() {
        let mut orbit = circle(2.0);
        orbit.update(1.0);
        assert!(orbit.position().y > 0.0);
        assert!((orbit.position().length() - 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_full_revolution_returns_to_start() {
        let mut orbit = circle(3.0);
        let start = orbit.position();
        // speed * step * dt = 2π over 100 ticks
        let dt = TAU / (orbit.speed() * orbit.step()) / 100.0;
        run(&mut orbit, 100, dt);
        assert!(orbit.u() < 1e-3 || (TAU - orbit.u()) < 1e-3);
        assert!((orbit.position() - start).length() < 1e-2);
    }

    #[test]
    fn test_u_wraps_once() {
        let mut orbit = circle(5.0);
        for _ in 0..500 {
            orbit.update(0.37);
            assert!(orbit.u() >= 0.0 && orbit.u() < TAU);
        }
    }

    #[test]
    fn test_update_zero_is_idempotent() {
        let mut orbit = circle(2.0);
        orbit.update(0.5);
        let before = orbit.transform();
        let u = orbit.u();
        orbit.update(0.0);
        orbit.update(0.0);
        assert_eq!(orbit.u(), u);
        assert_eq!(orbit.transform(), before);
    }

    #[test]
    fn test_oversized_orbit_schedules_scaling() {
        let mut orbit = Orbit::new(
            Vec3::new(40.0, 0.0, 0.0),
            Vec3::ZERO,
            Vec3::new(0.0, 5.0, 0.0),
            1.0,
            Mat4::IDENTITY,
            config(),
        );
        assert!(orbit.is_scaling());
        let (a, b) = orbit.axis_scale_targets();
        assert!((a - 15.0 / 40.0).abs() < 1e-6);
        assert!((b - 15.0 / 5.0).abs() < 1e-6);

        run(&mut orbit, 2000, 0.05);
        assert!(!orbit.is_scaling());
        assert!((orbit.center_vec().length() - 15.0).abs() < 0.2);
        assert!((orbit.direction_vec().length() - 15.0).abs() < 0.2);
        // step follows the perimeter
        assert!((orbit.step() - TAU / orbit.ellipse().perimeter()).abs() < 1e-6);
    }

    #[test]
    fn test_speed_over_ceiling_is_eased_down() {
        let mut orbit = circle(12.0);
        assert!(orbit.is_speed_morphing());
        assert_eq!(orbit.target_speed(), 7.5);

        run(&mut orbit, 5000, 0.1);
        assert!(!orbit.is_speed_morphing());
        assert_eq!(orbit.speed(), 7.5);
    }

    #[test]
    fn test_morph_speed_clamps_target() {
        let mut orbit = circle(2.0);
        orbit.morph_speed(100.0, 1.0);
        assert_eq!(orbit.target_speed(), config().temp_max_speed());
        orbit.morph_speed(-3.0, 1.0);
        assert_eq!(orbit.target_speed(), config().orbit_min_speed);
    }

    #[test]
    fn test_speed_ease_never_overshoots() {
        let mut orbit = circle(2.0);
        orbit.morph_speed(6.0, 50.0);
        let mut last = orbit.speed();
        while orbit.is_speed_morphing() {
            orbit.update(0.1);
            assert!(orbit.speed() >= last);
            assert!(orbit.speed() <= 6.0);
            last = orbit.speed();
        }
        assert_eq!(orbit.speed(), 6.0);
    }

    #[test]
    fn test_morph_keeps_position() {
        let mut orbit = circle(2.0);
        run(&mut orbit, 17, 0.3);
        let before = orbit.position();
        let transform = orbit.transform();

        orbit.morph(Vec3::new(-3.0, 1.0, 0.5));

        assert_eq!(orbit.position(), before);
        assert_eq!(orbit.entity_pos(), before);
        assert_eq!(orbit.transform(), transform);
        assert_eq!(orbit.u(), 0.0);
        assert_eq!(orbit.center_vec(), before - orbit.center_pos());

        // next tick starts from the same point on the new ellipse
        orbit.update(0.0);
        assert!((orbit.position() - before).length() < 1e-4);
    }

    #[test]
    fn test_morph_speed_follows_impulse() {
        let mut orbit = circle(4.0);
        run(&mut orbit, 5, 0.1);
        let speed = orbit.speed();
        let impulse = orbit.curr_direction_vec().normalize() * 2.0;

        orbit.morph(impulse);

        // pushed along the heading: speed rises by push factor * |impulse|
        let expected = speed + 2.0 * config().orbit_speed_morph_push_factor;
        assert!((orbit.target_speed() - expected).abs() < 1e-4);
        assert!(orbit.is_speed_morphing());
    }

    #[test]
    fn test_provisional_speed_adds_impulse_to_velocity() {
        let mut orbit = circle(4.0);
        run(&mut orbit, 5, 0.1);
        let heading = orbit.tangent();
        let impulse = heading.cross(orbit.normal_vec()) * 3.0;
        assert!(heading.dot(impulse).abs() < 1e-4);

        // perpendicular kick: |v + i| = sqrt(|v|² + |i|²)
        let provisional = orbit.provisional_speed(impulse);
        assert!((provisional - 5.0).abs() < 1e-3);

        let impulse = impulse + Vec3::new(0.0, 0.0, 1.5);
        let expected = (heading * 4.0 + impulse).length();
        let provisional = orbit.provisional_speed(impulse);
        assert!((provisional - expected).abs() < 1e-5);

        // the kick rate is derived from the provisional speed
        orbit.morph(impulse);
        let dynamic_factor = config().orbit_dynamic_speed_factor;
        let expected_rate = (4.0 / provisional) * dynamic_factor;
        assert!((orbit.speed_morph.dynamic_rate - expected_rate).abs() < 1e-3);
    }

    #[test]
    fn test_morph_from_standstill_reaches_min_speed() {
        let mut orbit = circle(0.0);
        orbit.morph(Vec3::new(0.0, 2.0, 0.0));
        assert!(orbit.is_speed_morphing());
        assert!(orbit.speed_morph.dynamic_rate > 0.0);

        run(&mut orbit, 1000, 0.1);
        assert!(!orbit.is_speed_morphing());
        assert!(orbit.speed() >= config().orbit_min_speed);
        assert!(orbit.speed() <= config().temp_max_speed());
    }

    #[test]
    fn test_morph_against_heading_slows_down() {
        let mut orbit = circle(4.0);
        run(&mut orbit, 5, 0.1);
        let impulse = -orbit.curr_direction_vec().normalize() * 2.0;
        orbit.morph(impulse);
        assert!(orbit.target_speed() < 4.0);
        assert!(orbit.target_speed() >= config().orbit_min_speed);
    }

    #[test]
    fn test_rotation_reaches_perpendicular_axes() {
        let mut orbit = Orbit::new(
            Vec3::new(15.0, 0.0, 0.0),
            Vec3::ZERO,
            Vec3::new(10.0, 10.0, 0.0).normalize() * 15.0,
            1.0,
            Mat4::IDENTITY,
            config(),
        );
        orbit.rotate_direction_vec(FRAC_PI_2 / 2.0);
        assert!(orbit.is_rotating());

        run(&mut orbit, 400, 0.05);
        assert!(!orbit.is_rotating());
        let angle = orbit.center_vec().angle_between(orbit.direction_vec());
        assert!((angle - FRAC_PI_2).abs() < 1e-3);
        assert!((orbit.direction_vec().length() - 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_morph_retargets_running_rotation() {
        let mut orbit = circle(2.0);
        orbit.rotate_direction_vec(0.5);
        run(&mut orbit, 3, 0.1);
        orbit.morph(Vec3::new(0.0, 0.0, 2.0));
        assert!(orbit.is_rotating() || {
            let angle = orbit.center_vec().angle_between(orbit.direction_vec());
            (angle - FRAC_PI_2).abs() < EASE_EPSILON
        });
    }

    #[test]
    fn test_morph_freezes_axis_scaling() {
        let mut orbit = Orbit::new(
            Vec3::new(30.0, 0.0, 0.0),
            Vec3::ZERO,
            Vec3::new(0.0, 15.0, 0.0),
            1.0,
            Mat4::IDENTITY,
            config(),
        );
        run(&mut orbit, 10, 0.01);
        let shrunk = orbit.center_vec().length();
        assert!(shrunk < 30.0);

        orbit.morph(Vec3::new(0.0, 0.001, 0.0));

        // the scaling restarts from the reached length, not from the original
        let center_len = orbit.center_vec().length();
        assert!(center_len < 30.0);
        let (a, _) = orbit.axis_scale_targets();
        assert!((a - 15.0 / center_len).abs() < 1e-5);
        assert!(orbit.is_scaling());
    }

    #[test]
    fn test_reconfigure_resets_transitions_keeps_spin() {
        let mut orbit = circle(12.0);
        orbit.set_sat_trans(Some(Box::new(AxisSpin::new(Vec3::Y, 1.0, Mat4::IDENTITY))));
        orbit.rotate_direction_vec(1.0);

        orbit.reconfigure(
            Vec3::new(0.0, 14.0, 0.0),
            Vec3::ZERO,
            Vec3::new(-14.0, 0.0, 0.0),
            2.0,
            Mat4::IDENTITY,
        );
        assert!(!orbit.is_rotating());
        assert!(!orbit.is_speed_morphing());
        assert_eq!(orbit.speed(), 2.0);
        assert!(orbit.sat_trans().is_some());
        assert!((orbit.position() - Vec3::new(0.0, 14.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_spin_is_composed_into_transform() {
        let mut orbit = circle(2.0);
        orbit.set_sat_trans(Some(Box::new(AxisSpin::new(Vec3::Z, 1.0, Mat4::IDENTITY))));
        orbit.update(0.5);
        let spin = orbit.sat_trans().unwrap().transform();
        let expected = Mat4::from_translation(orbit.position()) * spin;
        assert!(orbit.transform().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn test_persist_restore_mid_transition() {
        let mut orbit = Orbit::new(
            Vec3::new(35.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 8.0, 3.0),
            14.0,
            Mat4::from_rotation_x(0.3),
            config(),
        );
        orbit.set_sat_trans(Some(Box::new(AxisSpin::new(Vec3::X, 2.0, Mat4::IDENTITY))));
        orbit.rotate_direction_vec(0.8);
        orbit.flags_mut().inside_planet = true;
        run(&mut orbit, 7, 0.02);
        assert!(orbit.is_scaling() && orbit.is_speed_morphing() && orbit.is_rotating());

        let bytes = to_bytes(&orbit).unwrap();
        let mut restored = Orbit::empty(config());
        restored.restore(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(restored.flags(), orbit.flags());
        for _ in 0..5 {
            orbit.update(0.04);
            restored.update(0.04);
            assert_eq!(restored.transform(), orbit.transform());
        }
    }

    #[test]
    fn test_restore_truncated_stream_fails() {
        let orbit = circle(2.0);
        let bytes = to_bytes(&orbit).unwrap();
        let mut restored = Orbit::empty(config());
        let result = restored.restore(&mut Cursor::new(&bytes[..bytes.len() / 2]));
        assert!(result.is_err());
    }
}
