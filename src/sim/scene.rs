//! Scene: every moving body of one game
//!
//! The scene is owned by the logic worker. Rendering only sees the
//! transforms it publishes after each tick.

use std::io::{Read, Write};

use glam::Mat4;

use super::motion::MotionVariant;
use crate::config::UniverseConfig;
use crate::persistence::{PersistError, PersistResult, ReadExt, WriteExt};

/// Ordered collection of motions sharing one universe configuration
#[derive(Debug, Default)]
pub struct Scene {
    config: UniverseConfig,
    motions: Vec<MotionVariant>,
}

impl Scene {
    pub fn new(config: UniverseConfig) -> Self {
        Self {
            config,
            motions: Vec::new(),
        }
    }

    pub fn config(&self) -> &UniverseConfig {
        &self.config
    }

    /// Add a motion, returning its index
    pub fn push(&mut self, motion: impl Into<MotionVariant>) -> usize {
        self.motions.push(motion.into());
        self.motions.len() - 1
    }

    pub fn len(&self) -> usize {
        self.motions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MotionVariant> {
        self.motions.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut MotionVariant> {
        self.motions.get_mut(index)
    }

    pub fn motions(&self) -> &[MotionVariant] {
        &self.motions
    }

    /// Advance every motion by `dt`
    pub fn update(&mut self, dt: f32) {
        for motion in &mut self.motions {
            motion.as_motion_mut().update(dt);
        }
    }

    /// Current transforms, in insertion order
    pub fn transforms(&self) -> Vec<Mat4> {
        self.motions.iter().map(|m| m.as_motion().transform()).collect()
    }

    /// Fill `out` with the current transforms, reusing its allocation
    pub fn write_transforms(&self, out: &mut Vec<Mat4>) {
        out.clear();
        out.extend(self.motions.iter().map(|m| m.as_motion().transform()));
    }

    /// Move the satellite transformation of `from` onto `to`
    ///
    /// The behavior adopts the basic orientation of its new owner. Anything
    /// `to` carried before is dropped. Returns false when an index is out of
    /// range, the indices are equal or `from` has nothing to hand over.
    pub fn transfer_spin(&mut self, from: usize, to: usize) -> bool {
        if from == to || from >= self.motions.len() || to >= self.motions.len() {
            return false;
        }

        let Some(mut sat_trans) = self.motions[from].as_motion_mut().take_sat_trans() else {
            return false;
        };

        let target = self.motions[to].as_motion_mut();
        sat_trans.set_basic_orientation(target.basic_orientation());
        target.set_sat_trans(Some(sat_trans));
        true
    }

    /// Write the motion count followed by every tagged motion record
    pub fn persist(&self, out: &mut dyn Write) -> PersistResult<()> {
        let count = i32::try_from(self.motions.len()).map_err(|_| {
            PersistError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "too many motions for an i32 count",
            ))
        })?;
        out.write_i32(count)?;
        for motion in &self.motions {
            motion.persist_tagged(out)?;
        }
        log::info!("Saved scene with {} motions", count);
        Ok(())
    }

    /// Replace the motions with the ones stored in `input`
    ///
    /// On error the scene is left unchanged.
    pub fn restore(&mut self, input: &mut dyn Read) -> PersistResult<()> {
        let count = input.read_i32()?;
        if count < 0 {
            return Err(PersistError::NegativeCount(count));
        }

        let mut motions = Vec::with_capacity(count as usize);
        for i in 0..count {
            let motion = MotionVariant::restore_tagged(input, self.config)?;
            // spins are the last field of a motion record; only the final
            // motion can drop one without misaligning the stream
            if let Some(tag) = motion.unknown_spin() {
                if i + 1 < count {
                    return Err(PersistError::UnknownSpin(tag.to_owned()));
                }
            }
            motions.push(motion);
        }
        self.motions = motions;
        log::info!("Restored scene with {} motions", count);
        Ok(())
    }
}
