//! Logic and render workers in lockstep
//!
//! The logic worker owns the [`Scene`] for as long as it runs and publishes
//! the transforms of every tick into a [`FrameHandoff`]. The render worker
//! only ever sees the published transforms, after `wait_for_logic` returned.
//! Pausing goes through [`Synchronizer::set_active`]; the logic worker hands
//! the scene back through its join handle.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use glam::Mat4;
use parking_lot::Mutex;

use crate::sim::Scene;
use crate::sync::Synchronizer;

/// Transforms of the last finished logic tick
#[derive(Debug, Default)]
pub struct FrameHandoff {
    transforms: Mutex<Vec<Mat4>>,
}

impl FrameHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the frame with the current transforms of `scene`
    pub fn publish(&self, scene: &Scene) {
        scene.write_transforms(&mut self.transforms.lock());
    }

    /// Borrow the frame for the duration of `f`
    pub fn read<R>(&self, f: impl FnOnce(&[Mat4]) -> R) -> R {
        f(&self.transforms.lock())
    }

    pub fn snapshot(&self) -> Vec<Mat4> {
        self.transforms.lock().clone()
    }
}

/// Start the logic loop on its own thread
pub fn spawn_logic_worker(
    sync: Arc<Synchronizer>,
    scene: Scene,
    handoff: Arc<FrameHandoff>,
    dt: f32,
) -> JoinHandle<Scene> {
    spawn_logic_worker_with(sync, scene, handoff, dt, |_, _| {})
}

/// Start the logic loop; `before_tick` runs on the logic thread ahead of
/// every `Scene::update` and is the only place input may touch the motions
pub fn spawn_logic_worker_with<F>(
    sync: Arc<Synchronizer>,
    mut scene: Scene,
    handoff: Arc<FrameHandoff>,
    dt: f32,
    mut before_tick: F,
) -> JoinHandle<Scene>
where
    F: FnMut(&mut Scene, u64) + Send + 'static,
{
    thread::spawn(move || {
        log::info!("Logic worker started ({} motions, dt {})", scene.len(), dt);
        let mut tick = 0u64;
        loop {
            sync.wait_for_pre_render();
            if !sync.is_running() {
                break;
            }

            before_tick(&mut scene, tick);
            scene.update(dt);
            handoff.publish(&scene);
            sync.logic_done();
            tick += 1;
        }
        sync.logic_thread_finished();
        log::info!("Logic worker stopped after {} ticks", tick);
        scene
    })
}

/// One render step: wait for logic, consume the frame, release logic
pub fn render_frame<R>(
    sync: &Synchronizer,
    handoff: &FrameHandoff,
    sink: impl FnOnce(&[Mat4]) -> R,
) -> R {
    sync.wait_for_logic();
    let result = handoff.read(sink);
    sync.pre_render_done();
    result
}

/// Render until paused, then render one last frame so the pause can drain
///
/// The last frame does not wait for logic: `wait_for_logic` returns at once
/// when not running, so the counters may briefly sit two frames apart while
/// logic finishes its tick. Lockstep only holds while the synchronizer runs.
///
/// Returns the number of frames handed to `sink`.
pub fn spawn_render_worker<F>(
    sync: Arc<Synchronizer>,
    handoff: Arc<FrameHandoff>,
    mut sink: F,
) -> JoinHandle<u64>
where
    F: FnMut(&[Mat4]) + Send + 'static,
{
    thread::spawn(move || {
        log::info!("Render worker started");
        let mut frames = 0u64;
        while sync.is_running() {
            render_frame(&sync, &handoff, &mut sink);
            frames += 1;
        }
        render_frame(&sync, &handoff, &mut sink);
        frames += 1;
        log::info!("Render worker stopped after {} frames", frames);
        frames
    })
}
