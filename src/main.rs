//! Satellite Orbits entry point
//!
//! Runs a seeded scene on a logic worker and a headless render worker,
//! knocks satellites around with random impulses, pauses, round-trips the
//! scene through a snapshot and resumes on the restored copy.
//!
//! Usage: `satellite-orbits [config.json]` (`RUST_LOG=debug` for morph traces)

use std::error::Error;
use std::f32::consts::TAU;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use glam::{Mat4, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use satellite_orbits::consts::*;
use satellite_orbits::runtime::{
    FrameHandoff, spawn_logic_worker, spawn_logic_worker_with, spawn_render_worker,
};
use satellite_orbits::sim::{
    AxisSpin, DirectionalMotion, DirectionalRole, Motion, Orbit, Scene, Wobble,
};
use satellite_orbits::{Synchronizer, UniverseConfig};

fn random_unit(rng: &mut Pcg32) -> Vec3 {
    Vec3::new(
        rng.random_range(-1.0f32..1.0),
        rng.random_range(-1.0f32..1.0),
        rng.random_range(-1.0f32..1.0),
    )
    .try_normalize()
    .unwrap_or(Vec3::Y)
}

/// Satellites on tilted orbits around the universe center, plus one planet
/// fragment drifting away
fn build_scene(config: UniverseConfig, rng: &mut Pcg32) -> Scene {
    let mut scene = Scene::new(config);
    let center = config.universe_center;

    for i in 0..DEMO_SATELLITES {
        let angle = i as f32 / DEMO_SATELLITES as f32 * TAU;
        let radius = rng.random_range(12.0f32..20.0);
        let offset = Vec3::new(angle.cos(), angle.sin(), rng.random_range(-0.3f32..0.3)) * radius;
        let direction = Vec3::Z.cross(offset).normalize_or_zero() * rng.random_range(12.0f32..20.0);
        let speed = rng.random_range(1.0f32..5.0);

        let mut orbit = Orbit::new(center + offset, center, direction, speed, Mat4::IDENTITY, config);
        if i % 2 == 0 {
            let spin = AxisSpin::from_impact(random_unit(rng), speed, config.satellite_speed_rotation_ratio);
            orbit.set_sat_trans(Some(Box::new(spin)));
        }
        scene.push(orbit);
    }

    let mut fragment = DirectionalMotion::new(
        center,
        random_unit(rng),
        0.8,
        Mat4::IDENTITY,
        DirectionalRole::Planet,
        config,
    );
    fragment.set_sat_trans(Some(Box::new(Wobble::new(Vec3::X, 0.4, 0.5))));
    scene.push(fragment);

    scene
}

fn log_scene(label: &str, scene: &Scene) {
    log::info!("{} ({} motions)", label, scene.len());
    for (i, motion) in scene.motions().iter().enumerate() {
        let m = motion.as_motion();
        log::info!(
            "  #{} {:<22} speed {:>5.2} at {:?}",
            i,
            motion.tag(),
            m.speed(),
            m.transform().w_axis.truncate()
        );
    }
}

fn wait_for_ticks(sync: &Synchronizer, ticks: i64) {
    while sync.frames().0 < ticks {
        thread::sleep(Duration::from_millis(1));
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    log::info!("Satellite Orbits starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => UniverseConfig::load(path)?,
        None => UniverseConfig::default(),
    };
    config.validate()?;

    let mut rng = Pcg32::seed_from_u64(DEMO_SEED);
    let scene = build_scene(config, &mut rng);
    log_scene("Initial scene", &scene);

    let sync = Arc::new(Synchronizer::new());
    let handoff = Arc::new(FrameHandoff::new());

    // Random hits, and once a satellite hands its spin to the fragment
    let fragment = scene.len() - 1;
    let impulses = move |scene: &mut Scene, tick: u64| {
        if tick == DEMO_TICKS as u64 / 2 && scene.transfer_spin(0, fragment) {
            log::info!("Tick {}: spin of #0 transferred to #{}", tick, fragment);
        }
        if rng.random_range(0..DEMO_IMPULSE_INTERVAL) != 0 || scene.is_empty() {
            return;
        }
        let target = rng.random_range(0..scene.len());
        let impulse = random_unit(&mut rng) * rng.random_range(0.5f32..4.0);
        if let Some(motion) = scene.get_mut(target) {
            log::debug!("Tick {}: impulse {:?} on #{}", tick, impulse, target);
            motion.as_motion_mut().morph(impulse);
        }
    };

    let logic = spawn_logic_worker_with(Arc::clone(&sync), scene, Arc::clone(&handoff), SIM_DT, impulses);
    let mut drawn = 0u64;
    let render = spawn_render_worker(Arc::clone(&sync), Arc::clone(&handoff), move |frame| {
        drawn += 1;
        if drawn % 120 == 0 {
            log::debug!("Frame {}: {} transforms", drawn, frame.len());
        }
    });

    wait_for_ticks(&sync, DEMO_TICKS);
    sync.set_active(false);
    let scene = logic.join().map_err(|_| "logic worker panicked")?;
    let frames = render.join().map_err(|_| "render worker panicked")?;
    log::info!("Paused after {} rendered frames", frames);
    log_scene("Paused scene", &scene);

    let mut snapshot = Vec::new();
    scene.persist(&mut snapshot)?;
    let mut restored = Scene::new(config);
    restored.restore(&mut Cursor::new(&snapshot))?;
    log::info!(
        "Snapshot of {} bytes restored (transforms match: {})",
        snapshot.len(),
        restored.transforms() == scene.transforms()
    );

    sync.set_active(true);
    sync.reset();
    let logic = spawn_logic_worker(Arc::clone(&sync), restored, Arc::clone(&handoff), SIM_DT);
    let render = spawn_render_worker(Arc::clone(&sync), Arc::clone(&handoff), |_| {});
    wait_for_ticks(&sync, DEMO_TICKS / 10);
    sync.set_active(false);
    let scene = logic.join().map_err(|_| "logic worker panicked")?;
    render.join().map_err(|_| "render worker panicked")?;
    log_scene("Resumed scene", &scene);

    Ok(())
}
