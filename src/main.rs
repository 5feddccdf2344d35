//! Arcade Dynamics demo driver
//!
//! Spawns a few stock cars on flat pavement, drives them with seeded
//! scripts for twenty simulated seconds and logs their state once a second.
//! Pass a settings JSON path as the first argument to override defaults.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Arcade Dynamics (native) starting...");

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Library-only on the web; nothing to drive here
}

/// Simulated seconds the demo runs for
#[cfg(not(target_arch = "wasm32"))]
const DEMO_SECONDS: f32 = 20.0;

#[cfg(not(target_arch = "wasm32"))]
fn run() -> arcade_dynamics::Result<()> {
    use arcade_dynamics::Settings;
    use arcade_dynamics::sim::{
        ControlScript, ControlSource, Controller, Controls, FlatGround, Simulation, SpawnRequest,
    };
    use glam::Vec3;

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let mut sim = Simulation::new(settings);
    let ground = FlatGround::pavement();

    let mut scripts = Vec::new();
    for (i, name) in ["Rocket", "Venom", "Crusher"].iter().enumerate() {
        let controller = if i == 0 {
            Controller::Human
        } else {
            Controller::Ai
        };
        let request = SpawnRequest::new(*name)
            .at(Vec3::new(0.0, i as f32 * 20.0, 0.0), 0.0)
            .controller(controller);
        sim.spawn(&request, &ground)?;
        scripts.push(ControlScript::wander(i as u64 + 1));
    }

    let dt = sim.settings().timestep;
    let ticks = (DEMO_SECONDS / dt).round() as u32;
    let report_every = (1.0 / dt).round().max(1.0) as u32;

    for tick in 0..ticks {
        let controls: Vec<Controls> = sim
            .snapshots()
            .iter()
            .zip(scripts.iter_mut())
            .map(|(snapshot, script)| script.sample(snapshot))
            .collect();
        sim.tick(&controls, &ground);

        if tick % report_every == 0 {
            for s in sim.snapshots() {
                log::info!(
                    "t={:5.1}s car {} {:>5.1} mph {:>5.0} rpm {:?} heading {:+.2}",
                    s.clock,
                    s.id.0,
                    s.mph,
                    s.engine_rpm,
                    s.gear,
                    s.heading
                );
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&sim.snapshots())?);
    Ok(())
}
