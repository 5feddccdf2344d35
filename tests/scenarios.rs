//! Whole-car driving scenarios on synthetic ground

use arcade_dynamics::Settings;
use arcade_dynamics::consts::{FRONT_LEFT, FRONT_RIGHT, NUM_WHEELS};
use arcade_dynamics::sim::{
    CarId, ControlScript, ControlSource, Controller, Controls, FlatGround, Gear, GearCommand,
    Simulation, SlipState, SpawnRequest, SurfaceCode, SurfaceContact, Transmission,
};
use glam::Vec3;

fn single(car: &str) -> (Simulation, CarId) {
    let mut sim = Simulation::new(Settings::default());
    let id = sim
        .spawn(&SpawnRequest::new(car), &FlatGround::pavement())
        .unwrap();
    (sim, id)
}

#[test]
fn standing_start_accelerates_smoothly() {
    let (mut sim, id) = single("Venom");
    let ground = FlatGround::pavement();
    let go = Controls {
        throttle: 1.0,
        ..Default::default()
    };

    let start = sim.snapshot(id).unwrap();
    assert_eq!(start.gear, Gear::Forward(1));
    let mut last_vx = start.body_velocity.x;
    let mut gears = vec![start.gear];

    for _ in 0..60 {
        sim.tick(&[go], &ground);
        let s = sim.snapshot(id).unwrap();
        assert!(
            s.body_velocity.x >= last_vx - 0.02,
            "forward speed dropped: {last_vx} -> {}",
            s.body_velocity.x
        );
        last_vx = s.body_velocity.x;
        if gears.last() != Some(&s.gear) {
            gears.push(s.gear);
        }
    }

    let end = sim.snapshot(id).unwrap();
    assert!(end.body_velocity.x > 5.0, "only reached {}", end.body_velocity.x);
    assert!(end.engine_rpm > start.engine_rpm);
    assert!(gears.len() <= 2, "shifted more than once: {gears:?}");
    if let Some(&second) = gears.get(1) {
        assert_eq!(second, Gear::Forward(2));
    }
    assert_eq!(end.resets, 0);
}

#[test]
fn full_braking_from_speed_stops_smoothly() {
    let (mut sim, id) = single("Venom");
    let ground = FlatGround::pavement();
    {
        let car = sim.car_mut(id).unwrap();
        car.body.velocity = Vec3::new(100.0, 0.0, 0.0);
        for wheel in &mut car.wheels {
            wheel.tire.angular_velocity = 100.0;
        }
    }
    let stop = Controls {
        brake: 1.0,
        gear: GearCommand::Select(Gear::Neutral),
        ..Default::default()
    };

    let mut last_vx = 100.0;
    let mut ticks = 0;
    while last_vx > 1.0 && ticks < 600 {
        sim.tick(&[stop], &ground);
        let vx = sim.snapshot(id).unwrap().body_velocity.x;
        if last_vx > 5.0 {
            assert!(vx <= last_vx + 0.05, "sped up under braking: {last_vx} -> {vx}");
            assert!(last_vx - vx < 2.0, "velocity jump: {last_vx} -> {vx}");
        }
        last_vx = vx;
        ticks += 1;
    }
    assert!(ticks < 600, "never stopped, still at {last_vx}");
    // Under a second of braking would need more than a g and a half
    assert!(ticks > 60);

    // Settle, still braking
    for _ in 0..30 {
        sim.tick(&[stop], &ground);
    }
    let end = sim.snapshot(id).unwrap();
    assert!(end.speed < 2.0);
    for wheel in &end.wheels {
        assert!(wheel.angular_velocity.abs() < 3.0, "{wheel:?}");
    }
    assert_eq!(end.gear, Gear::Neutral);
}

#[test]
fn full_lock_braking_in_gear() {
    let mut sim = Simulation::new(Settings::default());
    let ground = FlatGround::pavement();
    let id = sim
        .spawn(
            &SpawnRequest::new("Venom").transmission(Transmission::Manual),
            &ground,
        )
        .unwrap();
    let top = Gear::Forward(4);
    {
        let car = sim.car_mut(id).unwrap();
        let params = &car.car_type.drivetrain;
        let ratio = params.gear_ratios[top.slot()] * params.final_drive;
        car.drivetrain.gear = top;
        car.drivetrain.command_gear = top;
        car.drivetrain.engine_angvel = 100.0 * ratio;
        car.drivetrain.clutch_angvel = 100.0 * ratio;
        car.body.velocity = Vec3::new(100.0, 0.0, 0.0);
        for wheel in &mut car.wheels {
            wheel.tire.angular_velocity = 100.0;
        }
    }
    let stop = Controls {
        brake: 1.0,
        ..Default::default()
    };

    let mut last_vx = 100.0;
    let mut locked_at = None;
    for tick in 0..90 {
        sim.tick(&[stop], &ground);
        let s = sim.snapshot(id).unwrap();
        let vx = s.body_velocity.x;
        assert!(vx <= last_vx + 0.05, "sped up under braking: {last_vx} -> {vx}");
        assert!(last_vx - vx < 2.0, "velocity jump: {last_vx} -> {vx}");
        last_vx = vx;
        let fronts_stopped = [FRONT_LEFT, FRONT_RIGHT]
            .iter()
            .all(|&i| s.wheels[i].angular_velocity.abs() < 6.0);
        if locked_at.is_none() && fronts_stopped {
            locked_at = Some((tick, vx));
        }
    }

    let (tick, vx) = locked_at.expect("front wheels never locked");
    assert!(tick < 60, "took {tick} ticks to lock");
    assert!(vx > 50.0, "locked only at {vx} ft/s");

    let end = sim.snapshot(id).unwrap();
    assert!(end.body_velocity.x > 20.0);
    for i in [FRONT_LEFT, FRONT_RIGHT] {
        assert_eq!(end.wheels[i].slip, SlipState::WheelLock, "wheel {i}");
        assert!(end.wheels[i].angular_velocity.abs() < 6.0);
    }
    assert_eq!(end.gear, top);
    assert_eq!(end.resets, 0);
}

#[test]
fn steady_full_throttle_turn_stays_upright() {
    for steer in [0.1, 0.2, 0.3] {
        let (mut sim, id) = single("Venom");
        let ground = FlatGround::pavement();
        let turn = Controls {
            throttle: 1.0,
            steer,
            ..Default::default()
        };
        let mut min_up = 1.0f32;
        for _ in 0..900 {
            sim.tick(&[turn], &ground);
            min_up = min_up.min(sim.car(id).unwrap().body.up_z());
        }
        let car = sim.car(id).unwrap();
        assert!(min_up > 0.7, "steer {steer}: rolled to up_z {min_up}");
        assert_eq!(car.resets, 0, "steer {steer}");
        assert!(car.body.position.z > 0.0);
        assert!(car.body.speed() > 10.0);
    }
}

#[test]
fn wheel_over_a_hole_carries_no_force() {
    let hole = |p: Vec3| {
        if p.x > 1.0 && p.y > 1.0 {
            SurfaceContact::flat(-5.0, SurfaceCode::Pavement)
        } else {
            SurfaceContact::flat(0.0, SurfaceCode::Pavement)
        }
    };
    let mut sim = Simulation::new(Settings::default());
    let id = sim.spawn(&SpawnRequest::new("Phantom"), &hole).unwrap();
    sim.tick(
        &[Controls {
            throttle: 0.5,
            steer: 0.2,
            ..Default::default()
        }],
        &hole,
    );

    let car = sim.car(id).unwrap();
    let fl = &car.wheels[FRONT_LEFT];
    assert!(fl.suspension.compression < 0.0);
    assert_eq!(fl.normal_force, 0.0);
    assert_eq!(fl.tire.slip, SlipState::Airborne);
    assert_eq!(fl.tire.longitudinal_force, 0.0);
    assert_eq!(fl.tire.lateral_force, 0.0);
    for i in 1..NUM_WHEELS {
        assert!(car.wheels[i].normal_force > 0.0, "wheel {i} lost contact");
    }
}

#[test]
fn identical_inputs_replay_bit_for_bit() {
    fn run() -> Vec<String> {
        let mut sim = Simulation::new(Settings::default());
        let ground = |p: Vec3| {
            // Dirt strip down one side of the road
            let surface = if p.y > 15.0 {
                SurfaceCode::Dirt
            } else {
                SurfaceCode::Pavement
            };
            SurfaceContact::flat(0.0, surface)
        };
        let mut scripts = Vec::new();
        for (i, name) in ["Rocket", "Crusher", "Secret"].iter().enumerate() {
            let controller = if i == 1 { Controller::Ai } else { Controller::Human };
            sim.spawn(
                &SpawnRequest::new(*name)
                    .at(Vec3::new(0.0, i as f32 * 12.0, 0.0), 0.0)
                    .controller(controller),
                &ground,
            )
            .unwrap();
            scripts.push(ControlScript::wander(99 + i as u64));
        }

        let mut log = Vec::new();
        for tick in 0..600 {
            let controls: Vec<Controls> = sim
                .snapshots()
                .iter()
                .zip(scripts.iter_mut())
                .map(|(s, script)| script.sample(s))
                .collect();
            if tick == 200 {
                sim.queue_collision(CarId(2), Vec3::new(0.0, -4000.0, 0.0), Vec3::ZERO)
                    .unwrap();
            }
            sim.tick(&controls, &ground);
            log.push(serde_json::to_string(&sim.snapshots()).unwrap());
        }
        log
    }

    let a = run();
    let b = run();
    assert_eq!(a.len(), b.len());
    for (tick, (x, y)) in a.iter().zip(&b).enumerate() {
        assert_eq!(x, y, "diverged at tick {tick}");
    }
}

#[test]
fn violent_hit_resets_only_that_car() {
    let mut sim = Simulation::new(Settings::default());
    let ground = FlatGround::pavement();
    let a = sim.spawn(&SpawnRequest::new("Wraith"), &ground).unwrap();
    let b = sim
        .spawn(
            &SpawnRequest::new("Banshee").at(Vec3::new(0.0, 30.0, 0.0), 0.0),
            &ground,
        )
        .unwrap();
    let go = Controls {
        throttle: 1.0,
        ..Default::default()
    };
    for _ in 0..30 {
        sim.tick(&[go, go], &ground);
    }
    let before = sim.snapshot(a).unwrap();

    sim.queue_collision(a, Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0e9))
        .unwrap();
    sim.tick(&[go, go], &ground);

    let hit = sim.snapshot(a).unwrap();
    assert_eq!(hit.resets, 1);
    assert_eq!(hit.speed, 0.0);
    assert_eq!(hit.angular_velocity, Vec3::ZERO);
    assert!((hit.position - before.position).length() < 5.0);

    let other = sim.snapshot(b).unwrap();
    assert_eq!(other.resets, 0);
    assert!(other.speed > 2.0);

    // Non-finite input is absorbed the same way
    sim.queue_collision(b, Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ZERO)
        .unwrap();
    sim.tick(&[go, go], &ground);
    let other = sim.snapshot(b).unwrap();
    assert_eq!(other.resets, 1);
    assert!(other.position.is_finite());
}

#[test]
fn custom_car_type_from_json() {
    let (mut sim, _) = single("Rocket");
    let json = sim.car_type("Rocket").unwrap().to_json().unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value["name"] = serde_json::Value::from("Brick");
    value["drag"] = serde_json::Value::from(0.05);
    let brick = arcade_dynamics::sim::CarType::from_json(&value.to_string()).unwrap();
    sim.register_car_type(brick).unwrap();

    let id = sim
        .spawn(
            &SpawnRequest::new("brick").at(Vec3::new(50.0, 0.0, 0.0), 0.0),
            &FlatGround::pavement(),
        )
        .unwrap();
    assert_eq!(sim.car(id).unwrap().car_type.name, "Brick");
    assert!(sim.snapshot(id).unwrap().speed < 1e-6);
}
