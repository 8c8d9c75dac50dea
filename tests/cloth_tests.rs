use glam::Vec3;
use physanim::{Cloth, ClothConfig, CollisionVolume, Constraint, NoOpStepObserver, StepObserver};

#[test]
fn pinned_corners_hold_while_cloth_sags() {
    let mut cloth = Cloth::flat(4, 4).unwrap();
    cloth.pin(0, 3).unwrap();
    cloth.pin(3, 3).unwrap();
    let initial = cloth.positions().clone();

    let config = ClothConfig::new();
    for step in 0..100 {
        cloth
            .step(0.005, &config, &mut NoOpStepObserver)
            .unwrap_or_else(|e| panic!("step {} failed: {}", step, e));
    }

    for kv in 0..4 {
        for ku in 0..4 {
            let p = cloth.position_at(ku, kv);
            assert!(!p.is_nan(), "vertex ({}, {}) is NaN", ku, kv);
            let start = initial[(ku, kv)];
            if (ku, kv) == (0, 3) || (ku, kv) == (3, 3) {
                assert_eq!(p, start, "pinned corner ({}, {}) moved", ku, kv);
            } else {
                assert!(p.z < start.z, "vertex ({}, {}) did not sag: z {} -> {}", ku, kv, start.z, p.z);
            }
        }
    }
}

#[test]
fn cloth_drapes_over_sphere_without_entering_it() {
    let mut cloth = Cloth::flat(10, 10).unwrap();
    let center = Vec3::new(0.1, 0.5, 0.6);
    let radius = 0.15;
    cloth.add_constraint(Constraint::Collision(CollisionVolume::sphere(center, radius))).unwrap();
    cloth.add_constraint(Constraint::Collision(CollisionVolume::ground(0.0, 0.5))).unwrap();

    let config = ClothConfig::new();
    for _ in 0..300 {
        cloth.step(0.005, &config, &mut NoOpStepObserver).unwrap();
    }

    for p in cloth.positions().data() {
        assert!((*p - center).length() >= radius - 1e-4, "vertex {} is inside the sphere", p);
        assert!(p.z >= -1e-6, "vertex {} is below the ground", p);
    }
}

#[test]
fn wind_along_normal_lifts_cloth() {
    let run = |config: &ClothConfig| {
        let mut cloth = Cloth::flat(5, 5).unwrap();
        for _ in 0..20 {
            cloth.step(0.005, config, &mut NoOpStepObserver).unwrap();
        }
        cloth.position_at(2, 2).z
    };
    let calm = run(&ClothConfig::new());
    let windy = run(&ClothConfig::new().with_wind(200.0, Vec3::Z));
    assert!(windy > calm, "wind should push the sheet up: {} vs {}", windy, calm);
}

#[derive(Default)]
struct PassCounter {
    passes: usize,
    completed: usize,
}

impl StepObserver for PassCounter {
    fn on_constraint_iteration(&mut self, _iteration: usize) {
        self.passes += 1;
    }

    fn on_step_complete(&mut self) {
        self.completed += 1;
    }
}

#[test]
fn sub_steps_run_constraint_passes() {
    let mut cloth = Cloth::flat(3, 3).unwrap();
    let mut counter = PassCounter::default();
    let config = ClothConfig::new().with_sub_steps(4);
    cloth.step(0.02, &config, &mut counter).unwrap();
    assert_eq!(counter.passes, 4);
    assert_eq!(counter.completed, 1);
}

#[test]
fn stiff_springs_trip_the_guard() {
    let mut cloth = Cloth::flat(6, 6).unwrap();
    cloth.pin(0, 0).unwrap();
    let config = ClothConfig::new().with_stiffness(1e6).with_drag(0.0);
    let mut failed = false;
    for _ in 0..200 {
        if cloth.step(0.05, &config, &mut NoOpStepObserver).is_err() {
            failed = true;
            break;
        }
    }
    assert!(failed, "explicit integration with k = 1e6 and dt = 0.05 should diverge");
    assert!(cloth.is_halted());
    let frozen = cloth.positions().clone();
    assert!(cloth.step(0.05, &config, &mut NoOpStepObserver).is_err());
    assert_eq!(cloth.positions(), &frozen, "a halted cloth must not move");
}

#[test]
fn reset_restores_layout() {
    let mut cloth = Cloth::flat(3, 3).unwrap();
    let initial = cloth.positions().clone();
    for _ in 0..10 {
        cloth.step(0.005, &ClothConfig::new(), &mut NoOpStepObserver).unwrap();
    }
    assert_ne!(cloth.positions(), &initial);
    cloth.reset();
    assert_eq!(cloth.positions(), &initial);
    assert!(cloth.velocities().data().iter().all(|v| *v == Vec3::ZERO));
}
