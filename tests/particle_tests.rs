use glam::Vec3;
use physanim::{NoOpStepObserver, Particle, ParticleConfig, ParticleSystem};

#[test]
fn bouncing_spheres_stay_in_the_box() {
    let mut system = ParticleSystem::new();
    let config = ParticleConfig::new();
    let mut time = 0.0f32;
    let dt = 0.005;

    for frame in 0..800 {
        if frame % 20 == 0 {
            let angle = frame as f32 * 0.37;
            let velocity = Vec3::new(2.0 * angle.cos(), 2.0 * angle.sin(), 4.0);
            system.emit(Particle::new(Vec3::new(0.0, 0.0, -0.5), velocity, 1.0, 0.06).born_at(time));
        }
        system.step(dt, &config, &mut NoOpStepObserver).unwrap();
        time += dt;
        system.remove_expired(time, config.max_age);

        for p in system.particles() {
            for axis in 0..3 {
                assert!(
                    p.position[axis] - p.radius >= config.container_min[axis] - 0.05
                        && p.position[axis] + p.radius <= config.container_max[axis] + 0.05,
                    "particle escaped the container at frame {}: {}",
                    frame,
                    p.position
                );
            }
        }
    }

    assert!(!system.is_empty());
    assert!(system.particles().iter().all(|p| p.age(time) <= config.max_age));
}

#[test]
fn resting_particle_settles_on_floor() {
    let mut system = ParticleSystem::new();
    system.emit(Particle::new(Vec3::new(0.0, 0.0, 0.5), Vec3::ZERO, 1.0, 0.1));
    let config = ParticleConfig::new();
    for _ in 0..2000 {
        system.step(0.005, &config, &mut NoOpStepObserver).unwrap();
    }
    let p = &system.particles()[0];
    assert!((p.position.z - (-0.9)).abs() < 0.02, "z = {}", p.position.z);
    assert!(p.velocity.length() < 0.2, "v = {}", p.velocity);
}
