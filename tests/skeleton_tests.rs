use approx::assert_abs_diff_eq;
use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use physanim::{global_to_local, local_to_global, RigidTransform, SimError, Skeleton};

fn random_transform(rng: &mut Pcg64) -> RigidTransform {
    let axis = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
        .try_normalize()
        .unwrap_or(Vec3::Z);
    let rotation = Quat::from_axis_angle(axis, rng.gen_range(-3.0..3.0));
    let translation = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
    RigidTransform::new(rotation, translation)
}

fn random_parents(rng: &mut Pcg64, n: usize) -> Vec<Option<usize>> {
    (0..n).map(|i| if i == 0 { None } else { Some(rng.gen_range(0..i)) }).collect()
}

#[test]
fn global_local_round_trip() {
    let mut rng = Pcg64::seed_from_u64(7);
    for trial in 0..20 {
        let n = 1 + trial * 2;
        let parents = random_parents(&mut rng, n);
        let global: Vec<RigidTransform> = (0..n).map(|_| random_transform(&mut rng)).collect();

        let local = global_to_local(&global, &parents).unwrap();
        let back = local_to_global(&local, &parents).unwrap();
        for (j, (a, b)) in global.iter().zip(&back).enumerate() {
            assert!(a.abs_diff_eq(b, 1e-5), "trial {} joint {}: {:?} vs {:?}", trial, j, a, b);
        }
    }
}

#[test]
fn local_global_round_trip_through_skeleton() {
    let mut rng = Pcg64::seed_from_u64(99);
    let parents = random_parents(&mut rng, 12);
    let rest: Vec<RigidTransform> = (0..12).map(|_| random_transform(&mut rng)).collect();
    let skeleton = Skeleton::new(parents, rest.clone()).unwrap();

    let global = skeleton.local_to_global(&rest).unwrap();
    assert_eq!(global.as_slice(), skeleton.rest_pose_global());
    let local = skeleton.global_to_local(&global).unwrap();
    for (a, b) in rest.iter().zip(&local) {
        assert!(a.abs_diff_eq(b, 1e-5));
    }
}

#[test]
fn construction_validates_topology() {
    let rest = vec![RigidTransform::IDENTITY; 3];
    assert_eq!(
        Skeleton::from_parent_indices(&[-1, 0, 3], rest.clone()).unwrap_err(),
        SimError::InvalidParent { joint: 2, parent: 3 }
    );
    assert_eq!(Skeleton::new(vec![], vec![]).unwrap_err(), SimError::EmptySkeleton);
    assert!(local_to_global(&rest, &[None, Some(1), Some(0)]).is_err());
}

#[test]
fn root_transform_moves_every_joint() {
    let rest = vec![
        RigidTransform::IDENTITY,
        RigidTransform::from_translation(Vec3::X),
        RigidTransform::from_translation(Vec3::X),
    ];
    let mut skeleton = Skeleton::from_parent_indices(&[-1, 0, 1], rest).unwrap();
    skeleton.apply_root_transform(RigidTransform::new(
        Quat::from_rotation_z(core::f32::consts::FRAC_PI_2),
        Vec3::new(0.0, 0.0, 1.0),
    ));
    let tip = skeleton.rest_pose_global()[2].translation;
    assert_abs_diff_eq!(tip.x, 0.0, epsilon = 1e-5);
    assert_abs_diff_eq!(tip.y, 2.0, epsilon = 1e-5);
    assert_abs_diff_eq!(tip.z, 1.0, epsilon = 1e-5);
}
