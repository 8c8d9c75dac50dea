use core::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};
use physanim::{
    solve_ik, AnimationTrack, IkChain, IkConfig, RigidTransform, SimError, Skeleton, SkeletonAnimation, TimeWrap,
};

/// Root at the origin, mid at x = 0.5, tip at x = 1.
fn arm() -> Skeleton {
    let rest = vec![
        RigidTransform::IDENTITY,
        RigidTransform::from_translation(Vec3::new(0.5, 0.0, 0.0)),
        RigidTransform::from_translation(Vec3::new(0.5, 0.0, 0.0)),
    ];
    Skeleton::from_parent_indices(&[-1, 0, 1], rest).unwrap()
}

/// The mid joint turns 90 degrees about Z over five keys.
fn bend(skeleton: &Skeleton) -> SkeletonAnimation {
    let times = vec![0.0, 0.25, 0.5, 0.75, 1.0];
    let keys = (0..5)
        .map(|k| {
            let angle = FRAC_PI_2 * k as f32 / 4.0;
            RigidTransform::new(Quat::from_rotation_z(angle), Vec3::new(0.5, 0.0, 0.0))
        })
        .collect();
    let track = AnimationTrack::new(1, times, keys).unwrap();
    SkeletonAnimation::new(vec![track], skeleton.joint_count()).unwrap()
}

#[test]
fn two_bone_bend_sweeps_tip() {
    let skeleton = arm();
    let animation = bend(&skeleton);

    let tip = |t: f32| animation.evaluate_global(&skeleton, t).unwrap()[2].translation;

    assert!((tip(0.0) - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5, "start: {}", tip(0.0));
    let half = core::f32::consts::FRAC_1_SQRT_2 * 0.5;
    assert!((tip(0.5) - Vec3::new(0.5 + half, half, 0.0)).length() < 1e-5, "midpoint: {}", tip(0.5));
    assert!((tip(1.0) - Vec3::new(0.5, 0.5, 0.0)).length() < 1e-5, "end: {}", tip(1.0));

    // the tip stays on the circle of radius 0.5 around the mid joint
    for k in 0..=20 {
        let p = tip(k as f32 / 20.0);
        assert!(((p - Vec3::new(0.5, 0.0, 0.0)).length() - 0.5).abs() < 1e-5);
    }
}

#[test]
fn evaluation_clamps_to_end_keys() {
    let skeleton = arm();
    let animation = bend(&skeleton);
    let track = &animation.tracks()[0];
    assert_eq!(track.evaluate(-3.0), track.transforms()[0]);
    assert_eq!(track.evaluate(1.0), track.transforms()[4]);
    assert_eq!(track.evaluate(42.0), track.transforms()[4]);

    let before = animation.evaluate_local(&skeleton, -1.0).unwrap();
    assert_eq!(before[1], track.transforms()[0]);
    // joints without a track keep their rest transform
    assert_eq!(before[2], skeleton.rest_local()[2]);
}

#[test]
fn wrapped_sampling() {
    let skeleton = arm();
    let animation = bend(&skeleton);
    assert!((animation.duration() - 1.0).abs() < 1e-6);
    let looped = animation.sample(&skeleton, 1.25, TimeWrap::Repeat).unwrap();
    let direct = animation.evaluate_local(&skeleton, 0.25).unwrap();
    assert!(looped[1].abs_diff_eq(&direct[1], 1e-5));
    let bounced = animation.sample(&skeleton, 1.25, TimeWrap::PingPong).unwrap();
    let expected = animation.evaluate_local(&skeleton, 0.75).unwrap();
    assert!(bounced[1].abs_diff_eq(&expected[1], 1e-5));
}

#[test]
fn shared_timeline_builds_one_track_per_joint() {
    let skeleton = arm();
    let pose_a = skeleton.rest_local().to_vec();
    let mut pose_b = pose_a.clone();
    pose_b[0].translation = Vec3::new(0.0, 0.0, 2.0);
    let animation = SkeletonAnimation::from_shared_times(vec![0.0, 2.0], vec![pose_a, pose_b]).unwrap();
    assert_eq!(animation.tracks().len(), 3);
    let mid = animation.evaluate_global(&skeleton, 1.0).unwrap();
    assert!((mid[2].translation - Vec3::new(1.0, 0.0, 1.0)).length() < 1e-5);
}

#[test]
fn track_for_missing_joint_is_rejected() {
    let track = AnimationTrack::new(5, vec![0.0, 1.0], vec![RigidTransform::IDENTITY; 2]).unwrap();
    assert_eq!(
        SkeletonAnimation::new(vec![track], 3).unwrap_err(),
        SimError::UnknownJoint { joint: 5, count: 3 }
    );
}

#[test]
fn ik_bends_arm_to_target() {
    let skeleton = arm();
    let mut pose = skeleton.rest_local().to_vec();
    let chain = IkChain::from_skeleton(&skeleton, 2, 2).unwrap();
    let target = Vec3::new(0.5, 0.5, 0.0);
    let config = IkConfig::new().with_iterations(100).with_tolerance(1e-3);
    let outcome = solve_ik(&skeleton, &mut pose, &chain, target, &config).unwrap();
    assert!(outcome.converged, "IK stopped {} away", outcome.distance);
    let tip = skeleton.local_to_global(&pose).unwrap()[2].translation;
    assert!((tip - target).length() <= 1e-3);
}
