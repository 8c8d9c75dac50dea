//! Keyframed joint animation: per-joint tracks, time wrapping and pose blending.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::skeleton::Skeleton;
use crate::transform::RigidTransform;

/// How a sample time outside the animation range is mapped back into it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeWrap {
    /// Hold the first or last key.
    #[default]
    Clamp,
    /// Loop from the start.
    Repeat,
    /// Play forward then backward.
    PingPong,
}

impl TimeWrap {
    /// Map `t` into `[start, end]`.
    pub fn apply(self, t: f32, start: f32, end: f32) -> f32 {
        let duration = end - start;
        if duration <= f32::EPSILON {
            return start;
        }
        let local = t - start;
        let wrapped = match self {
            TimeWrap::Clamp => local.clamp(0.0, duration),
            TimeWrap::Repeat => local.rem_euclid(duration),
            TimeWrap::PingPong => {
                let period = duration * 2.0;
                let t2 = local.rem_euclid(period);
                if t2 <= duration { t2 } else { period - t2 }
            }
        };
        start + wrapped
    }
}

/// Keyframes for a single joint's local transform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationTrack {
    joint: usize,
    times: Vec<f32>,
    transforms: Vec<RigidTransform>,
}

impl AnimationTrack {
    /// Requires at least two keys with strictly increasing times.
    pub fn new(joint: usize, times: Vec<f32>, transforms: Vec<RigidTransform>) -> SimResult<Self> {
        if times.len() != transforms.len() {
            return Err(SimError::LengthMismatch {
                name: "track keys",
                expected: times.len(),
                actual: transforms.len(),
            });
        }
        if times.len() < 2 {
            return Err(SimError::TrackTooShort { joint, count: times.len() });
        }
        if let Some(index) = times.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(SimError::NonIncreasingTimes { joint, index: index + 1 });
        }
        Ok(AnimationTrack { joint, times, transforms })
    }

    pub fn joint(&self) -> usize { self.joint }
    pub fn times(&self) -> &[f32] { &self.times }
    pub fn transforms(&self) -> &[RigidTransform] { &self.transforms }
    pub fn start_time(&self) -> f32 { self.times[0] }
    pub fn end_time(&self) -> f32 { self.times[self.times.len() - 1] }

    /// Interpolated local transform at `t`.
    ///
    /// Outside `[start, end)` the first or last key is returned unchanged.
    pub fn evaluate(&self, t: f32) -> RigidTransform {
        let last = self.times.len() - 1;
        if t.is_nan() || t <= self.times[0] {
            return self.transforms[0];
        }
        if t >= self.times[last] {
            return self.transforms[last];
        }
        // first key strictly after t, always in 1..=last here
        let k1 = self.times.partition_point(|&k| k <= t);
        let k0 = k1 - 1;
        let (t0, t1) = (self.times[k0], self.times[k1]);
        let alpha = (t - t0) / (t1 - t0);
        if alpha <= 0.0 {
            return self.transforms[k0];
        }
        self.transforms[k0].interpolate(&self.transforms[k1], alpha)
    }
}

/// A set of tracks driving a skeleton. Joints without a track keep their
/// rest local transform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonAnimation {
    tracks: Vec<AnimationTrack>,
}

impl SkeletonAnimation {
    /// Checks every track against the skeleton's joint count.
    pub fn new(tracks: Vec<AnimationTrack>, joint_count: usize) -> SimResult<Self> {
        if let Some(track) = tracks.iter().find(|t| t.joint >= joint_count) {
            return Err(SimError::UnknownJoint { joint: track.joint, count: joint_count });
        }
        Ok(SkeletonAnimation { tracks })
    }

    /// One timeline shared by every joint: `poses[k]` is the full local pose
    /// at `times[k]`.
    pub fn from_shared_times(times: Vec<f32>, poses: Vec<Vec<RigidTransform>>) -> SimResult<Self> {
        if times.len() != poses.len() {
            return Err(SimError::LengthMismatch {
                name: "keyframe poses",
                expected: times.len(),
                actual: poses.len(),
            });
        }
        let joint_count = poses.first().map_or(0, Vec::len);
        if let Some(bad) = poses.iter().find(|p| p.len() != joint_count) {
            return Err(SimError::LengthMismatch {
                name: "keyframe pose",
                expected: joint_count,
                actual: bad.len(),
            });
        }
        let tracks = (0..joint_count)
            .map(|joint| {
                let keys = poses.iter().map(|pose| pose[joint]).collect();
                AnimationTrack::new(joint, times.clone(), keys)
            })
            .collect::<SimResult<Vec<_>>>()?;
        Ok(SkeletonAnimation { tracks })
    }

    pub fn tracks(&self) -> &[AnimationTrack] { &self.tracks }

    /// Earliest key over all tracks, 0 when there are none.
    pub fn start_time(&self) -> f32 {
        self.tracks.iter().map(AnimationTrack::start_time).reduce(f32::min).unwrap_or(0.0)
    }

    /// Latest key over all tracks, 0 when there are none.
    pub fn end_time(&self) -> f32 {
        self.tracks.iter().map(AnimationTrack::end_time).reduce(f32::max).unwrap_or(0.0)
    }

    pub fn duration(&self) -> f32 {
        self.end_time() - self.start_time()
    }

    /// Local pose at `t`, clamped to each track's own range.
    pub fn evaluate_local(&self, skeleton: &Skeleton, t: f32) -> SimResult<Vec<RigidTransform>> {
        let mut pose = skeleton.rest_local().to_vec();
        for track in &self.tracks {
            let slot = pose
                .get_mut(track.joint)
                .ok_or(SimError::UnknownJoint { joint: track.joint, count: skeleton.joint_count() })?;
            *slot = track.evaluate(t);
        }
        Ok(pose)
    }

    pub fn evaluate_global(&self, skeleton: &Skeleton, t: f32) -> SimResult<Vec<RigidTransform>> {
        let local = self.evaluate_local(skeleton, t)?;
        skeleton.local_to_global(&local)
    }

    /// Local pose at `t` after mapping it into the animation range.
    pub fn sample(&self, skeleton: &Skeleton, t: f32, wrap: TimeWrap) -> SimResult<Vec<RigidTransform>> {
        let t = wrap.apply(t, self.start_time(), self.end_time());
        self.evaluate_local(skeleton, t)
    }
}

/// Per-joint interpolation between two local poses, used for transitions
/// between animations. `weight` 0 returns `from`, 1 returns `to`.
pub fn blend_poses(from: &[RigidTransform], to: &[RigidTransform], weight: f32) -> SimResult<Vec<RigidTransform>> {
    if from.len() != to.len() {
        return Err(SimError::LengthMismatch { name: "blend pose", expected: from.len(), actual: to.len() });
    }
    let w = weight.clamp(0.0, 1.0);
    Ok(from.iter().zip(to).map(|(a, b)| a.interpolate(b, w)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn slide() -> AnimationTrack {
        let keys = vec![
            RigidTransform::from_translation(Vec3::ZERO),
            RigidTransform::from_translation(Vec3::X),
            RigidTransform::from_translation(Vec3::new(1.0, 2.0, 0.0)),
        ];
        AnimationTrack::new(0, vec![0.0, 1.0, 2.0], keys).unwrap()
    }

    #[test]
    fn rejects_short_and_unordered_tracks() {
        let one = vec![RigidTransform::IDENTITY];
        assert_eq!(AnimationTrack::new(3, vec![0.0], one).unwrap_err(), SimError::TrackTooShort { joint: 3, count: 1 });
        let two = vec![RigidTransform::IDENTITY; 3];
        assert_eq!(
            AnimationTrack::new(0, vec![0.0, 1.0, 1.0], two).unwrap_err(),
            SimError::NonIncreasingTimes { joint: 0, index: 2 }
        );
    }

    #[test]
    fn interpolates_between_keys() {
        let track = slide();
        let mid = track.evaluate(1.5);
        assert!((mid.translation - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
        assert_eq!(track.evaluate(1.0), track.transforms()[1]);
    }

    #[test]
    fn clamps_outside_range() {
        let track = slide();
        assert_eq!(track.evaluate(-4.0), track.transforms()[0]);
        assert_eq!(track.evaluate(2.0), track.transforms()[2]);
        assert_eq!(track.evaluate(9.0), track.transforms()[2]);
    }

    #[test]
    fn time_wrap_modes() {
        assert_eq!(TimeWrap::Clamp.apply(3.0, 0.0, 2.0), 2.0);
        assert!((TimeWrap::Repeat.apply(2.5, 0.0, 2.0) - 0.5).abs() < 1e-6);
        assert!((TimeWrap::PingPong.apply(2.5, 0.0, 2.0) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn blend_midway() {
        let a = [RigidTransform::IDENTITY];
        let b = [RigidTransform::new(Quat::from_rotation_z(1.0), Vec3::Y * 2.0)];
        let out = blend_poses(&a, &b, 0.5).unwrap();
        assert!((out[0].translation - Vec3::Y).length() < 1e-6);
        assert!(blend_poses(&a, &[], 0.5).is_err());
    }

    #[test]
    fn range_of_negative_keys() {
        let keys = vec![RigidTransform::IDENTITY; 2];
        let early = AnimationTrack::new(0, vec![-3.0, -2.0], keys.clone()).unwrap();
        let late = AnimationTrack::new(1, vec![-2.5, -0.5], keys).unwrap();
        let animation = SkeletonAnimation::new(vec![early, late], 2).unwrap();
        assert_eq!(animation.start_time(), -3.0);
        assert_eq!(animation.end_time(), -0.5);
        assert_eq!(animation.duration(), 2.5);

        let empty = SkeletonAnimation::default();
        assert_eq!((empty.start_time(), empty.end_time()), (0.0, 0.0));
    }
}
