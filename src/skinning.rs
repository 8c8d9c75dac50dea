//! Mesh skinning from joint poses and per-vertex weights.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::dual_quat::DualQuat;
use crate::error::{SimError, SimResult};
use crate::transform::RigidTransform;

/// Total weight at or below which a vertex counts as unweighted.
pub const MIN_WEIGHT_SUM: f32 = f32::EPSILON;

fn is_weighted(list: &[JointWeight]) -> bool {
    list.iter().map(|w| w.weight).sum::<f32>() > MIN_WEIGHT_SUM
}

/// Influence of one joint on one vertex.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointWeight {
    pub joint: usize,
    pub weight: f32,
}

impl JointWeight {
    pub fn new(joint: usize, weight: f32) -> Self {
        JointWeight { joint, weight }
    }
}

/// Per-vertex sparse joint weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rig {
    influences: Vec<Vec<JointWeight>>,
    joint_count: usize,
}

impl Rig {
    /// Rejects weights that reference a missing joint or that are negative
    /// or non-finite. Weights do not need to sum to one yet, see
    /// [`normalize_weights`](Self::normalize_weights).
    pub fn new(influences: Vec<Vec<JointWeight>>, joint_count: usize) -> SimResult<Self> {
        for (vertex, list) in influences.iter().enumerate() {
            for w in list {
                if w.joint >= joint_count {
                    return Err(SimError::WeightJointOutOfBounds { vertex, joint: w.joint, count: joint_count });
                }
                if !w.weight.is_finite() || w.weight < 0.0 {
                    return Err(SimError::InvalidWeight { vertex, weight: w.weight });
                }
            }
        }
        Ok(Rig { influences, joint_count })
    }

    pub fn vertex_count(&self) -> usize { self.influences.len() }
    pub fn joint_count(&self) -> usize { self.joint_count }
    pub fn influences(&self) -> &[Vec<JointWeight>] { &self.influences }

    /// Scale each vertex's weights so they sum to one.
    ///
    /// Vertices with no weight are attached rigidly to the root joint.
    /// Returns how many vertices needed that fallback.
    pub fn normalize_weights(&mut self) -> usize {
        let mut reattached = 0;
        for list in self.influences.iter_mut() {
            if !is_weighted(list) {
                list.clear();
                list.push(JointWeight::new(0, 1.0));
                reattached += 1;
                continue;
            }
            let sum: f32 = list.iter().map(|w| w.weight).sum();
            for w in list.iter_mut() {
                w.weight /= sum;
            }
        }
        if reattached > 0 {
            log::warn!("{} vertices had no skinning weight and were attached to the root joint", reattached);
        }
        reattached
    }
}

/// Blending policy for joint transforms.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkinningMethod {
    /// Weighted sum of transformed positions.
    #[default]
    Linear,
    /// Blend dual quaternions, then transform once. Avoids the volume
    /// loss of linear blending around twisting joints.
    DualQuaternion,
}

/// Everything needed to deform one mesh.
#[derive(Clone, Copy, Debug)]
pub struct SkinningInput<'a> {
    pub bind_positions: &'a [Vec3],
    pub bind_normals: &'a [Vec3],
    pub rig: &'a Rig,
    /// Global joint transforms of the bind pose.
    pub rest_pose: &'a [RigidTransform],
    /// Global joint transforms to skin to.
    pub current_pose: &'a [RigidTransform],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkinningOutput {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

/// Deform the bind pose by `current_pose[j] * inverse(rest_pose[j])` per joint.
pub fn compute_skinning(input: &SkinningInput, method: SkinningMethod) -> SimResult<SkinningOutput> {
    check_inputs(input)?;
    let skin: Vec<RigidTransform> = input
        .current_pose
        .iter()
        .zip(input.rest_pose)
        .map(|(current, rest)| *current * rest.inverse())
        .collect();

    let vertex_count = input.bind_positions.len();
    let mut out = SkinningOutput {
        positions: Vec::with_capacity(vertex_count),
        normals: Vec::with_capacity(vertex_count),
    };
    let mut unweighted = 0usize;
    let root = [JointWeight::new(0, 1.0)];

    match method {
        SkinningMethod::Linear => {
            for (k, (&p, &n)) in input.bind_positions.iter().zip(input.bind_normals).enumerate() {
                let weights = effective_weights(&input.rig.influences[k], &root, &mut unweighted);
                let mut pos = Vec3::ZERO;
                let mut norm = Vec3::ZERO;
                for w in weights {
                    let t = &skin[w.joint];
                    pos += t.transform_point(p) * w.weight;
                    norm += t.transform_vector(n) * w.weight;
                }
                out.positions.push(pos);
                out.normals.push(norm.normalize_or_zero());
            }
        }
        SkinningMethod::DualQuaternion => {
            let dqs: Vec<DualQuat> = skin.iter().map(DualQuat::from_rigid).collect();
            for (k, (&p, &n)) in input.bind_positions.iter().zip(input.bind_normals).enumerate() {
                let weights = effective_weights(&input.rig.influences[k], &root, &mut unweighted);
                let dq = DualQuat::blend(weights.iter().map(|w| (dqs[w.joint], w.weight)));
                out.positions.push(dq.transform_point(p));
                out.normals.push(dq.transform_vector(n).normalize_or_zero());
            }
        }
    }

    if unweighted > 0 {
        log::warn!("{} vertices skinned without weights, attached to the root joint", unweighted);
    }
    Ok(out)
}

fn effective_weights<'w>(list: &'w [JointWeight], root: &'w [JointWeight], unweighted: &mut usize) -> &'w [JointWeight] {
    if is_weighted(list) {
        list
    } else {
        *unweighted += 1;
        root
    }
}

fn check_inputs(input: &SkinningInput) -> SimResult<()> {
    let n = input.bind_positions.len();
    let checks = [
        ("bind normals", n, input.bind_normals.len()),
        ("rig vertices", n, input.rig.vertex_count()),
        ("rest pose", input.rig.joint_count(), input.rest_pose.len()),
        ("current pose", input.rig.joint_count(), input.current_pose.len()),
    ];
    for (name, expected, actual) in checks {
        if expected != actual {
            return Err(SimError::LengthMismatch { name, expected, actual });
        }
    }
    if input.rig.joint_count() == 0 && n > 0 {
        return Err(SimError::EmptySkeleton);
    }
    Ok(())
}
