//! Cyclic coordinate descent inverse kinematics on a local pose.

use glam::{Quat, Vec3};

use crate::config::IkConfig;
use crate::error::{SimError, SimResult};
use crate::skeleton::Skeleton;
use crate::transform::RigidTransform;

/// The joints rotated to bring `effector` onto a target.
#[derive(Clone, Debug, PartialEq)]
pub struct IkChain {
    pub effector: usize,
    /// Rotated joints, visited in order each iteration (effector side first).
    pub links: Vec<usize>,
}

impl IkChain {
    /// The `length` ancestors directly above `effector`.
    pub fn from_skeleton(skeleton: &Skeleton, effector: usize, length: usize) -> SimResult<Self> {
        if effector >= skeleton.joint_count() {
            return Err(SimError::IndexOutOfBounds { index: effector, count: skeleton.joint_count() });
        }
        let links = skeleton.ancestors(effector).skip(1).take(length).collect();
        Ok(IkChain { effector, links })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IkOutcome {
    pub iterations: usize,
    /// Effector to target distance after solving.
    pub distance: f32,
    pub converged: bool,
}

/// Rotate the chain's links in `local_pose` so the effector approaches `target`.
pub fn solve_ik(
    skeleton: &Skeleton,
    local_pose: &mut [RigidTransform],
    chain: &IkChain,
    target: Vec3,
    config: &IkConfig,
) -> SimResult<IkOutcome> {
    config.validate()?;
    if !target.is_finite() {
        return Err(SimError::InvalidParameter { name: "target", value: target.length() });
    }
    let count = skeleton.joint_count();
    if let Some(&bad) = chain.links.iter().chain(Some(&chain.effector)).find(|&&j| j >= count) {
        return Err(SimError::IndexOutOfBounds { index: bad, count });
    }

    let mut global = skeleton.local_to_global(local_pose)?;
    let mut distance = (global[chain.effector].translation - target).length();
    let mut iterations = 0;

    while iterations < config.iterations && distance > config.tolerance {
        for &link in &chain.links {
            let to_link = global[link].inverse();
            let effector = to_link.transform_point(global[chain.effector].translation);
            let goal = to_link.transform_point(target);
            let (Some(from), Some(to)) = (effector.try_normalize(), goal.try_normalize()) else {
                continue;
            };
            let rotation = Quat::from_rotation_arc(from, to);
            local_pose[link].rotation = (local_pose[link].rotation * rotation).normalize();
            global = skeleton.local_to_global(local_pose)?;
        }
        iterations += 1;
        distance = (global[chain.effector].translation - target).length();
    }

    let converged = distance <= config.tolerance;
    if !converged {
        log::warn!(
            "IK chain ending at joint {} stopped {} from its target after {} iterations",
            chain.effector, distance, iterations
        );
    }
    Ok(IkOutcome { iterations, distance, converged })
}
