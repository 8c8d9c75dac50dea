//! Joint hierarchy stored as a flat, topologically sorted array.

use crate::error::{SimError, SimResult};
use crate::transform::RigidTransform;

/// A hierarchy of joints with a rest pose.
///
/// Joint 0 is the root. Every other joint's parent has a strictly smaller
/// index, which is checked once at construction so that local/global
/// conversions are a single forward pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Skeleton {
    parents: Vec<Option<usize>>,
    rest_local: Vec<RigidTransform>,
    rest_global: Vec<RigidTransform>,
}

impl Skeleton {
    /// Validate the hierarchy and cache the global rest pose.
    pub fn new(parents: Vec<Option<usize>>, rest_local: Vec<RigidTransform>) -> SimResult<Self> {
        validate_parents(&parents)?;
        check_len("rest pose", parents.len(), rest_local.len())?;
        let rest_global = forward_pass(&rest_local, &parents);
        log::debug!("skeleton built with {} joints", parents.len());
        Ok(Skeleton { parents, rest_local, rest_global })
    }

    /// Build from loader-style parent indices where `-1` marks the root.
    pub fn from_parent_indices(parent_index: &[i32], rest_local: Vec<RigidTransform>) -> SimResult<Self> {
        let parents = parent_index
            .iter()
            .map(|&p| if p < 0 { None } else { Some(p as usize) })
            .collect();
        Self::new(parents, rest_local)
    }

    /// Number of joints, root included.
    pub fn joint_count(&self) -> usize { self.parents.len() }
    /// Parent of every joint, `None` for the root.
    pub fn parents(&self) -> &[Option<usize>] { &self.parents }
    /// Parent of `joint`, `None` for the root or an unknown joint.
    pub fn parent(&self, joint: usize) -> Option<usize> { self.parents.get(joint).copied().flatten() }
    /// Rest pose relative to each parent.
    pub fn rest_local(&self) -> &[RigidTransform] { &self.rest_local }
    /// Rest pose in model space, kept in sync with [`rest_local`](Self::rest_local).
    pub fn rest_pose_global(&self) -> &[RigidTransform] { &self.rest_global }

    /// Direct children of `joint`, in index order.
    pub fn children(&self, joint: usize) -> Vec<usize> {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, p)| **p == Some(joint))
            .map(|(k, _)| k)
            .collect()
    }

    /// Joints from `joint` up to the root, starting with `joint` itself.
    pub fn ancestors(&self, joint: usize) -> impl Iterator<Item = usize> + '_ {
        core::iter::successors(Some(joint), move |&j| self.parent(j))
    }

    /// `global[i] = global[parent[i]] * local[i]`, `global[0] = local[0]`.
    pub fn local_to_global(&self, local: &[RigidTransform]) -> SimResult<Vec<RigidTransform>> {
        check_len("pose", self.parents.len(), local.len())?;
        Ok(forward_pass(local, &self.parents))
    }

    /// Inverse of [`local_to_global`](Self::local_to_global), using rigid
    /// inverses of the parents' global transforms.
    pub fn global_to_local(&self, global: &[RigidTransform]) -> SimResult<Vec<RigidTransform>> {
        check_len("pose", self.parents.len(), global.len())?;
        Ok(inverse_pass(global, &self.parents))
    }

    /// Scale the skeleton uniformly (translations only, rotations are kept).
    pub fn scale(&mut self, s: f32) {
        for t in self.rest_local.iter_mut() {
            t.translation *= s;
        }
        self.rest_global = forward_pass(&self.rest_local, &self.parents);
    }

    /// Place the whole skeleton by pre-multiplying the root's rest transform.
    pub fn apply_root_transform(&mut self, transform: RigidTransform) {
        self.rest_local[0] = transform * self.rest_local[0];
        self.rest_global = forward_pass(&self.rest_local, &self.parents);
    }
}

/// Compose a local pose into global transforms for an arbitrary parent array.
pub fn local_to_global(local: &[RigidTransform], parents: &[Option<usize>]) -> SimResult<Vec<RigidTransform>> {
    validate_parents(parents)?;
    check_len("pose", parents.len(), local.len())?;
    Ok(forward_pass(local, parents))
}

/// Inverse of [`local_to_global`].
pub fn global_to_local(global: &[RigidTransform], parents: &[Option<usize>]) -> SimResult<Vec<RigidTransform>> {
    validate_parents(parents)?;
    check_len("pose", parents.len(), global.len())?;
    Ok(inverse_pass(global, parents))
}

fn check_len(name: &'static str, expected: usize, actual: usize) -> SimResult<()> {
    if expected != actual {
        return Err(SimError::LengthMismatch { name, expected, actual });
    }
    Ok(())
}

fn validate_parents(parents: &[Option<usize>]) -> SimResult<()> {
    if parents.is_empty() {
        return Err(SimError::EmptySkeleton);
    }
    if parents[0].is_some() {
        return Err(SimError::RootHasParent);
    }
    for (joint, parent) in parents.iter().enumerate().skip(1) {
        match parent {
            None => return Err(SimError::MissingParent { joint }),
            Some(p) if *p >= joint => return Err(SimError::InvalidParent { joint, parent: *p }),
            Some(_) => {}
        }
    }
    Ok(())
}

/// Requires validated parents, so `global[parent]` is always filled.
fn forward_pass(local: &[RigidTransform], parents: &[Option<usize>]) -> Vec<RigidTransform> {
    let mut global: Vec<RigidTransform> = Vec::with_capacity(local.len());
    for (l, parent) in local.iter().zip(parents) {
        let g = match parent {
            Some(p) => global[*p] * *l,
            None => *l,
        };
        global.push(g);
    }
    global
}

fn inverse_pass(global: &[RigidTransform], parents: &[Option<usize>]) -> Vec<RigidTransform> {
    global
        .iter()
        .zip(parents)
        .map(|(g, parent)| match parent {
            Some(p) => global[*p].inverse() * *g,
            None => *g,
        })
        .collect()
}
