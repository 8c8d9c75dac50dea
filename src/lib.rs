//! Particle and field simulation core for physically-based animation.
//!
//! `physanim` provides the numerical layer behind character and effects
//! animation: skeletons and skinning, spring-mass cloth, position-based
//! shape matching, free particles, SPH and a Stable Fluids grid solver,
//! plus blend shapes and lattice deformers. It owns no window, GPU or asset
//! code: callers hand in initial geometry and parameters, call `step`, and
//! read positions and normals back out.
//!
//! # Features
//!
//! - **Skeletons**: flat, validated joint hierarchies with local/global conversion
//! - **Animation**: keyframed tracks with slerp, time wrapping and pose blending
//! - **Skinning**: linear blend and dual quaternion skinning
//! - **Inverse kinematics**: cyclic coordinate descent on a local pose
//! - **Cloth**: structural/shear/bend springs, wind, pins, divergence guard
//! - **Shape matching**: predict/project/finalize with polar decomposition
//! - **Particles**: emission, ageing and impulse collisions
//! - **Fluids**: diffusion, semi-Lagrangian advection, pressure projection
//! - **SPH**: poly6/spiky kernels over a cell hash, weakly compressible pressure
//! - **Deformers**: blend shapes and Bernstein free-form lattices
//! - **Observable**: monitor steps via the `StepObserver` trait

pub mod field;
pub mod grid;
pub mod particle;
pub mod constraint;
pub mod transform;
pub mod skeleton;
pub mod animation;
pub mod ik;
pub mod dual_quat;
pub mod skinning;
pub mod cloth;
pub mod softbody;
pub mod solver;
pub mod fluid;
pub mod sph;
pub mod blend_shape;
pub mod ffd;
pub mod observer;
pub mod config;
pub mod error;

// Re-export primary API
pub use field::{Axis, FieldValue};
pub use grid::{apply_boundary, Boundary, Grid2D};
pub use particle::{Particle, ParticleSystem};
pub use constraint::{apply_constraints, CollisionVolume, Constraint, ConstraintTarget};
pub use transform::RigidTransform;
pub use skeleton::{global_to_local, local_to_global, Skeleton};
pub use animation::{blend_poses, AnimationTrack, SkeletonAnimation, TimeWrap};
pub use ik::{solve_ik, IkChain, IkOutcome};
pub use dual_quat::DualQuat;
pub use skinning::{compute_skinning, JointWeight, Rig, SkinningInput, SkinningMethod, SkinningOutput};
pub use cloth::{Cloth, DivergenceKind, DivergenceReport, Spring, SpringKind};
pub use softbody::Deformable;
pub use solver::{polar_decomposition, PbdSolver};
pub use fluid::FluidSolver;
pub use sph::{SphParticle, SphSolver};
pub use blend_shape::{vertex_normals, BlendShape};
pub use ffd::{FreeFormDeformation, Lattice};
pub use config::{ClothConfig, FluidConfig, IkConfig, ParticleConfig, PbdConfig, SphConfig, Wind};
pub use observer::{LoggingObserver, NoOpStepObserver, StepObserver};
pub use error::{SimError, SimResult};
