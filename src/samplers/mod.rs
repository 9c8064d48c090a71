//! Sampling strategies drawing minimal sets of correspondence indices.
//!
//! Every sampler implements the shared [`Sampler`](crate::core::Sampler)
//! trait, so the consensus search can be driven by any source of
//! uniform-without-replacement draws.

pub mod uniform;

pub use uniform::UniformRandomSampler;
