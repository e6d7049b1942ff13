//! `lg-tensor` - tensor primitives and a headless GLES3.2 compute backend for logit-gpu.
//!
//! This crate provides:
//! - A `Tensor` type backed by CPU storage, used for shape-checked host-side scratch
//! - A `ComputeBackend` trait for pluggable compute, with a `CpuBackend` reference
//!   implementation used to check the GPU dispatch sequence's arithmetic in tests
//! - `gles`: the headless EGL/GLES3.2 compute context, kernel catalog, GPU buffer
//!   pool, primitive kernels, and the tree-reduction engine that drives the forward
//!   pass's on-device math
//! - Shape utilities and data type definitions

pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
#[cfg(feature = "gles")]
pub mod gles;
pub mod shape;
pub mod storage;
pub mod tensor;

pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use storage::CpuStorage;
pub use tensor::Tensor;
