//! Headless EGL/GLES3.2 compute backend: context acquisition, the compiled
//! kernel catalog, the GPU buffer pool, primitive kernel dispatches, and the
//! tree-reduction engine that composes them into rmsnorm/softmax/argmax.

pub mod backend;
pub mod buffer;
pub mod context;
pub mod kernels;
pub mod primitives;
pub mod reduce;

pub use backend::GlesBackend;
pub use buffer::GpuBuffer;
pub use context::GlesContext;
pub use kernels::{Kernel, KernelCatalog};
pub use primitives::Dispatcher;
pub use reduce::ReduceScratch;
