pub mod greedy;
pub mod multinomial;
pub mod rng;
pub mod sampler;
pub mod top_p;

pub use rng::Xorshift;
pub use sampler::Sampler;
