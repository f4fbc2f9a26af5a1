pub mod hash;
pub mod rng;
