//! Mean-variance trend smoothing

mod loess;

pub use loess::{loess_fit, Loess, LoessParams};
