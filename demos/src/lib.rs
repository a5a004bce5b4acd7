//! SegFormer Demos
//!
//! Example applications for the SegFormer decode head.
//!
//! ## Available Examples
//!
//! - `segformer-demo`: Builds a head, runs a forward pass on random backbone features,
//!   computes the segmentation and adversarial losses and checks that the discriminator's
//!   gradient reaches the features reversed.
//!
//! ## Usage
//!
//! ```bash
//! # Four-scale scenario with the default backend
//! cargo run --bin segformer-demo
//!
//! # Custom head configuration, larger batch, GPU backend
//! cargo run --bin segformer-demo --features wgpu -- --config head.json --batch-size 4
//! ```

pub mod backend;

pub use backend::{create_device, get_backend_name, SelectedBackend, SelectedDevice};
