//! DSP primitives — pure Rust processors the signal graph is built from.
//!
//! Every processor is a stateful transform over planar stereo blocks
//! (`process_block(left, right)`), so one render owns its full chain and
//! the output is deterministic across platforms.

pub mod compressor;
pub mod convolver;
pub mod delay;
pub mod filter;
pub mod impulse;
pub mod mixer;
pub mod modulation;
pub mod oscillator;
pub mod panner;
pub mod waveshaper;
