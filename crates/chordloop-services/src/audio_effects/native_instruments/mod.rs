//! Native synth voices

pub mod mono_synth;

pub use mono_synth::{MonoSynth, MAX_BLOCK_SIZE};
