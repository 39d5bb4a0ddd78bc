pub mod accumulator;
pub mod audio;
pub mod classifier;
pub mod combiner;
pub mod dsp;
pub mod ensemble;
pub mod scratch;
