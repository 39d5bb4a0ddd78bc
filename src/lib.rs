//! # ensemble-separator-core
//!
//! Runs several source-separation models over one recording, sorts their
//! stems into vocal and instrumental roles, and merges each role into a
//! single track.

pub mod core;
pub mod error;
pub mod io;
pub mod model;
pub mod types;
pub mod utils;

pub use crate::{
    core::{
        audio::{read_audio, write_audio, write_audio_as},
        classifier::{classify, ClassificationRule, ClassifiedStem},
        combiner::{combine, combine_audio},
        ensemble::EnsembleRunner,
        scratch::{acquire_scratch, ReleaseReport, ScratchSpace},
    },
    error::{EnsembleError, Result},
    io::progress::EnsembleProgress,
    model::{
        backend::{CommandBackend, SeparationBackend, SeparationRequest},
        registry::{ModelEntry, ModelRegistry},
    },
    types::{
        AudioData, CombinationMethod, EnsembleResult, JobPhase, OutputFormat, Role, RoleFilter,
        SeparationJob, SeparationParams, StemArtifact,
    },
};
