use anyhow::{bail, Context, Result};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info};

use crate::{
    model::registry::ModelEntry,
    types::{OutputFormat, SeparationParams},
    utils,
};

/// Everything one separation call needs.
#[derive(Clone, Copy, Debug)]
pub struct SeparationRequest<'a> {
    pub audio: &'a Path,
    pub model: &'a ModelEntry,
    pub params: &'a SeparationParams,
    pub output_dir: &'a Path,
    pub format: OutputFormat,
}

/// Source separation engine. Opaque to the ensemble: one call turns one audio
/// file into a small, ordered list of stem files written to `output_dir`.
pub trait SeparationBackend: Send + Sync {
    /// Prepares `model` for the following `separate` call.
    fn load_model(&self, model: &ModelEntry) -> Result<()> {
        let _ = model;
        Ok(())
    }

    fn separate(&self, request: &SeparationRequest<'_>) -> Result<Vec<PathBuf>>;

    /// Get the name of this backend (for logging)
    fn name(&self) -> &'static str;
}

/// Runs the external `audio-separator` command line tool.
pub struct CommandBackend {
    program: PathBuf,
    model_dir: PathBuf,
}

impl CommandBackend {
    pub fn new(program: impl Into<PathBuf>, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            model_dir: model_dir.into(),
        }
    }

    /// Program and model directory taken from the environment.
    pub fn from_env() -> Self {
        Self::new(utils::separator_program(), utils::model_dir())
    }

    fn command_for(&self, request: &SeparationRequest<'_>) -> Command {
        let p = request.params;
        let mut cmd = Command::new(&self.program);
        cmd.arg(request.audio)
            .arg("--model_filename")
            .arg(&request.model.file_name)
            .arg("--model_file_dir")
            .arg(&self.model_dir)
            .arg("--output_dir")
            .arg(request.output_dir)
            .arg("--output_format")
            .arg(request.format.extension().to_uppercase())
            .arg("--normalization")
            .arg(p.normalization_threshold.to_string())
            .arg("--amplification")
            .arg(p.amplification_threshold.to_string())
            .arg("--mdxc_segment_size")
            .arg(p.segment_size.to_string())
            .arg("--mdxc_overlap")
            .arg(p.overlap.to_string())
            .arg("--mdxc_batch_size")
            .arg(p.batch_size.to_string())
            .arg("--mdxc_pitch_shift")
            .arg(p.pitch_shift.to_string());
        if p.override_segment_size {
            cmd.arg("--mdxc_override_model_segment_size");
        }
        if p.use_tta {
            cmd.arg("--vr_enable_tta");
        }
        if let Some(stem) = p.single_stem.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            cmd.arg("--single_stem").arg(stem);
        }
        cmd
    }
}

impl SeparationBackend for CommandBackend {
    fn load_model(&self, model: &ModelEntry) -> Result<()> {
        let local = self.model_dir.join(&model.file_name);
        if !local.exists() {
            // The tool downloads missing models itself.
            debug!("Model file {:?} not cached yet", local);
        }
        Ok(())
    }

    fn separate(&self, request: &SeparationRequest<'_>) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(request.output_dir)?;
        let before = list_files(request.output_dir)?;

        info!(
            "Running {:?} with model {} on {:?}",
            self.program, request.model.key, request.audio
        );

        let status = self
            .command_for(request)
            .status()
            .with_context(|| format!("Failed to run separator {:?}", self.program))?;

        if !status.success() {
            bail!("Separator {:?} exited with {}", self.program, status);
        }

        let stems: Vec<PathBuf> = list_files(request.output_dir)?
            .difference(&before)
            .cloned()
            .collect();

        if stems.is_empty() {
            bail!("Separator {:?} produced no stems", self.program);
        }
        Ok(stems)
    }

    fn name(&self) -> &'static str {
        "audio-separator"
    }
}

fn list_files(dir: &Path) -> Result<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.insert(entry.path());
        }
    }
    Ok(files)
}
