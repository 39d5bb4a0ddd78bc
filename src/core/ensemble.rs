//! Ensemble orchestration: run every selected model, sort the stems by role,
//! merge each requested role, and always clean up the scratch space.
//!
//! Progress: setup 0–10%; 10–90% split evenly across models, each slice
//! starting with loading and switching to separation at its midpoint; vocal
//! combination at 90%, instrumental combination at 95%, cleanup at 98%, done
//! at 100%. Loading and separating stay interleaved per model so the reported
//! fraction never goes backwards.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, error, info, info_span, warn};

use crate::{
    core::{
        accumulator::RoleBuckets,
        classifier::{classify, ClassifiedStem},
        combiner::combine,
        scratch::ScratchSpace,
    },
    error::{EnsembleError, Result},
    io::progress::{EnsembleProgress, ProgressCallback, ProgressReporter},
    model::{
        backend::{SeparationBackend, SeparationRequest},
        registry::ModelRegistry,
    },
    types::{
        EnsembleResult, JobPhase, OutputFormat, Role, SeparationJob, SeparationParams,
        StemArtifact,
    },
};

pub struct EnsembleRunner<B: SeparationBackend> {
    registry: ModelRegistry,
    backend: B,
    progress: Option<ProgressCallback>,
}

impl<B: SeparationBackend> EnsembleRunner<B> {
    pub fn new(registry: ModelRegistry, backend: B) -> Self {
        Self {
            registry,
            backend,
            progress: None,
        }
    }

    pub fn with_progress(
        mut self,
        cb: impl Fn(&EnsembleProgress) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(cb));
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Runs the whole ensemble for `job`.
    ///
    /// Unknown model keys are skipped. The first backend failure aborts the
    /// remaining models. The scratch space is released on every path once it
    /// has been created.
    pub fn run(&self, job: &SeparationJob) -> Result<EnsembleResult> {
        let base_name = job.base_name();
        let _span = info_span!("ensemble", input = %base_name).entered();
        let mut progress = ProgressReporter::new(self.progress.clone());

        progress.emit(0.0, "Validating job");
        validate_job(job)?;
        info!("Ensemble for {} with {:?}", base_name, job.models);

        progress.emit(0.05, "Preparing scratch space");
        let mut scratch = ScratchSpace::acquire(&job.output_dir)?;

        let outcome = self
            .separate_all(job, &mut scratch, &mut progress)
            .and_then(|(buckets, skipped)| {
                self.combine_roles(job, &buckets, skipped, &mut progress)
            });

        progress.emit(0.98, "Cleaning up");
        if let Err(e) = scratch.track_contents() {
            warn!("Could not list scratch space {:?}: {}", scratch.path(), e);
        }
        let report = scratch.release();
        if !report.failures.is_empty() {
            warn!(
                "Cleanup left {} item(s) behind: {:?}",
                report.failures.len(),
                report.failures
            );
        }

        match outcome {
            Ok(result) => {
                progress.emit(1.0, "Ensemble complete");
                Ok(result)
            }
            Err(e) => {
                error!("Ensemble failed: {}", e);
                Err(e)
            }
        }
    }

    fn separate_all(
        &self,
        job: &SeparationJob,
        scratch: &mut ScratchSpace,
        progress: &mut ProgressReporter,
    ) -> Result<(RoleBuckets, Vec<String>)> {
        let mut buckets = RoleBuckets::new();
        let mut skipped = Vec::new();
        let total = job.models.len() as f32;

        for (i, key) in job.models.iter().enumerate() {
            let model = match self.registry.resolve(key) {
                Ok(model) => model,
                Err(e) => {
                    warn!("Skipping model: {}", e);
                    skipped.push(key.clone());
                    continue;
                }
            };

            let slice = 0.8 / total;
            let start = 0.1 + slice * i as f32;
            progress.emit(start, format!("Loading {key}"));
            self.backend
                .load_model(model)
                .map_err(|source| EnsembleError::Backend {
                    model: key.clone(),
                    phase: JobPhase::Loading,
                    source,
                })?;

            progress.emit(start + slice / 2.0, format!("Separating with {key}"));
            let request = SeparationRequest {
                audio: &job.audio_path,
                model,
                params: &job.params,
                output_dir: scratch.path(),
                format: job.output_format,
            };
            let stems = self
                .backend
                .separate(&request)
                .map_err(|source| EnsembleError::Backend {
                    model: key.clone(),
                    phase: JobPhase::Separating,
                    source,
                })?;

            for stem in &stems {
                scratch.track(stem);
            }
            debug!("{} produced {} stem(s) via {}", key, stems.len(), self.backend.name());

            for (index, stem) in classify(&stems).into_iter().enumerate() {
                buckets.push(
                    stem.role,
                    StemArtifact {
                        path: stem.path,
                        model: key.clone(),
                        index,
                    },
                );
            }
        }

        Ok((buckets, skipped))
    }

    fn combine_roles(
        &self,
        job: &SeparationJob,
        buckets: &RoleBuckets,
        skipped_models: Vec<String>,
        progress: &mut ProgressReporter,
    ) -> Result<EnsembleResult> {
        let requested = job.role_filter.roles();
        if requested.iter().all(|r| buckets.len(*r) == 0) {
            return Err(EnsembleError::InsufficientStems {
                filter: job.role_filter,
            });
        }

        for role in Role::ALL {
            if !job.role_filter.includes(role) && buckets.len(role) > 0 {
                debug!(
                    "Ignoring {} {} stem(s) excluded by {}",
                    buckets.len(role),
                    role,
                    job.role_filter
                );
            }
        }

        let mut result = EnsembleResult {
            vocal_output: None,
            instrumental_output: None,
            skipped_models,
        };

        for role in requested {
            let paths = buckets.paths(role);
            if paths.is_empty() {
                warn!("No {} stems were produced; skipping that ensemble", role);
                continue;
            }

            let (fraction, label) = match role {
                Role::Vocal => (0.9, "Combining vocals"),
                Role::Instrumental => (0.95, "Combining instrumental"),
            };
            progress.emit(fraction, label);

            let output = match combine(&paths, job.method, &job.output_path_for(role)) {
                Ok(output) => output,
                Err(e) => {
                    discard_outputs(&result);
                    return Err(e.with_role(role));
                }
            };
            info!("{} ensemble of {} stems -> {:?}", role, paths.len(), output);

            match role {
                Role::Vocal => result.vocal_output = Some(output),
                Role::Instrumental => result.instrumental_output = Some(output),
            }
        }

        Ok(result)
    }

    /// Separates `audio` with a single model straight into `output_dir`.
    ///
    /// Unlike [`run`](Self::run) an unknown model is an error here, and the
    /// stems belong to the caller.
    pub fn separate_single(
        &self,
        audio: &Path,
        model_key: &str,
        params: &SeparationParams,
        output_dir: &Path,
        format: OutputFormat,
    ) -> Result<Vec<ClassifiedStem>> {
        let mut progress = ProgressReporter::new(self.progress.clone());

        validate_audio(audio)?;
        let model = self.registry.resolve(model_key)?;
        fs::create_dir_all(output_dir)?;
        info!("Separating {:?} with {}", audio, model_key);

        progress.emit(0.2, "Loading model...");
        self.backend
            .load_model(model)
            .map_err(|source| EnsembleError::Backend {
                model: model_key.to_string(),
                phase: JobPhase::Loading,
                source,
            })?;

        progress.emit(0.7, "Separating audio...");
        let request = SeparationRequest {
            audio,
            model,
            params,
            output_dir,
            format,
        };
        let stems: Vec<PathBuf> =
            self.backend
                .separate(&request)
                .map_err(|source| EnsembleError::Backend {
                    model: model_key.to_string(),
                    phase: JobPhase::Separating,
                    source,
                })?;

        progress.emit(1.0, "Separation complete");
        Ok(classify(&stems))
    }
}

/// Removes ensemble tracks already written by a job that is failing.
fn discard_outputs(result: &EnsembleResult) {
    for path in [&result.vocal_output, &result.instrumental_output]
        .into_iter()
        .flatten()
    {
        match fs::remove_file(path) {
            Ok(()) => debug!("Removed partial ensemble output {:?}", path),
            Err(e) => warn!("Failed to remove partial ensemble output {:?}: {}", path, e),
        }
    }
}

fn validate_audio(audio: &Path) -> Result<()> {
    if audio.as_os_str().is_empty() {
        return Err(EnsembleError::InvalidInput("No audio file provided".into()));
    }
    if !audio.is_file() {
        return Err(EnsembleError::InvalidInput(format!(
            "Audio file does not exist: {}",
            audio.display()
        )));
    }
    Ok(())
}

fn validate_job(job: &SeparationJob) -> Result<()> {
    validate_audio(&job.audio_path)?;
    if job.models.is_empty() {
        return Err(EnsembleError::InvalidInput("No models selected".into()));
    }
    if !job.output_format.is_writable() {
        return Err(EnsembleError::InvalidInput(format!(
            "Ensemble output cannot be written as {}",
            job.output_format
        )));
    }
    Ok(())
}
