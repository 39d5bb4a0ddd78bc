use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::error::{EnsembleError, Result};

#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// Semantic category of a separated stem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Vocal,
    Instrumental,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Vocal, Role::Instrumental];

    /// Name used in ensemble output file names.
    pub fn file_label(&self) -> &'static str {
        match self {
            Role::Vocal => "vocals",
            Role::Instrumental => "instrumental",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_label())
    }
}

/// Which roles the caller wants combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleFilter {
    #[default]
    AllRoles,
    InstrumentalOnly,
}

impl RoleFilter {
    pub fn includes(&self, role: Role) -> bool {
        match self {
            RoleFilter::AllRoles => true,
            RoleFilter::InstrumentalOnly => role == Role::Instrumental,
        }
    }

    pub fn roles(&self) -> Vec<Role> {
        Role::ALL.into_iter().filter(|r| self.includes(*r)).collect()
    }
}

impl fmt::Display for RoleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleFilter::AllRoles => f.write_str("all-roles"),
            RoleFilter::InstrumentalOnly => f.write_str("instrumental-only"),
        }
    }
}

/// How stems of one role are merged into a single track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationMethod {
    #[default]
    AvgWave,
    MedianWave,
    MaxWave,
    MinWave,
    AvgFft,
    MinFft,
    MaxFft,
}

impl CombinationMethod {
    pub const ALL: [CombinationMethod; 7] = [
        CombinationMethod::AvgWave,
        CombinationMethod::MedianWave,
        CombinationMethod::MaxWave,
        CombinationMethod::MinWave,
        CombinationMethod::AvgFft,
        CombinationMethod::MinFft,
        CombinationMethod::MaxFft,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CombinationMethod::AvgWave => "avg_wave",
            CombinationMethod::MedianWave => "median_wave",
            CombinationMethod::MaxWave => "max_wave",
            CombinationMethod::MinWave => "min_wave",
            CombinationMethod::AvgFft => "avg_fft",
            CombinationMethod::MinFft => "min_fft",
            CombinationMethod::MaxFft => "max_fft",
        }
    }

    pub fn is_spectral(&self) -> bool {
        matches!(
            self,
            CombinationMethod::AvgFft | CombinationMethod::MinFft | CombinationMethod::MaxFft
        )
    }
}

impl fmt::Display for CombinationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CombinationMethod {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        CombinationMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EnsembleError::InvalidInput(format!("Unknown combination method `{s}`")))
    }
}

/// Output container requested for stems and ensemble tracks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Wav,
    Flac,
    Mp3,
    Ogg,
    Opus,
    M4a,
    Aiff,
    Ac3,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 8] = [
        OutputFormat::Wav,
        OutputFormat::Flac,
        OutputFormat::Mp3,
        OutputFormat::Ogg,
        OutputFormat::Opus,
        OutputFormat::M4a,
        OutputFormat::Aiff,
        OutputFormat::Ac3,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Flac => "flac",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Ogg => "ogg",
            OutputFormat::Opus => "opus",
            OutputFormat::M4a => "m4a",
            OutputFormat::Aiff => "aiff",
            OutputFormat::Ac3 => "ac3",
        }
    }

    /// Whether the combiner can encode ensemble tracks in this format.
    pub fn is_writable(&self) -> bool {
        matches!(self, OutputFormat::Wav | OutputFormat::Flac | OutputFormat::Mp3)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EnsembleError::InvalidInput(format!("Unknown output format `{s}`")))
    }
}

/// Per-model parameters forwarded to the separation backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationParams {
    pub segment_size: u32,
    pub override_segment_size: bool,
    pub overlap: u32,
    pub pitch_shift: i32,
    pub batch_size: u32,
    pub normalization_threshold: f32,
    pub amplification_threshold: f32,
    pub use_tta: bool,
    /// Restrict the backend to a single named stem (e.g. "Instrumental").
    pub single_stem: Option<String>,
}

impl Default for SeparationParams {
    fn default() -> Self {
        Self {
            segment_size: 256,
            override_segment_size: false,
            overlap: 8,
            pitch_shift: 0,
            batch_size: 1,
            normalization_threshold: 0.9,
            amplification_threshold: 0.6,
            use_tta: false,
            single_stem: None,
        }
    }
}

/// Immutable description of one ensemble run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeparationJob {
    pub audio_path: PathBuf,
    pub models: Vec<String>,
    #[serde(default)]
    pub params: SeparationParams,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub role_filter: RoleFilter,
    #[serde(default)]
    pub method: CombinationMethod,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl SeparationJob {
    pub fn builder(audio_path: impl Into<PathBuf>) -> SeparationJobBuilder {
        SeparationJobBuilder {
            job: SeparationJob {
                audio_path: audio_path.into(),
                models: Vec::new(),
                params: SeparationParams::default(),
                output_format: OutputFormat::default(),
                role_filter: RoleFilter::default(),
                method: CombinationMethod::default(),
                output_dir: default_output_dir(),
            },
        }
    }

    /// File stem of the input audio, used to name ensemble outputs.
    pub fn base_name(&self) -> String {
        self.audio_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
            .to_string()
    }

    /// `{output_dir}/{base_name}_ensemble_{role}_{method}.{format}`
    pub fn output_path_for(&self, role: Role) -> PathBuf {
        self.output_dir.join(format!(
            "{}_ensemble_{}_{}.{}",
            self.base_name(),
            role.file_label(),
            self.method,
            self.output_format.extension()
        ))
    }
}

pub struct SeparationJobBuilder {
    job: SeparationJob,
}

impl SeparationJobBuilder {
    pub fn model(mut self, key: impl Into<String>) -> Self {
        self.job.models.push(key.into());
        self
    }

    pub fn models<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.job.models.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn params(mut self, params: SeparationParams) -> Self {
        self.job.params = params;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.job.output_format = format;
        self
    }

    pub fn role_filter(mut self, filter: RoleFilter) -> Self {
        self.job.role_filter = filter;
        self
    }

    pub fn method(mut self, method: CombinationMethod) -> Self {
        self.job.method = method;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.job.output_dir = dir.into();
        self
    }

    pub fn build(self) -> SeparationJob {
        self.job
    }
}

/// One file produced by one backend invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StemArtifact {
    pub path: PathBuf,
    pub model: String,
    pub index: usize,
}

pub(crate) fn file_name_of(path: &Path) -> &str {
    path.file_name().and_then(|s| s.to_str()).unwrap_or_default()
}

/// Where the job currently is; attached to failures for context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobPhase {
    Setup,
    Loading,
    Separating,
    Combining,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPhase::Setup => "setup",
            JobPhase::Loading => "loading",
            JobPhase::Separating => "separating",
            JobPhase::Combining => "combining",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug)]
pub struct EnsembleResult {
    pub vocal_output: Option<PathBuf>,
    pub instrumental_output: Option<PathBuf>,
    /// Requested model keys that were not in the registry.
    pub skipped_models: Vec<String>,
}

impl EnsembleResult {
    pub fn output(&self, role: Role) -> Option<&Path> {
        match role {
            Role::Vocal => self.vocal_output.as_deref(),
            Role::Instrumental => self.instrumental_output.as_deref(),
        }
    }
}
