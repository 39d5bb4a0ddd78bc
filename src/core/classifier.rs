//! Assigns backend stems to a [`Role`].
//!
//! Separation models disagree on how they name their outputs, and the backend
//! gives no structured metadata, so roles are inferred from file names:
//!
//! 1. an instrumental marker (`(instrumental)`, `(inst)`, `(accompaniment)`)
//!    always wins;
//! 2. otherwise a vocal marker (`(vocals)`, `(vocal)`, `(voice)`);
//! 3. otherwise, when the invocation produced more than one stem, the stem at
//!    index 1 is instrumental;
//! 4. anything else is vocal.
//!
//! Matching is done on the lower-cased file name only, never on the directory.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{file_name_of, Role};

const INSTRUMENTAL_MARKERS: [&str; 3] = ["(instrumental)", "(inst)", "(accompaniment)"];
const VOCAL_MARKERS: [&str; 3] = ["(vocals)", "(vocal)", "(voice)"];

/// Which branch of the heuristic decided a stem's role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassificationRule {
    InstrumentalMarker,
    VocalMarker,
    PositionalFallback,
    DefaultFallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedStem {
    pub path: PathBuf,
    pub role: Role,
    pub rule: ClassificationRule,
}

/// Classifies one invocation's output list, preserving its order.
pub fn classify<P: AsRef<Path>>(stems: &[P]) -> Vec<ClassifiedStem> {
    let multi = stems.len() > 1;
    stems
        .iter()
        .enumerate()
        .map(|(index, p)| {
            let path = p.as_ref();
            let (role, rule) = classify_name(file_name_of(path), index, multi);
            match rule {
                ClassificationRule::InstrumentalMarker | ClassificationRule::VocalMarker => {
                    debug!("Stem {:?} -> {} (exact match)", path, role)
                }
                ClassificationRule::PositionalFallback => info!(
                    "Stem {:?} has no role marker; classified {} by position {}",
                    path, role, index
                ),
                ClassificationRule::DefaultFallback => info!(
                    "Stem {:?} has no role marker; defaulting to {}",
                    path, role
                ),
            }
            ClassifiedStem {
                path: path.to_path_buf(),
                role,
                rule,
            }
        })
        .collect()
}

fn classify_name(file_name: &str, index: usize, multi: bool) -> (Role, ClassificationRule) {
    let lower = file_name.to_lowercase();

    if INSTRUMENTAL_MARKERS.iter().any(|m| lower.contains(m)) {
        (Role::Instrumental, ClassificationRule::InstrumentalMarker)
    } else if VOCAL_MARKERS.iter().any(|m| lower.contains(m)) {
        (Role::Vocal, ClassificationRule::VocalMarker)
    } else if multi && index == 1 {
        (Role::Instrumental, ClassificationRule::PositionalFallback)
    } else {
        (Role::Vocal, ClassificationRule::DefaultFallback)
    }
}
