use std::{env, path::PathBuf};

pub fn separator_program() -> PathBuf {
    env::var("ENSEMBLE_SEPARATOR_BIN")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("audio-separator"))
}

pub fn model_dir() -> PathBuf {
    env::var("ENSEMBLE_SEPARATOR_MODEL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("models"))
}

pub fn registry_path() -> Option<PathBuf> {
    env::var("ENSEMBLE_SEPARATOR_REGISTRY")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}
