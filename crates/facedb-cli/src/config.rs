use facedb_core::{MatchStrategy, OnnxProvider, DEFAULT_TOLERANCE};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime configuration.
///
/// Resolution order: built-in defaults, then the TOML config file (if any),
/// then `FACEDB_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory containing `det_10g.onnx` and `w600k_r50.onnx`.
    pub model_dir: PathBuf,
    /// V4L2 device path.
    pub camera_device: String,
    /// Maximum Euclidean distance for a positive match.
    ///
    /// The default 0.5 suits unnormalised 128-d encodings. The ONNX provider
    /// emits unit-length ArcFace embeddings, where distance `d` corresponds to
    /// cosine similarity `1 - d²/2`: 1.0 to 1.1 accepts cosine 0.5 to 0.4,
    /// while 0.5 demands cosine 0.875.
    pub tolerance: f32,
    /// Gallery scan rule: `first` (default) or `nearest`.
    pub match_strategy: MatchStrategy,
    /// Frames discarded after opening the camera (auto-exposure settling).
    pub warmup_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            db_path: data_dir.join("face_data.db"),
            model_dir: data_dir.join("models"),
            camera_device: "/dev/video0".to_string(),
            tolerance: DEFAULT_TOLERANCE,
            match_strategy: MatchStrategy::First,
            warmup_frames: 4,
        }
    }
}

impl Config {
    /// Load configuration from the config file and the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// [`Config::load`] over an arbitrary variable lookup.
    ///
    /// A `FACEDB_CONFIG` that names a missing file is an error; only the
    /// implicit XDG location may be absent.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = match config_file_path(&lookup)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(&lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override fields from `FACEDB_*` variables. Unparseable values are
    /// logged and ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FACEDB_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEDB_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEDB_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        override_parsed(&lookup, "FACEDB_TOLERANCE", &mut self.tolerance);
        override_parsed(&lookup, "FACEDB_MATCH_STRATEGY", &mut self.match_strategy);
        override_parsed(&lookup, "FACEDB_WARMUP_FRAMES", &mut self.warmup_frames);
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.tolerance.is_finite() && self.tolerance >= 0.0,
            "tolerance must be a non-negative number, got {}",
            self.tolerance
        );
        Ok(())
    }

    /// True when `tolerance` rejects ArcFace pairs the ONNX provider would
    /// still consider the same person.
    pub fn is_strict_for_onnx(&self) -> bool {
        self.tolerance < OnnxProvider::recommended_tolerance()
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment override"),
    }
}

/// `$XDG_DATA_HOME/facedb`, falling back to `~/.local/share/facedb`.
fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
        .join("facedb")
}

/// `FACEDB_CONFIG` (must exist), else `$XDG_CONFIG_HOME/facedb/config.toml`
/// if present.
fn config_file_path(lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = lookup("FACEDB_CONFIG") {
        let path = PathBuf::from(path);
        anyhow::ensure!(
            path.exists(),
            "FACEDB_CONFIG names {}, which does not exist",
            path.display()
        );
        return Ok(Some(path));
    }
    let base = lookup("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".config"));
    let path = base.join("facedb").join("config.toml");
    Ok(path.exists().then_some(path))
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}
