//! Compiler configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::diagnostic::CompilerError;

/// Configuration for the rpcstub compiler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Syntax tree written by the IDL parser.
    pub idl_path: PathBuf,

    /// Interchange format of the syntax tree (default: "json").
    pub format: String,

    /// Directory to write generated code; one subdirectory per target.
    pub out_dir: PathBuf,

    /// Target ecosystems ("python", "typescript").
    pub targets: Vec<String>,

    /// Calling convention used for every function.
    pub convention: CallingConvention,

    /// Version pin sent with every request of dynamic-service clients, and
    /// with asynchronous requests when set.
    pub service_ver: Option<String>,

    /// Default endpoint baked into generated clients.
    pub url: Option<String>,

    /// Polling parameters for the asynchronous convention.
    pub poll: PollConfig,

    /// Also emit the server dispatcher module.
    pub emit_server: bool,

    /// Version and provenance reported by the default status function.
    pub service: ServiceInfo,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            idl_path: PathBuf::from("idl.json"),
            format: "json".to_string(),
            out_dir: PathBuf::from("lib"),
            targets: vec!["python".to_string()],
            convention: CallingConvention::Direct,
            service_ver: None,
            url: None,
            poll: PollConfig::default(),
            emit_server: true,
            service: ServiceInfo::default(),
        }
    }
}

/// How a client invokes each remote function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallingConvention {
    /// One request per call.
    #[default]
    Direct,
    /// Submit a job, then poll until it finishes.
    Async,
    /// Like `Direct`, with a version pin resolved by the endpoint.
    Dynamic,
}

impl CallingConvention {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "direct" | "sync" => Some(CallingConvention::Direct),
            "async" => Some(CallingConvention::Async),
            "dynamic" => Some(CallingConvention::Dynamic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallingConvention::Direct => "direct",
            CallingConvention::Async => "async",
            CallingConvention::Dynamic => "dynamic",
        }
    }
}

/// Backoff parameters for the submit/poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub initial_wait_ms: u64,
    /// Growth per unanswered poll, in percent (150 = x1.5).
    pub scale_percent: u32,
    pub max_wait_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_wait_ms: 100,
            scale_percent: 150,
            max_wait_ms: 300_000,
        }
    }
}

/// Version and provenance of the service being generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceInfo {
    pub version: String,
    pub git_url: String,
    pub git_commit_hash: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            version: "0.0.1".to_string(),
            git_url: String::new(),
            git_commit_hash: String::new(),
        }
    }
}

/// A supported output ecosystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    Python,
    TypeScript,
}

impl Target {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Some(Target::Python),
            "typescript" | "ts" => Some(Target::TypeScript),
            _ => None,
        }
    }

    /// Directory name under the output directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Python => "python",
            Target::TypeScript => "typescript",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CompilerConfig {
    /// Loads a JSON configuration file; absent keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, CompilerError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CompilerError::io(path, e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| CompilerError::InvalidConfig {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Parsed, deduplicated targets in a fixed order.
    pub fn parsed_targets(&self) -> Result<Vec<Target>, CompilerError> {
        let mut targets = BTreeSet::new();
        for name in &self.targets {
            let target = Target::from_str(name).ok_or_else(|| CompilerError::UnsupportedTarget {
                target: name.clone(),
            })?;
            targets.insert(target);
        }
        if targets.is_empty() {
            return Err(CompilerError::InvalidConfig {
                message: "no targets configured".to_string(),
            });
        }
        Ok(targets.into_iter().collect())
    }

    /// Checks everything that can be checked without reading the IDL.
    pub fn validate(&self) -> Result<Vec<Target>, CompilerError> {
        let targets = self.parsed_targets()?;

        if self.poll.initial_wait_ms == 0 {
            return Err(CompilerError::InvalidConfig {
                message: "poll.initial_wait_ms must be positive".to_string(),
            });
        }
        if self.poll.scale_percent < 100 {
            return Err(CompilerError::InvalidConfig {
                message: format!(
                    "poll.scale_percent must be at least 100, got {}",
                    self.poll.scale_percent
                ),
            });
        }
        if self.poll.max_wait_ms < self.poll.initial_wait_ms {
            return Err(CompilerError::InvalidConfig {
                message: "poll.max_wait_ms must not be below poll.initial_wait_ms".to_string(),
            });
        }

        Ok(targets)
    }

    /// Ensures the output directory exists and accepts writes.
    pub fn check_output_writable(&self) -> Result<(), CompilerError> {
        let unwritable = |message: String| CompilerError::UnwritableOutput {
            path: self.out_dir.clone(),
            message,
        };

        std::fs::create_dir_all(&self.out_dir).map_err(|e| unwritable(e.to_string()))?;
        let metadata = std::fs::metadata(&self.out_dir).map_err(|e| unwritable(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(unwritable("not a directory".to_string()));
        }
        if metadata.permissions().readonly() {
            return Err(unwritable("directory is read-only".to_string()));
        }
        Ok(())
    }

    /// The version pin clients send, if any.
    pub fn effective_service_ver(&self) -> Option<String> {
        match self.convention {
            CallingConvention::Dynamic => {
                Some(self.service_ver.clone().unwrap_or_else(|| "release".to_string()))
            }
            _ => self.service_ver.clone(),
        }
    }
}
