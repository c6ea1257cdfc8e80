use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// How the decoder adjusts the case of decoded values.
///
/// Only ASCII letters are changed so `\xHH` bytes keep their value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseMode {
    #[default]
    Preserve,
    Upper,
    Lower,
}

impl CaseMode {
    /// Parse a mode name (case-insensitive). Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Some(Self::Preserve),
            "upper" => Some(Self::Upper),
            "lower" => Some(Self::Lower),
            _ => None,
        }
    }

    pub fn apply(self, value: String) -> String {
        match self {
            Self::Preserve => value,
            Self::Upper => value.to_ascii_uppercase(),
            Self::Lower => value.to_ascii_lowercase(),
        }
    }
}

/// What to do with an argument token that does not open with a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnquotedArgs {
    /// Treat the whole line as undecodable.
    #[default]
    Reject,
    /// Start a token at the stray character and read until the next quote.
    Lenient,
}

impl UnquotedArgs {
    /// Parse a policy name (case-insensitive). Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "lenient" => Some(Self::Lenient),
            _ => None,
        }
    }
}

/// Decoder options. The defaults reproduce the input text exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ParserConfig {
    pub command_case: CaseMode,
    pub args_case: CaseMode,
    pub unquoted_args: UnquotedArgs,
}

/// Private: parsed representation of a redmon config file.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RedmonFile {
    parser: Option<ParserSection>,
}

/// Every key optional so layered files only override what they set.
#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ParserSection {
    command_case: Option<CaseMode>,
    args_case: Option<CaseMode>,
    unquoted_args: Option<UnquotedArgs>,
}

impl ParserSection {
    fn apply_to(self, config: &mut ParserConfig) {
        if let Some(v) = self.command_case {
            config.command_case = v;
        }
        if let Some(v) = self.args_case {
            config.args_case = v;
        }
        if let Some(v) = self.unquoted_args {
            config.unquoted_args = v;
        }
    }
}

/// Read the `[parser]` section of `path`. Returns `Ok(None)` if the file does
/// not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, is not valid TOML,
/// or carries unknown keys or values in `[parser]`.
fn read_section(path: &Path) -> anyhow::Result<Option<ParserSection>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("failed to read config file: {}", path.display())));
        }
    };
    let file: RedmonFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(file.parser)
}

/// Config file paths in ascending priority:
/// 1. `{config_dir}/redmon/config.toml` (user-level, platform-native)
/// 2. `{project_root}/.redmon/config.toml`
pub fn default_config_paths(project_root: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(config) = dirs::config_dir() {
        paths.push(config.join("redmon").join("config.toml"));
    }
    if let Some(root) = project_root {
        paths.push(root.join(".redmon").join("config.toml"));
    }
    paths
}

/// Walk up from `dir` to the nearest ancestor containing `.redmon/` or `.git`.
/// Falls back to `dir` itself if neither is found.
pub fn project_root_for(dir: &Path) -> PathBuf {
    let mut current = dir.to_path_buf();
    loop {
        if current.join(".redmon").is_dir() || current.join(".git").exists() {
            return current;
        }
        if !current.pop() {
            break;
        }
    }
    dir.to_path_buf()
}

/// Environment overrides, applied after every file.
pub const ENV_COMMAND_CASE: &str = "REDMON_COMMAND_CASE";
pub const ENV_ARGS_CASE: &str = "REDMON_ARGS_CASE";
pub const ENV_UNQUOTED_ARGS: &str = "REDMON_UNQUOTED_ARGS";

impl ParserConfig {
    /// Load using auto-detected paths. Priority:
    /// 1. `REDMON_*` environment variables
    /// 2. `{project_root}/.redmon/config.toml` `[parser]`
    /// 3. `{config_dir}/redmon/config.toml` `[parser]`
    /// 4. Defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an existing config file is unreadable or invalid.
    pub fn load(verbose: bool) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().unwrap_or_default();
        let root = project_root_for(&cwd);
        let mut config = Self::load_from(&default_config_paths(Some(&root)))?;
        config.apply_env(verbose);
        Ok(config)
    }

    /// Layer `paths` over the defaults, later paths winning. Missing files
    /// are skipped. Does not consult the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing config file is unreadable or invalid.
    pub fn load_from(paths: &[PathBuf]) -> anyhow::Result<Self> {
        let mut config = Self::default();
        for path in paths {
            if let Some(section) = read_section(path)? {
                section.apply_to(&mut config);
            }
        }
        Ok(config)
    }

    /// Override fields from `REDMON_*` environment variables. Unknown values
    /// are ignored (with a warning when `verbose`).
    pub fn apply_env(&mut self, verbose: bool) {
        if let Ok(val) = std::env::var(ENV_COMMAND_CASE) {
            match CaseMode::parse(&val) {
                Some(mode) => self.command_case = mode,
                None => warn_env(verbose, ENV_COMMAND_CASE, &val),
            }
        }
        if let Ok(val) = std::env::var(ENV_ARGS_CASE) {
            match CaseMode::parse(&val) {
                Some(mode) => self.args_case = mode,
                None => warn_env(verbose, ENV_ARGS_CASE, &val),
            }
        }
        if let Ok(val) = std::env::var(ENV_UNQUOTED_ARGS) {
            match UnquotedArgs::parse(&val) {
                Some(policy) => self.unquoted_args = policy,
                None => warn_env(verbose, ENV_UNQUOTED_ARGS, &val),
            }
        }
    }

    /// Validate a single config file, including one that does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is missing, unreadable, or invalid.
    pub fn check_file(path: &Path) -> anyhow::Result<Self> {
        let section = read_section(path)?
            .ok_or_else(|| anyhow::anyhow!("config file not found: {}", path.display()))?;
        let mut config = Self::default();
        section.apply_to(&mut config);
        Ok(config)
    }
}

fn warn_env(verbose: bool, var: &str, val: &str) {
    if verbose {
        eprintln!("[redmon] warning: ignoring {var}={val:?} (unknown value)");
    }
}
