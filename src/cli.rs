//! Argument parsing shared by the pipeline binaries.

use std::path::PathBuf;

use crate::config::{CatalogLocation, ConfigError, Settings};

/// Parsed command line of a pipeline binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    /// Positional arguments in order.
    pub positionals: Vec<String>,
    /// `--model <path>` override of the artifact location.
    pub model_path: Option<PathBuf>,
    /// `--batch-size <n>` override of the insert batch size.
    pub batch_size: Option<usize>,
    /// `-h`/`--help` was given.
    pub help: bool,
}

impl CommandLine {
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positionals.get(index).map(String::as_str)
    }

    /// Positional argument that must be present.
    pub fn required(&self, index: usize, name: &str) -> Result<&str, ConfigError> {
        self.positional(index)
            .ok_or_else(|| ConfigError::Usage(format!("Missing required argument <{name}>")))
    }

    /// Fail when more positionals were given than the command accepts.
    pub fn at_most(&self, count: usize) -> Result<(), ConfigError> {
        match self.positionals.get(count) {
            Some(extra) => Err(ConfigError::Usage(format!("Unexpected argument: {extra}"))),
            None => Ok(()),
        }
    }

    /// Catalog credentials taken from positionals `first` (URL) and `first + 1` (key).
    pub fn catalog_location(&self, first: usize) -> Result<CatalogLocation, ConfigError> {
        CatalogLocation::resolve(self.positional(first), self.positional(first + 1))
    }

    /// Apply command-line overrides on top of loaded settings.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(path) = &self.model_path {
            settings.model_path = path.clone();
        }
        if let Some(size) = self.batch_size {
            settings.insert_batch_size = size;
        }
        settings
    }
}

/// Parse `args` (without the program name).
pub fn parse_command_line(args: Vec<String>) -> Result<CommandLine, ConfigError> {
    let mut parsed = CommandLine::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => parsed.help = true,
            "--model" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| ConfigError::Usage("--model requires a value".to_string()))?;
                parsed.model_path = Some(PathBuf::from(value));
            }
            "--batch-size" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| {
                    ConfigError::Usage("--batch-size requires a value".to_string())
                })?;
                let size = value
                    .parse::<usize>()
                    .ok()
                    .filter(|size| *size > 0)
                    .ok_or_else(|| ConfigError::Usage(format!("Invalid --batch-size value: {value}")))?;
                parsed.batch_size = Some(size);
            }
            flag if flag.starts_with("--") => {
                return Err(ConfigError::Usage(format!("Unknown argument: {flag}")));
            }
            value => parsed.positionals.push(value.to_string()),
        }
        idx += 1;
    }
    Ok(parsed)
}
