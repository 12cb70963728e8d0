use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{FreqError, Result};

const COMMENT_PREFIXES: [char; 2] = [';', '#'];

/// What to do when the request list can't be removed after answering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalizePolicy {
    /// Keep the composed response, the request may be answered twice
    #[default]
    LogAndContinue,
    /// Cut this session's directives off the response list and fail
    Rollback,
}

impl FromStr for FinalizePolicy {
    type Err = FreqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(Self::LogAndContinue),
            "rollback" => Ok(Self::Rollback),
            _ => Err(FreqError::Config(format!(
                "unknown finalize policy {:?}",
                s
            ))),
        }
    }
}

/// Responder settings, shared read-only by every session of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub magic_file: Option<PathBuf>,
    pub default_notice: PathBuf,
    pub file_areas: Vec<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub finalize_policy: FinalizePolicy,
    pub check_exists: bool,
    pub max_files: Option<usize>,
}

impl Config {
    pub fn new(default_notice: impl Into<PathBuf>) -> Self {
        Self {
            magic_file: None,
            default_notice: default_notice.into(),
            file_areas: vec![],
            log_file: None,
            finalize_policy: FinalizePolicy::default(),
            check_exists: false,
            max_files: None,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            FreqError::Config(format!(
                "{} can't be read: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        content.parse()
    }
}

impl FromStr for Config {
    type Err = FreqError;

    /// `Key value` lines, keys are case-insensitive
    fn from_str(content: &str) -> Result<Self> {
        let mut default_notice = None;
        let mut config = Config::new(PathBuf::new());

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(COMMENT_PREFIXES) {
                continue;
            }

            let (key, value) = line
                .split_once(char::is_whitespace)
                .map(|(key, value)| (key, value.trim()))
                .ok_or_else(|| {
                    FreqError::Config(format!(
                        "line {}: {:?} has no value",
                        number + 1,
                        line
                    ))
                })?;

            match key.to_ascii_lowercase().as_str() {
                "magicfile" => config.magic_file = Some(value.into()),
                "defaultnotice" => default_notice = Some(PathBuf::from(value)),
                "filearea" => config.file_areas.push(value.into()),
                "logfile" => config.log_file = Some(value.into()),
                "finalizepolicy" => config.finalize_policy = value.parse()?,
                "checkexists" => config.check_exists = parse_flag(value)?,
                "maxfiles" => {
                    config.max_files = Some(value.parse().map_err(|_| {
                        FreqError::Config(format!(
                            "MaxFiles must be a number, got {:?}",
                            value
                        ))
                    })?)
                }
                other => {
                    return Err(FreqError::Config(format!(
                        "line {}: unknown key {:?}",
                        number + 1,
                        other
                    )))
                }
            }
        }

        config.default_notice = default_notice.ok_or_else(|| {
            FreqError::Config("DefaultNotice is not set".to_owned())
        })?;
        Ok(config)
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" => Ok(true),
        "no" | "false" | "off" => Ok(false),
        _ => Err(FreqError::Config(format!("bad flag value {:?}", value))),
    }
}
