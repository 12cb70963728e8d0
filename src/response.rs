use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::request::ResolutionResult;
use crate::{FreqError, Result};

/// What the mailer does with a file once the session is over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Disposition {
    /// `=`
    EraseIfSent,
    /// `+`
    KeepAlways,
    /// `-`
    EraseAlways,
}

impl Disposition {
    pub fn as_char(self) -> char {
        match self {
            Disposition::EraseIfSent => '=',
            Disposition::KeepAlways => '+',
            Disposition::EraseAlways => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseDirective {
    pub disposition: Disposition,
    pub path: PathBuf,
}

impl ResponseDirective {
    pub fn new(disposition: Disposition, path: impl Into<PathBuf>) -> Self {
        Self {
            disposition,
            path: path.into(),
        }
    }
}

impl fmt::Display for ResponseDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.disposition.as_char(), self.path.display())
    }
}

/// Directives that were appended and where the list stood before them
#[derive(Debug, Clone)]
pub struct ComposedResponse {
    pub directives: Vec<ResponseDirective>,
    pub previous_len: u64,
}

pub struct ResponseComposer<'a> {
    session: &'a str,
    default_notice: &'a Path,
}

impl<'a> ResponseComposer<'a> {
    pub fn new(session: &'a str, default_notice: &'a Path) -> Self {
        Self {
            session,
            default_notice,
        }
    }

    /// Directives for the results, with the notice when nothing resolved
    pub fn directives<'r>(
        &self,
        results: impl IntoIterator<Item = &'r ResolutionResult>,
    ) -> Vec<ResponseDirective> {
        let mut directives: Vec<ResponseDirective> = results
            .into_iter()
            .filter_map(|result| match result {
                ResolutionResult::Fulfilled(path) => Some(
                    ResponseDirective::new(Disposition::EraseIfSent, path),
                ),
                ResolutionResult::Unfulfilled(_) => None,
            })
            .collect();

        if directives.is_empty() {
            log::info!(
                "[{}] nothing found, sending {}",
                self.session,
                self.default_notice.display()
            );
            directives.push(ResponseDirective::new(
                Disposition::KeepAlways,
                self.default_notice,
            ));
        }
        directives
    }

    /// Append directives to the response list, one write per line
    pub fn append(
        &self,
        path: &Path,
        directives: Vec<ResponseDirective>,
    ) -> Result<ComposedResponse> {
        let failed = |source: std::io::Error| FreqError::ResponseWriteFailed {
            session: self.session.to_owned(),
            path: path.to_path_buf(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(failed)?;
        let previous_len = file.metadata().map_err(failed)?.len();

        let written = directives
            .iter()
            .try_for_each(|directive| write_line(&mut file, directive))
            .and_then(|()| file.flush());
        if let Err(e) = written {
            drop(file);
            if let Err(rollback) = truncate(path, previous_len) {
                log::error!(
                    "[{}] {} left with a partial answer: {}",
                    self.session,
                    path.display(),
                    rollback
                );
            }
            return Err(failed(e));
        }

        log::info!(
            "[{}] {} directives appended to {}",
            self.session,
            directives.len(),
            path.display()
        );
        Ok(ComposedResponse {
            directives,
            previous_len,
        })
    }
}

fn write_line(
    file: &mut File,
    directive: &ResponseDirective,
) -> std::io::Result<()> {
    file.write_all(format!("{}\n", directive).as_bytes())
}

/// Cut a response list back to the length it had before an append
pub(crate) fn truncate(path: &Path, len: u64) -> std::io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(len)
}
