use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::{FreqError, Result};

const UNKNOWN_SESSION: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemoteStatus {
    Protected,
    Unprotected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SystemStatus {
    Listed,
    Unlisted,
}

/// Parsed SRIF: what the mailer tells us about one inbound request session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDescriptor {
    pub request_list: PathBuf,
    pub response_list: PathBuf,
    pub session_id: String,
    pub sysop: Option<String>,
    pub akas: Vec<String>,
    pub our_aka: Option<String>,
    pub password: Option<String>,
    pub remote_status: Option<RemoteStatus>,
    pub system_status: Option<SystemStatus>,
    pub session_type: Option<String>,
    pub baud: Option<String>,
    /// Minutes left for the session, `None` when unlimited
    pub time_limit: Option<u32>,
    pub caller_id: Option<String>,
}

impl SessionDescriptor {
    /// Read and parse a descriptor file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            FreqError::MalformedDescriptor(format!(
                "{} can't be read: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        content.parse()
    }
}

impl FromStr for SessionDescriptor {
    type Err = FreqError;

    fn from_str(content: &str) -> Result<Self> {
        let mut request_list: Option<PathBuf> = None;
        let mut response_list: Option<PathBuf> = None;
        let mut descriptor = SessionDescriptor {
            request_list: PathBuf::new(),
            response_list: PathBuf::new(),
            session_id: UNKNOWN_SESSION.to_owned(),
            sysop: None,
            akas: vec![],
            our_aka: None,
            password: None,
            remote_status: None,
            system_status: None,
            session_type: None,
            baud: None,
            time_limit: None,
            caller_id: None,
        };

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (keyword, value) = match line.split_once(char::is_whitespace)
            {
                Some((keyword, value)) => (keyword, value.trim()),
                None => (line, ""),
            };
            let value = (!value.is_empty()).then(|| value.to_owned());

            match keyword.to_ascii_lowercase().as_str() {
                "requestlist" => request_list = value.map(PathBuf::from),
                "responselist" => response_list = value.map(PathBuf::from),
                "aka" => descriptor.akas.extend(value),
                "sysop" => descriptor.sysop = value,
                "ouraka" => descriptor.our_aka = value,
                "password" => descriptor.password = value,
                "remotestatus" => {
                    descriptor.remote_status =
                        value.as_deref().and_then(parse_remote_status)
                }
                "systemstatus" => {
                    descriptor.system_status =
                        value.as_deref().and_then(parse_system_status)
                }
                "sessiontype" => descriptor.session_type = value,
                "baud" => descriptor.baud = value,
                "time" => {
                    descriptor.time_limit =
                        value.as_deref().map(parse_time).transpose()?.flatten()
                }
                "callerid" => descriptor.caller_id = value,
                other => log::trace!("ignoring descriptor keyword {}", other),
            }
        }

        descriptor.request_list = request_list.ok_or_else(|| {
            FreqError::MalformedDescriptor("RequestList is missing".to_owned())
        })?;
        descriptor.response_list = response_list.ok_or_else(|| {
            FreqError::MalformedDescriptor(
                "ResponseList is missing".to_owned(),
            )
        })?;
        if same_path(&descriptor.request_list, &descriptor.response_list) {
            return Err(FreqError::InvalidDescriptor(descriptor.request_list));
        }
        if let Some(aka) = descriptor.akas.first() {
            descriptor.session_id = aka.clone();
        }

        Ok(descriptor)
    }
}

fn parse_remote_status(value: &str) -> Option<RemoteStatus> {
    match value.to_ascii_uppercase().as_str() {
        "PROTECTED" => Some(RemoteStatus::Protected),
        "UNPROTECTED" => Some(RemoteStatus::Unprotected),
        _ => None,
    }
}

fn parse_system_status(value: &str) -> Option<SystemStatus> {
    match value.to_ascii_uppercase().as_str() {
        "LISTED" => Some(SystemStatus::Listed),
        "UNLISTED" => Some(SystemStatus::Unlisted),
        _ => None,
    }
}

// negative means no limit
/// `./x.lst` and `x.lst` name the same file
fn same_path(a: &Path, b: &Path) -> bool {
    let significant = |path: &Path| {
        path.components()
            .filter(|c| *c != Component::CurDir)
            .collect::<PathBuf>()
    };
    significant(a) == significant(b)
}

fn parse_time(value: &str) -> Result<Option<u32>> {
    let minutes = value.parse::<i64>().map_err(|_| {
        FreqError::MalformedDescriptor(format!("bad Time value {:?}", value))
    })?;
    Ok(u32::try_from(minutes).ok())
}
