use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::MagicResolver;
use crate::{FreqError, Result};

const PASSWORD_PREFIX: char = '!';

/// One requested name, as written by the remote node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestEntry {
    pub name: String,
    pub password: Option<String>,
}

impl RequestEntry {
    /// Parse a `name [!password] [+time|-time]` line, `None` for blank lines
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let name = fields.next()?.to_owned();
        let mut password = None;
        for field in fields {
            match field.strip_prefix(PASSWORD_PREFIX) {
                Some(secret) => password = Some(secret.to_owned()),
                // update requests, we always send the current file
                None => log::trace!("ignoring {:?} for {}", field, name),
            }
        }
        Some(Self { name, password })
    }
}

/// Read the request list, skipping blank lines
pub fn read_request_list(
    session: &str,
    path: &Path,
) -> Result<Vec<RequestEntry>> {
    let content = fs::read_to_string(path).map_err(|source| {
        FreqError::RequestListUnreadable {
            session: session.to_owned(),
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok(content.lines().filter_map(RequestEntry::parse).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unfulfilled {
    NotFound,
    PasswordMismatch,
    /// The catalog points at a file which is not there
    Missing,
    LimitExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResolutionResult {
    Fulfilled(PathBuf),
    Unfulfilled(Unfulfilled),
}

impl ResolutionResult {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }
}

/// Resolves every request on its own, a miss never stops the pass
pub struct RequestResolutionEngine<'a> {
    session: &'a str,
    resolver: MagicResolver<'a>,
    check_exists: bool,
    max_files: Option<usize>,
}

impl<'a> RequestResolutionEngine<'a> {
    pub fn new(session: &'a str, resolver: MagicResolver<'a>) -> Self {
        Self {
            session,
            resolver,
            check_exists: false,
            max_files: None,
        }
    }

    pub fn check_exists(mut self, check_exists: bool) -> Self {
        self.check_exists = check_exists;
        self
    }

    pub fn max_files(mut self, max_files: Option<usize>) -> Self {
        self.max_files = max_files;
        self
    }

    /// One result per entry, in request order
    pub fn resolve_all(
        &self,
        requests: &[RequestEntry],
    ) -> Vec<(RequestEntry, ResolutionResult)> {
        let mut fulfilled = 0;
        requests
            .iter()
            .map(|request| {
                let limit_reached =
                    self.max_files.map_or(false, |max| fulfilled >= max);
                let result = match self.resolve(request) {
                    Ok(_) if limit_reached => {
                        ResolutionResult::Unfulfilled(Unfulfilled::LimitExceeded)
                    }
                    Ok(path) => {
                        fulfilled += 1;
                        ResolutionResult::Fulfilled(path)
                    }
                    Err(reason) => ResolutionResult::Unfulfilled(reason),
                };
                log::info!(
                    "[{}] {} -> {:?}",
                    self.session,
                    request.name,
                    result
                );
                (request.clone(), result)
            })
            .collect()
    }

    fn resolve(
        &self,
        request: &RequestEntry,
    ) -> std::result::Result<PathBuf, Unfulfilled> {
        let path = self.resolver.resolve(request)?;
        if self.check_exists && !path.is_file() {
            return Err(Unfulfilled::Missing);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use rstest::rstest;
    use tempdir::TempDir;

    fn entries(names: &[&str]) -> Vec<RequestEntry> {
        names
            .iter()
            .filter_map(|name| RequestEntry::parse(name))
            .collect()
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert_alias("fileA.zip", "/data/fileA.zip", None);
        catalog.insert_alias("fileB.zip", "/data/fileB.zip", None);
        catalog
    }

    #[rstest]
    #[case("fileA.zip", Some(("fileA.zip", None)))]
    #[case("  fileA.zip  ", Some(("fileA.zip", None)))]
    #[case("SECRET !pw", Some(("SECRET", Some("pw"))))]
    #[case("NODELIST +1700000000 !pw", Some(("NODELIST", Some("pw"))))]
    #[case("", None)]
    #[case(" \t ", None)]
    fn request_lines_are_parsed(
        #[case] line: &str,
        #[case] expected: Option<(&str, Option<&str>)>,
    ) {
        let parsed = RequestEntry::parse(line);
        let expected = expected.map(|(name, password)| RequestEntry {
            name: name.to_owned(),
            password: password.map(str::to_owned),
        });
        assert_eq!(parsed, expected);
    }

    #[test]
    fn blank_lines_produce_no_result() {
        let dir = TempDir::new("request_blank").unwrap();
        let path = dir.path().join("in.req");
        fs::write(&path, "fileA.zip\n\n   \nfileC.zip\n\t\nfileB.zip").unwrap();

        let requests = read_request_list("test", &path).unwrap();
        assert_eq!(requests.len(), 3);

        let catalog = catalog();
        let engine =
            RequestResolutionEngine::new("test", MagicResolver::new(&catalog));
        let results = engine.resolve_all(&requests);

        assert_eq!(results.len(), 3);
        let names: Vec<&str> =
            results.iter().map(|(r, _)| r.name.as_str()).collect();
        assert_eq!(names, vec!["fileA.zip", "fileC.zip", "fileB.zip"]);
    }

    #[test]
    fn misses_do_not_stop_resolution() {
        let catalog = catalog();
        let engine =
            RequestResolutionEngine::new("test", MagicResolver::new(&catalog));
        let results = engine.resolve_all(&entries(&[
            "nope.zip",
            "fileA.zip",
            "other.zip",
            "fileB.zip",
        ]));

        let fulfilled: Vec<_> = results
            .iter()
            .filter(|(_, result)| result.is_fulfilled())
            .collect();
        assert_eq!(results.len(), 4);
        assert_eq!(fulfilled.len(), 2);
        assert_eq!(
            results[0].1,
            ResolutionResult::Unfulfilled(Unfulfilled::NotFound)
        );
    }

    #[test]
    fn duplicates_resolve_independently() {
        let catalog = catalog();
        let engine =
            RequestResolutionEngine::new("test", MagicResolver::new(&catalog));
        let results = engine.resolve_all(&entries(&["fileA.zip", "fileA.zip"]));

        assert_eq!(results.len(), 2);
        for (_, result) in results {
            assert_eq!(
                result,
                ResolutionResult::Fulfilled(PathBuf::from("/data/fileA.zip"))
            );
        }
    }

    #[test]
    fn max_files_caps_fulfilled_results() {
        let catalog = catalog();
        let engine =
            RequestResolutionEngine::new("test", MagicResolver::new(&catalog))
                .max_files(Some(1));
        let results =
            engine.resolve_all(&entries(&["nope", "fileB.zip", "fileA.zip"]));

        assert_eq!(
            results[0].1,
            ResolutionResult::Unfulfilled(Unfulfilled::NotFound)
        );
        assert!(results[1].1.is_fulfilled());
        assert_eq!(
            results[2].1,
            ResolutionResult::Unfulfilled(Unfulfilled::LimitExceeded)
        );
    }

    #[test]
    fn missing_targets_are_unfulfilled_when_checked() {
        let dir = TempDir::new("request_exists").unwrap();
        let present = dir.path().join("present.txt");
        fs::write(&present, b"here").unwrap();

        let mut catalog = Catalog::new();
        catalog.insert_alias("PRESENT", &present, None);
        catalog.insert_alias("GONE", dir.path().join("gone.txt"), None);

        let engine =
            RequestResolutionEngine::new("test", MagicResolver::new(&catalog))
                .check_exists(true);
        let results = engine.resolve_all(&entries(&["PRESENT", "GONE"]));

        assert_eq!(results[0].1, ResolutionResult::Fulfilled(present));
        assert_eq!(
            results[1].1,
            ResolutionResult::Unfulfilled(Unfulfilled::Missing)
        );
    }

    #[test]
    fn unreadable_request_list_fails() {
        let dir = TempDir::new("request_missing").unwrap();
        let result = read_request_list("2:5020/1", &dir.path().join("none"));

        match result {
            Err(FreqError::RequestListUnreadable { session, .. }) => {
                assert_eq!(session, "2:5020/1")
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
