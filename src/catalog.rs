use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::request::{RequestEntry, Unfulfilled};
use crate::{FreqError, Result};

const COMMENT_PREFIXES: [char; 2] = [';', '#'];
const PASSWORD_PREFIX: char = '!';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub password: Option<String>,
}

/// Everything the node is willing to serve: magic aliases first, then
/// plain file names found in the public file areas.
///
/// Loaded once per session and only read afterwards.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    aliases: HashMap<String, CatalogEntry>,
    area_files: HashMap<String, PathBuf>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the alias file (when given) and index the file areas
    pub fn load(
        magic_file: Option<&Path>,
        file_areas: &[PathBuf],
    ) -> Result<Self> {
        let mut catalog = Catalog::new();
        if let Some(path) = magic_file {
            catalog.load_aliases(path)?;
        }
        for area in file_areas {
            catalog.index_area(area)?;
        }
        log::debug!(
            "catalog loaded: {} aliases, {} area files",
            catalog.aliases.len(),
            catalog.area_files.len()
        );
        Ok(catalog)
    }

    pub fn insert_alias(
        &mut self,
        alias: impl Into<String>,
        path: impl Into<PathBuf>,
        password: Option<String>,
    ) {
        self.aliases.insert(
            alias.into(),
            CatalogEntry {
                path: path.into(),
                password,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.aliases.len() + self.area_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `ALIAS PATH [!PASSWORD]` lines
    fn load_aliases(&mut self, path: &Path) -> Result<()> {
        let unavailable = |reason: String| FreqError::CatalogUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| unavailable(e.to_string()))?;
        let reader = BufReader::new(file);

        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| unavailable(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with(COMMENT_PREFIXES) {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (alias, target) = match (fields.next(), fields.next()) {
                (Some(alias), Some(target)) => (alias, target),
                _ => {
                    return Err(unavailable(format!(
                        "line {} has no target path",
                        number + 1
                    )))
                }
            };
            let password = match fields.next() {
                None => None,
                Some(field) => match field.strip_prefix(PASSWORD_PREFIX) {
                    Some(secret) if !secret.is_empty() => {
                        Some(secret.to_owned())
                    }
                    _ => {
                        return Err(unavailable(format!(
                            "line {}: {:?} is not a !password",
                            number + 1,
                            field
                        )))
                    }
                },
            };
            if let Some(extra) = fields.next() {
                return Err(unavailable(format!(
                    "line {}: unexpected field {:?}",
                    number + 1,
                    extra
                )));
            }

            self.insert_alias(alias, target, password);
        }

        Ok(())
    }

    fn index_area(&mut self, root: &Path) -> Result<()> {
        log::info!("Indexing file area {}", root.display());

        if !root.is_dir() {
            return Err(FreqError::CatalogUnavailable {
                path: root.to_path_buf(),
                reason: "file area is not a directory".to_owned(),
            });
        }

        let all_files = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in all_files {
            // loops and unreadable entries only cost their own subtree
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("skipping in {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(existing) = self.area_files.get(&name) {
                log::warn!(
                    "{} collides with {}, keeping the first one",
                    entry.path().display(),
                    existing.display()
                );
                continue;
            }
            self.area_files
                .insert(name, entry.path().to_path_buf());
        }

        Ok(())
    }
}

/// Single-level, exact-match lookup of requested names
pub struct MagicResolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> MagicResolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn resolve(
        &self,
        request: &RequestEntry,
    ) -> std::result::Result<PathBuf, Unfulfilled> {
        if let Some(entry) = self.catalog.aliases.get(&request.name) {
            return match &entry.password {
                Some(password)
                    if request.password.as_ref() != Some(password) =>
                {
                    Err(Unfulfilled::PasswordMismatch)
                }
                _ => Ok(entry.path.clone()),
            };
        }

        self.catalog
            .area_files
            .get(&request.name)
            .cloned()
            .ok_or(Unfulfilled::NotFound)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempdir::TempDir;

    fn request(name: &str, password: Option<&str>) -> RequestEntry {
        RequestEntry {
            name: name.to_owned(),
            password: password.map(str::to_owned),
        }
    }

    #[test]
    fn aliases_are_loaded_from_file() {
        let dir = TempDir::new("catalog_aliases").unwrap();
        let magic = dir.path().join("magic.lst");
        fs::write(
            &magic,
            "; magic names\n\
             # another comment\n\
             \n\
             FILES /srv/files.txt\n\
             SECRET   /srv/secret.zip   !letmein\n",
        )
        .unwrap();

        let catalog = Catalog::load(Some(&magic), &[]).unwrap();
        let resolver = MagicResolver::new(&catalog);

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            resolver.resolve(&request("FILES", None)),
            Ok(PathBuf::from("/srv/files.txt"))
        );
        assert_eq!(
            resolver.resolve(&request("SECRET", Some("letmein"))),
            Ok(PathBuf::from("/srv/secret.zip"))
        );
        assert_eq!(
            resolver.resolve(&request("SECRET", None)),
            Err(Unfulfilled::PasswordMismatch)
        );
        assert_eq!(
            resolver.resolve(&request("SECRET", Some("guess"))),
            Err(Unfulfilled::PasswordMismatch)
        );
    }

    #[test]
    fn lookup_is_exact() {
        let mut catalog = Catalog::new();
        catalog.insert_alias("fileA.zip", "/data/fileA.zip", None);
        let resolver = MagicResolver::new(&catalog);

        assert_eq!(
            resolver.resolve(&request("FILEA.ZIP", None)),
            Err(Unfulfilled::NotFound)
        );
        assert_eq!(
            resolver.resolve(&request("fileA.*", None)),
            Err(Unfulfilled::NotFound)
        );
    }

    #[test]
    fn resolving_twice_gives_the_same_answer() {
        let mut catalog = Catalog::new();
        catalog.insert_alias("fileA.zip", "/data/fileA.zip", None);
        let resolver = MagicResolver::new(&catalog);

        let first = resolver.resolve(&request("fileA.zip", None));
        let second = resolver.resolve(&request("fileA.zip", None));
        assert_eq!(first, second);

        let first = resolver.resolve(&request("fileB.zip", None));
        let second = resolver.resolve(&request("fileB.zip", None));
        assert_eq!(first, second);
    }

    #[test]
    fn aliases_do_not_chain() {
        let mut catalog = Catalog::new();
        catalog.insert_alias("A", "B", None);
        catalog.insert_alias("B", "/srv/b.txt", None);
        let resolver = MagicResolver::new(&catalog);

        assert_eq!(
            resolver.resolve(&request("A", None)),
            Ok(PathBuf::from("B"))
        );
    }

    #[test]
    fn line_without_target_is_rejected() {
        let dir = TempDir::new("catalog_broken").unwrap();
        let magic = dir.path().join("magic.lst");
        fs::write(&magic, "GOOD /srv/good\nBROKEN\n").unwrap();

        match Catalog::load(Some(&magic), &[]) {
            Err(FreqError::CatalogUnavailable { reason, .. }) => {
                assert!(reason.contains("line 2"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[rstest]
    #[case("SECRET /srv/secret.zip letmein\n", "line 1")]
    #[case("OPEN /srv/open\nSECRET /srv/secret.zip !\n", "line 2")]
    #[case("SECRET /srv/secret.zip !letmein extra\n", "line 1")]
    fn bad_password_field_is_rejected(
        #[case] content: &str,
        #[case] line: &str,
    ) {
        let dir = TempDir::new("catalog_password").unwrap();
        let magic = dir.path().join("magic.lst");
        fs::write(&magic, content).unwrap();

        match Catalog::load(Some(&magic), &[]) {
            Err(FreqError::CatalogUnavailable { reason, .. }) => {
                assert!(reason.contains(line), "{}", reason)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_file_area_is_unavailable() {
        let dir = TempDir::new("catalog_no_area").unwrap();
        let result = Catalog::load(None, &[dir.path().join("none")]);
        assert!(matches!(
            result,
            Err(FreqError::CatalogUnavailable { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_in_area_is_skipped() {
        let dir = TempDir::new("catalog_loop").unwrap();
        let area = dir.path().join("pub");
        fs::create_dir_all(area.join("sub")).unwrap();
        fs::write(area.join("nodelist.zip"), b"list").unwrap();
        std::os::unix::fs::symlink(&area, area.join("sub").join("back"))
            .unwrap();

        let catalog = Catalog::load(None, &[area.clone()]).unwrap();
        let resolver = MagicResolver::new(&catalog);

        assert_eq!(
            resolver.resolve(&request("nodelist.zip", None)),
            Ok(area.join("nodelist.zip"))
        );
    }

    #[test]
    fn missing_magic_file_is_unavailable() {
        let dir = TempDir::new("catalog_missing").unwrap();
        let result = Catalog::load(Some(&dir.path().join("nope")), &[]);
        assert!(matches!(
            result,
            Err(FreqError::CatalogUnavailable { .. })
        ));
    }

    #[test]
    fn file_areas_serve_by_name_and_aliases_win() {
        let dir = TempDir::new("catalog_areas").unwrap();
        let area = dir.path().join("pub");
        fs::create_dir_all(area.join("nested")).unwrap();
        fs::write(area.join("nodelist.zip"), b"list").unwrap();
        fs::write(area.join("nested").join("readme.txt"), b"hi").unwrap();
        fs::write(area.join(".hidden"), b"no").unwrap();

        let magic = dir.path().join("magic.lst");
        fs::write(&magic, "readme.txt /srv/override.txt\n").unwrap();

        let catalog = Catalog::load(Some(&magic), &[area.clone()]).unwrap();
        let resolver = MagicResolver::new(&catalog);

        assert_eq!(
            resolver.resolve(&request("nodelist.zip", None)),
            Ok(area.join("nodelist.zip"))
        );
        assert_eq!(
            resolver.resolve(&request("readme.txt", None)),
            Ok(PathBuf::from("/srv/override.txt"))
        );
        assert_eq!(
            resolver.resolve(&request(".hidden", None)),
            Err(Unfulfilled::NotFound)
        );
    }
}
