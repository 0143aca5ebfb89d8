//! A scripted svn client for tests.
//!
//! Works on a real working copy directory: files are written by the store
//! under test, the fake keeps the repository side (revisions, committed
//! contents, scheduled additions and deletions) in memory and answers the
//! sub-commands the svn store uses with the same output shapes as svn.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use model_vault::{ModelError, SvnExecutor, User};
use quick_xml::escape::escape;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub user: Option<String>,
    pub command: String,
    pub path: PathBuf,
    pub params: Vec<String>,
}

#[derive(Debug, Clone)]
struct Change {
    path: PathBuf,
    action: char,
    content: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
struct Commit {
    revision: i32,
    author: String,
    date: DateTime<Utc>,
    message: String,
    changes: Vec<Change>,
}

#[derive(Debug, Default)]
struct Repo {
    head: i32,
    versioned: BTreeSet<PathBuf>,
    scheduled: BTreeSet<PathBuf>,
    deleted: BTreeSet<PathBuf>,
    contents: BTreeMap<PathBuf, Vec<u8>>,
    commits: Vec<Commit>,
    calls: Vec<Call>,
}

pub struct FakeSvn {
    root: PathBuf,
    repo: Mutex<Repo>,
}

fn unversioned(path: &Path) -> ModelError {
    ModelError::Command {
        command: "svn".into(),
        code: Some(1),
        stderr: format!(
            "svn: warning: W155010: The node '{}' was not found.",
            path.display()
        ),
    }
}

fn missing_revision(path: &Path, revision: &str) -> ModelError {
    ModelError::Command {
        command: "svn".into(),
        code: Some(1),
        stderr: format!(
            "svn: E195012: Unable to find repository location for '{}' in revision {}",
            path.display(),
            revision
        ),
    }
}

impl FakeSvn {
    /// A fake whose working copy root (and everything above it) is versioned.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut repo = Repo::default();
        repo.versioned.insert(root.clone());
        Self {
            root,
            repo: Mutex::new(repo),
        }
    }

    pub fn head(&self) -> i32 {
        self.repo.lock().unwrap().head
    }

    pub fn calls(&self) -> Vec<Call> {
        self.repo.lock().unwrap().calls.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }

    pub fn is_versioned(&self, path: &Path) -> bool {
        self.repo.lock().unwrap().versioned.contains(path)
    }

    fn repo_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        format!("/trunk/{}", parts.join("/"))
    }

    fn tracked(repo: &Repo, path: &Path) -> bool {
        repo.versioned.contains(path) || repo.scheduled.contains(path)
    }

    fn stat(&self, repo: &Repo, path: &Path) -> String {
        if repo.scheduled.contains(path) {
            format!("A       {}\n", path.display())
        } else if repo.versioned.contains(path) {
            String::new()
        } else {
            format!("?       {}\n", path.display())
        }
    }

    fn add(&self, repo: &mut Repo, path: &Path) -> Result<String, ModelError> {
        if Self::tracked(repo, path) {
            return Err(ModelError::Command {
                command: "svn add".into(),
                code: Some(1),
                stderr: format!("svn: warning: W150002: '{}' is already under version control", path.display()),
            });
        }
        match path.parent() {
            Some(parent) if Self::tracked(repo, parent) => {}
            _ => return Err(unversioned(path)),
        }

        let mut pending = vec![path.to_path_buf()];
        let mut out = String::new();
        while let Some(next) = pending.pop() {
            if next.is_dir() {
                for entry in fs::read_dir(&next).unwrap() {
                    pending.push(entry.unwrap().path());
                }
            }
            out.push_str(&format!("A         {}\n", next.display()));
            repo.scheduled.insert(next);
        }
        Ok(out)
    }

    fn commit(&self, repo: &mut Repo, user: Option<&User>, path: &Path, message: &str) -> String {
        let mut changes = Vec::new();
        for added in repo.scheduled.iter().filter(|p| p.starts_with(path)) {
            changes.push(Change {
                path: added.clone(),
                action: 'A',
                content: fs::read(added).ok(),
            });
        }
        for deleted in repo.deleted.iter().filter(|p| p.starts_with(path)) {
            changes.push(Change {
                path: deleted.clone(),
                action: 'D',
                content: None,
            });
        }
        for versioned in repo.versioned.iter().filter(|p| p.starts_with(path) && p.is_file()) {
            let current = fs::read(versioned).ok();
            if current.as_ref() != repo.contents.get(versioned) {
                changes.push(Change {
                    path: versioned.clone(),
                    action: 'M',
                    content: current,
                });
            }
        }
        if changes.is_empty() {
            return String::new();
        }

        repo.head += 1;
        let revision = repo.head;
        for change in &changes {
            repo.scheduled.remove(&change.path);
            repo.deleted.remove(&change.path);
            match &change.content {
                Some(content) => {
                    repo.versioned.insert(change.path.clone());
                    repo.contents.insert(change.path.clone(), content.clone());
                }
                None if change.action == 'D' => {
                    repo.versioned.remove(&change.path);
                    repo.contents.remove(&change.path);
                }
                None => {
                    repo.versioned.insert(change.path.clone());
                }
            }
        }
        let base = Utc.with_ymd_and_hms(2017, 10, 3, 12, 0, 0).unwrap();
        repo.commits.push(Commit {
            revision,
            author: user.map(|u| u.id.clone()).unwrap_or_else(|| "anonymous".into()),
            date: base + Duration::minutes(revision as i64),
            message: message.to_string(),
            changes,
        });
        format!("Committed revision {}.\n", revision)
    }

    fn touching<'a>(repo: &'a Repo, path: &'a Path) -> impl Iterator<Item = &'a Commit> + 'a {
        repo.commits
            .iter()
            .rev()
            .filter(move |c| c.changes.iter().any(|ch| ch.path.starts_with(path)))
    }

    fn info(&self, repo: &Repo, path: &Path) -> Result<String, ModelError> {
        if !repo.versioned.contains(path) {
            return Err(unversioned(path));
        }
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<info>\n");
        xml.push_str(&format!(
            "<entry kind=\"file\" path=\"{}\" revision=\"{}\">\n",
            escape(&path.display().to_string()),
            repo.head
        ));
        if let Some(commit) = Self::touching(repo, path).next() {
            xml.push_str(&format!(
                "<commit revision=\"{}\">\n<author>{}</author>\n<date>{}</date>\n</commit>\n",
                commit.revision,
                escape(&commit.author),
                commit.date.to_rfc3339_opts(SecondsFormat::Micros, true)
            ));
        }
        xml.push_str("</entry>\n</info>\n");
        Ok(xml)
    }

    fn log(&self, repo: &Repo, path: &Path, params: &[&str]) -> Result<String, ModelError> {
        if !Self::tracked(repo, path) {
            return Err(unversioned(path));
        }
        let verbose = params.contains(&"-v");
        let range = params
            .iter()
            .position(|p| *p == "-r")
            .and_then(|i| params.get(i + 1))
            .copied();

        let mut entries: Vec<&Commit> = Self::touching(repo, path).collect();
        match range {
            Some("PREV:0") => {
                if !entries.is_empty() {
                    entries.remove(0);
                }
            }
            Some(revision) => {
                let revision: i32 = revision.parse().unwrap();
                entries.retain(|c| c.revision == revision);
            }
            None => {}
        }

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<log>\n");
        for commit in entries {
            xml.push_str(&format!(
                "<logentry revision=\"{}\">\n<author>{}</author>\n<date>{}</date>\n",
                commit.revision,
                escape(&commit.author),
                commit.date.to_rfc3339_opts(SecondsFormat::Micros, true)
            ));
            if verbose {
                xml.push_str("<paths>\n");
                for change in &commit.changes {
                    xml.push_str(&format!(
                        "<path action=\"{}\" kind=\"{}\">{}</path>\n",
                        change.action,
                        if change.content.is_some() || change.action == 'D' { "file" } else { "dir" },
                        escape(&self.repo_path(&change.path))
                    ));
                }
                xml.push_str("</paths>\n");
            }
            xml.push_str(&format!("<msg>{}</msg>\n</logentry>\n", escape(&commit.message)));
        }
        xml.push_str("</log>\n");
        Ok(xml)
    }

    fn cat(&self, repo: &Repo, path: &Path, params: &[&str]) -> Result<String, ModelError> {
        let revision = params.get(1).copied().unwrap_or("HEAD");
        let wanted: i32 = revision.parse().unwrap_or(repo.head);
        let content = repo
            .commits
            .iter()
            .rev()
            .filter(|c| c.revision <= wanted)
            .find_map(|c| c.changes.iter().find(|ch| ch.path == path))
            .and_then(|ch| ch.content.clone())
            .ok_or_else(|| missing_revision(path, revision))?;
        Ok(String::from_utf8(content).unwrap())
    }

    fn delete(&self, repo: &mut Repo, path: &Path) -> Result<String, ModelError> {
        if !repo.versioned.contains(path) {
            return Err(unversioned(path));
        }
        fs::remove_file(path).map_err(|e| ModelError::io(path.display(), e))?;
        repo.deleted.insert(path.to_path_buf());
        Ok(format!("D         {}\n", path.display()))
    }
}

impl SvnExecutor for FakeSvn {
    fn execute(
        &self,
        user: Option<&User>,
        command: &str,
        path: &Path,
        params: &[&str],
    ) -> Result<String, ModelError> {
        let mut repo = self.repo.lock().unwrap();
        repo.calls.push(Call {
            user: user.map(|u| u.id.clone()),
            command: command.to_string(),
            path: path.to_path_buf(),
            params: params.iter().map(|p| p.to_string()).collect(),
        });

        match command {
            "stat" => Ok(self.stat(&repo, path)),
            "add" => self.add(&mut repo, path),
            "commit" => {
                let message = params.get(1).copied().unwrap_or_default();
                Ok(self.commit(&mut repo, user, path, message))
            }
            "info" => self.info(&repo, path),
            "log" => self.log(&repo, path, params),
            "cat" => self.cat(&repo, path, params),
            "delete" => self.delete(&mut repo, path),
            other => panic!("unexpected svn command {}", other),
        }
    }
}
