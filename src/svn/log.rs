//! Parsing svn output: `stat` lines plus `log --xml` and `info --xml`.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ModelError;

/// Working copy status of a single path (`svn stat --depth empty`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvnStatus {
    Clean,
    NotAdded,
    Added,
    Modified,
    Deleted,
    Other,
}

impl SvnStatus {
    pub fn parse(output: &str) -> Self {
        match output.chars().next() {
            None => SvnStatus::Clean,
            Some('?') => SvnStatus::NotAdded,
            Some('A') => SvnStatus::Added,
            Some('M') => SvnStatus::Modified,
            Some('D') => SvnStatus::Deleted,
            Some(_) => SvnStatus::Other,
        }
    }

    pub fn is_tracked(self) -> bool {
        self != SvnStatus::NotAdded
    }
}

/// A changed path of a verbose log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    pub action: String,
    pub path: String,
}

impl ChangedPath {
    /// Key of the model file the path points to: last segment without `.json`.
    pub fn model_key(&self) -> Option<&str> {
        let name = self.path.rsplit('/').next()?;
        name.strip_suffix(".json")
    }

    /// Name of the directory holding the file.
    pub fn parent_dir(&self) -> Option<&str> {
        let (parent, _) = self.path.rsplit_once('/')?;
        parent.rsplit('/').next()
    }
}

/// One revision from `log --xml`, or the last commit from `info --xml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEntry {
    pub revision: i32,
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub paths: Vec<ChangedPath>,
}

/// Entries of `svn log --xml`, in document order (newest first for
/// descending ranges).
pub fn parse_log(xml: &str) -> Result<Vec<LogEntry>, ModelError> {
    parse_entries(xml, b"logentry")
}

/// Last commit of the target of `svn info --xml`, if the output holds one.
pub fn parse_info(xml: &str) -> Result<Option<LogEntry>, ModelError> {
    Ok(parse_entries(xml, b"commit")?.into_iter().next())
}

/// Whether `output` looks like an XML document at all.
pub fn is_xml(output: &str) -> bool {
    output.trim_start().starts_with("<?xml")
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Author,
    Date,
    Message,
    Path,
}

fn parse_entries(xml: &str, entry_tag: &[u8]) -> Result<Vec<LogEntry>, ModelError> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut current: Option<LogEntry> = None;
    let mut field: Option<Field> = None;
    let mut action = String::new();
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let name = e.name();
                if name.as_ref() == entry_tag {
                    current = Some(LogEntry {
                        revision: revision(&e)?,
                        ..LogEntry::default()
                    });
                } else if current.is_some() {
                    field = match name.as_ref() {
                        b"author" => Some(Field::Author),
                        b"date" => Some(Field::Date),
                        b"msg" => Some(Field::Message),
                        b"path" => {
                            action = attribute(&e, "action")?.unwrap_or_default();
                            Some(Field::Path)
                        }
                        _ => None,
                    };
                    text.clear();
                }
            }
            Event::Empty(e) if e.name().as_ref() == entry_tag => {
                entries.push(LogEntry {
                    revision: revision(&e)?,
                    ..LogEntry::default()
                });
            }
            Event::Text(t) if field.is_some() => {
                text.push_str(&t.unescape().map_err(xml_error)?);
            }
            Event::CData(t) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&t));
            }
            Event::End(e) => {
                let name = e.name();
                if name.as_ref() == entry_tag {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                } else if let (Some(entry), Some(f)) = (current.as_mut(), field.take()) {
                    let value = text.trim().to_string();
                    match f {
                        Field::Author => entry.author = Some(value).filter(|v| !v.is_empty()),
                        Field::Message => entry.message = Some(value).filter(|v| !v.is_empty()),
                        Field::Date => {
                            let date = DateTime::parse_from_rfc3339(&value).map_err(|e| {
                                ModelError::Xml(format!("invalid date {}: {}", value, e))
                            })?;
                            entry.date = Some(date.with_timezone(&Utc));
                        }
                        Field::Path => entry.paths.push(ChangedPath {
                            action: std::mem::take(&mut action),
                            path: value,
                        }),
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(entries)
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, ModelError> {
    match e.try_get_attribute(name).map_err(xml_error)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned())),
        None => Ok(None),
    }
}

fn revision(e: &BytesStart<'_>) -> Result<i32, ModelError> {
    let value = attribute(e, "revision")?
        .ok_or_else(|| ModelError::Xml("entry without revision".into()))?;
    value
        .parse()
        .map_err(|_| ModelError::Xml(format!("invalid revision {}", value)))
}

fn xml_error(e: impl std::fmt::Display) -> ModelError {
    ModelError::Xml(e.to_string())
}
