//! Session construction options
//!
//! Options are applied in order. Options that open a workbook or read a
//! file soft-fail: the failure is logged and recorded as a skipped
//! [`OptionOutcome`], and construction carries on without that option.

use crate::error::SheetMapResult;
use crate::validation::{self, NamedLists};
use crate::workbook::Workbook;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Where a workbook (or a YAML validation file) comes from
pub enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + Send>),
}

impl Source {
    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        Source::Reader(Box::new(reader))
    }

    fn open_workbook(self) -> SheetMapResult<Workbook> {
        match self {
            Source::Path(path) => Workbook::open(path),
            Source::Bytes(bytes) => Workbook::from_bytes(&bytes),
            Source::Reader(reader) => Workbook::from_reader(reader),
        }
    }

    fn read_to_string(self) -> SheetMapResult<String> {
        match self {
            Source::Path(path) => Ok(std::fs::read_to_string(path)?),
            Source::Bytes(bytes) => {
                String::from_utf8(bytes).map_err(|e| std::io::Error::other(e).into())
            }
            Source::Reader(mut reader) => {
                let mut text = String::new();
                reader.read_to_string(&mut text)?;
                Ok(text)
            }
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Source::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Source::Reader(_) => f.write_str("Reader"),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => write!(f, "{}", path.display()),
            Source::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Source::Reader(_) => f.write_str("<reader>"),
        }
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<String> for Source {
    fn from(path: String) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes)
    }
}

impl From<&[u8]> for Source {
    fn from(bytes: &[u8]) -> Self {
        Source::Bytes(bytes.to_vec())
    }
}

/// One construction option
#[derive(Debug)]
pub enum SessionOption {
    /// Base workbook for writes
    Template(Source),
    /// Workbook to read records from
    Input(Source),
    /// Named validation lists
    Validations(NamedLists),
    /// Named validation lists from a YAML mapping
    ValidationsYaml(Source),
    /// Write below existing template content without a header row
    Placeholder,
}

impl SessionOption {
    pub fn name(&self) -> &'static str {
        match self {
            SessionOption::Template(_) => "template",
            SessionOption::Input(_) => "input",
            SessionOption::Validations(_) => "validations",
            SessionOption::ValidationsYaml(_) => "validations_yaml",
            SessionOption::Placeholder => "placeholder",
        }
    }
}

/// Use a workbook as the template for writes
pub fn with_template(source: impl Into<Source>) -> SessionOption {
    SessionOption::Template(source.into())
}

/// Use a workbook as the input for reads
pub fn with_input(source: impl Into<Source>) -> SessionOption {
    SessionOption::Input(source.into())
}

/// Alias of [`with_input`]
pub fn with_excel(source: impl Into<Source>) -> SessionOption {
    with_input(source)
}

/// Register named validation lists
pub fn with_validations(lists: NamedLists) -> SessionOption {
    SessionOption::Validations(lists)
}

/// Register named validation lists from YAML (`name: [a, b]`)
pub fn with_validations_yaml(source: impl Into<Source>) -> SessionOption {
    SessionOption::ValidationsYaml(source.into())
}

/// Treat existing template content as the header
pub fn as_placeholder() -> SessionOption {
    SessionOption::Placeholder
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionStatus {
    Applied,
    Skipped(String),
}

/// What happened to one option during construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionOutcome {
    pub option: &'static str,
    pub status: OptionStatus,
}

impl OptionOutcome {
    pub fn is_applied(&self) -> bool {
        self.status == OptionStatus::Applied
    }
}

/// Resolved session configuration
#[derive(Debug, Default)]
pub struct Options {
    pub(crate) template: Option<Workbook>,
    pub(crate) input: Option<Workbook>,
    pub(crate) validations: NamedLists,
    pub(crate) placeholder: bool,
}

impl Options {
    /// Apply options in order. Never fails; see the returned outcomes.
    pub fn apply(options: impl IntoIterator<Item = SessionOption>) -> (Self, Vec<OptionOutcome>) {
        let mut config = Options::default();
        let outcomes = options
            .into_iter()
            .map(|option| {
                let name = option.name();
                let status = match config.apply_one(option) {
                    Ok(()) => OptionStatus::Applied,
                    Err(diagnostic) => {
                        warn!(option = name, "skipping option: {}", diagnostic);
                        OptionStatus::Skipped(diagnostic)
                    }
                };
                OptionOutcome {
                    option: name,
                    status,
                }
            })
            .collect();
        (config, outcomes)
    }

    fn apply_one(&mut self, option: SessionOption) -> Result<(), String> {
        match option {
            SessionOption::Template(source) => {
                let described = source.to_string();
                let workbook = source
                    .open_workbook()
                    .map_err(|e| format!("failed to open template excel {}: {}", described, e))?;
                self.template = Some(workbook);
            }
            SessionOption::Input(source) => {
                let described = source.to_string();
                let workbook = source
                    .open_workbook()
                    .map_err(|e| format!("failed to open excel {}: {}", described, e))?;
                self.input = Some(workbook);
            }
            SessionOption::Validations(lists) => self.validations.extend(lists),
            SessionOption::ValidationsYaml(source) => {
                let described = source.to_string();
                let lists = source
                    .read_to_string()
                    .and_then(|yaml| validation::parse_named_lists(&yaml))
                    .map_err(|e| format!("failed to load validations {}: {}", described, e))?;
                self.validations.extend(lists);
            }
            SessionOption::Placeholder => self.placeholder = true,
        }
        Ok(())
    }

    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn validations(&self) -> &NamedLists {
        &self.validations
    }
}
