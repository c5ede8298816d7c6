//! Workbook session: options, writes, reads and saving

use crate::error::{SheetMapError, SheetMapResult};
use crate::options::{OptionOutcome, Options, SessionOption};
use crate::reader;
use crate::schema::Record;
use crate::workbook::Workbook;
use crate::writer;
use std::path::Path;
use tracing::debug;

/// A workbook session.
///
/// Writes go to an output workbook that starts as a copy of the template
/// (or blank without one). Reads come from the input workbook.
#[derive(Debug)]
pub struct Session {
    options: Options,
    outcomes: Vec<OptionOutcome>,
    output: Option<Workbook>,
    closed: bool,
}

impl Session {
    /// Build a session. Options that fail to load are skipped, never fatal.
    pub fn new(options: impl IntoIterator<Item = SessionOption>) -> Self {
        let (options, outcomes) = Options::apply(options);
        debug!(
            template = options.has_template(),
            input = options.has_input(),
            placeholder = options.is_placeholder(),
            "session created"
        );
        Self {
            options,
            outcomes,
            output: None,
            closed: false,
        }
    }

    /// Outcome of every construction option, in order
    pub fn outcomes(&self) -> &[OptionOutcome] {
        &self.outcomes
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn has_template(&self) -> bool {
        self.options.has_template()
    }

    pub fn has_input(&self) -> bool {
        self.options.has_input()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The output workbook, once something was written
    pub fn workbook(&self) -> Option<&Workbook> {
        self.output.as_ref()
    }

    fn base_workbook(&self) -> Workbook {
        self.options.template.clone().unwrap_or_default()
    }

    fn ensure_open(&self) -> SheetMapResult<()> {
        if self.closed {
            return Err(SheetMapError::Closed);
        }
        Ok(())
    }

    /// Write records into the sheet of `T`
    pub fn write<T: Record>(&mut self, records: &[T]) -> SheetMapResult<()> {
        self.ensure_open()?;
        if self.output.is_none() {
            self.output = Some(self.base_workbook());
        }
        let output = self.output.get_or_insert_with(Workbook::new);
        writer::write_records(
            output,
            records,
            &self.options.validations,
            self.options.placeholder,
        )
    }

    /// Append the records of `T`'s sheet in the input workbook to `out`
    pub fn read<T: Record>(&self, out: &mut Vec<T>) -> SheetMapResult<()> {
        self.ensure_open()?;
        let input = self.options.input.as_ref().ok_or_else(|| {
            SheetMapError::NotFound("No input workbook is configured".to_string())
        })?;
        reader::read_records(input, out).map(|_| ())
    }

    /// Read the records of `T` into a new vector
    pub fn read_all<T: Record>(&self) -> SheetMapResult<Vec<T>> {
        let mut records = Vec::new();
        self.read(&mut records)?;
        Ok(records)
    }

    /// Save the output workbook as an `.xlsx` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SheetMapResult<()> {
        self.ensure_open()?;
        match &self.output {
            Some(output) => output.save(path),
            None => self.base_workbook().save(path),
        }
    }

    /// Encode the output workbook as `.xlsx` bytes
    pub fn save_to_buffer(&self) -> SheetMapResult<Vec<u8>> {
        self.ensure_open()?;
        match &self.output {
            Some(output) => output.save_to_buffer(),
            None => self.base_workbook().save_to_buffer(),
        }
    }

    /// Release every workbook. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.options.template = None;
        self.options.input = None;
        self.output = None;
        self.closed = true;
        debug!("session closed");
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}
