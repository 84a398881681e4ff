//! Streaming writer for the JSON export file.
//!
//! The file is one object whose properties are arrays of records. Records
//! are serialized one at a time as they are exported, so a run never holds
//! a whole array in memory.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Start,
    Object { arrays: usize },
    Array { arrays: usize, elements: usize },
    Finished,
}

pub struct JsonSink<W: Write> {
    writer: W,
    state: SinkState,
}

impl JsonSink<BufWriter<File>> {
    /// Create (or truncate) the export file.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            state: SinkState::Start,
        }
    }

    /// Open a named array property.
    pub fn begin_array(&mut self, name: &str) -> io::Result<()> {
        let arrays = match self.state {
            SinkState::Start => {
                self.writer.write_all(b"{\n")?;
                0
            }
            SinkState::Object { arrays } => {
                self.writer.write_all(b",\n")?;
                arrays
            }
            state => return Err(invalid_state("begin an array", state)),
        };

        let key = serde_json::to_string(name)?;
        write!(self.writer, "  {key}: [")?;
        self.state = SinkState::Array {
            arrays,
            elements: 0,
        };
        Ok(())
    }

    /// Append one record to the open array.
    pub fn write_record<T: Serialize + ?Sized>(&mut self, record: &T) -> io::Result<()> {
        let SinkState::Array { arrays, elements } = self.state else {
            return Err(invalid_state("write a record", self.state));
        };

        let json = serde_json::to_string_pretty(record)?;
        if elements > 0 {
            self.writer.write_all(b",")?;
        }
        for line in json.lines() {
            write!(self.writer, "\n    {line}")?;
        }

        self.state = SinkState::Array {
            arrays,
            elements: elements + 1,
        };
        Ok(())
    }

    /// Close the open array.
    pub fn end_array(&mut self) -> io::Result<()> {
        let SinkState::Array { arrays, elements } = self.state else {
            return Err(invalid_state("end an array", self.state));
        };

        if elements == 0 {
            self.writer.write_all(b"]")?;
        } else {
            self.writer.write_all(b"\n  ]")?;
        }
        self.state = SinkState::Object { arrays: arrays + 1 };
        Ok(())
    }

    /// Close the top-level object and flush.
    pub fn finish(&mut self) -> io::Result<()> {
        match self.state {
            SinkState::Start => self.writer.write_all(b"{\n}\n")?,
            SinkState::Object { .. } => self.writer.write_all(b"\n}\n")?,
            state => return Err(invalid_state("finish", state)),
        }
        self.writer.flush()?;
        self.state = SinkState::Finished;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn invalid_state(action: &str, state: SinkState) -> io::Error {
    io::Error::other(format!("Cannot {action} while the JSON sink is in state {state:?}"))
}
