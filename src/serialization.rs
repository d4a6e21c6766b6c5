//! Writers for entity metadata.
//!
//! Both writers emit the metadata view of each entity, never its raw fields.

use std::io::Write;
use thiserror::Error;

use crate::collection::EntityCollection;
use crate::config::OutputFormat;
use crate::entity::EntityData;

/// Error type for serialization operations
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// NDJSON (Newline Delimited JSON) writer
///
/// Writes one metadata object per line.
pub struct NdjsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a single entity as an NDJSON line
    pub fn write(&mut self, entity: &dyn EntityData) -> Result<(), SerializationError> {
        self.writer.write_all(entity.to_ndjson_line()?.as_bytes())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SerializationError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// JSON array writer
///
/// Writes metadata objects as a single JSON array.
pub struct JsonArrayWriter<W: Write> {
    writer: W,
    first: bool,
}

impl<W: Write> JsonArrayWriter<W> {
    /// Create a new JSON array writer and write the opening bracket
    pub fn new(mut writer: W) -> Result<Self, SerializationError> {
        write!(writer, "[")?;
        Ok(Self {
            writer,
            first: true,
        })
    }

    pub fn write(&mut self, entity: &dyn EntityData) -> Result<(), SerializationError> {
        if !self.first {
            write!(self.writer, ",")?;
        }
        self.first = false;

        write!(self.writer, "{}", entity.to_json()?)?;
        Ok(())
    }

    /// Finish writing the array and close the bracket
    pub fn finish(mut self) -> Result<(), SerializationError> {
        writeln!(self.writer, "]")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Write every entity of a collection in the given format.
///
/// # Returns
/// Number of entities written
pub fn write_collection<W: Write>(
    writer: W,
    collection: &dyn EntityCollection,
    format: OutputFormat,
) -> Result<usize, SerializationError> {
    let entities = collection.get_entities();

    match format {
        OutputFormat::Ndjson => {
            let mut out = NdjsonWriter::new(writer);
            for entity in &entities {
                out.write(*entity)?;
            }
            out.flush()?;
        }
        OutputFormat::Json => {
            let mut out = JsonArrayWriter::new(writer)?;
            for entity in &entities {
                out.write(*entity)?;
            }
            out.finish()?;
        }
    }

    Ok(entities.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::BookCollection;
    use crate::collection::Collection;
    use serde_json::{json, Value};

    fn sample() -> BookCollection {
        BookCollection::from_raw(json!({
            "books": [
                {"title": "Alice", "pages": 42, "publisher": "Macmillan"},
                {"title": "Bob", "rating": 4}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_ndjson_writer() {
        let mut buf = Vec::new();
        let written = write_collection(&mut buf, &sample(), OutputFormat::Ndjson).unwrap();

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(written, 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(serde_json::from_str::<Value>(lines[0]).unwrap(), json!({"title": "Alice", "pages": 42}));
        assert_eq!(serde_json::from_str::<Value>(lines[1]).unwrap(), json!({"title": "Bob", "rating": 4}));
    }

    #[test]
    fn test_json_array_writer() {
        let mut buf = Vec::new();
        write_collection(&mut buf, &sample(), OutputFormat::Json).unwrap();

        let output: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(
            output,
            json!([{"title": "Alice", "pages": 42}, {"title": "Bob", "rating": 4}])
        );
    }

    #[test]
    fn test_json_array_writer_empty() {
        let mut buf = Vec::new();
        let empty = BookCollection::default();
        write_collection(&mut buf, &empty, OutputFormat::Json).unwrap();

        assert_eq!(String::from_utf8(buf).unwrap().trim(), "[]");
    }
}
