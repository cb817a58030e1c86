use std::fs::File;
use std::io::{BufWriter, Stdout, Write};
use std::path::Path;

use serde::Serialize;

use crate::types::{Organization, Report, SearchResult};

// Collection names kept from the original document-store layout.
pub const COLLECTION_SEARCH: &str = "search_items";
pub const COLLECTION_ORG: &str = "org_items";
pub const COLLECTION_REPORT: &str = "report_items";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Terminal stage of the crawl. Implementations decide where the three record
/// collections land; the crawl only ever appends.
pub trait RecordSink {
    fn write_search(&mut self, record: &SearchResult) -> Result<(), SinkError>;
    fn write_organization(&mut self, record: &Organization) -> Result<(), SinkError>;
    fn write_report(&mut self, record: &Report) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    collection: &'static str,
    doc: &'a T,
}

/// Writes collection-tagged JSONL, one `{"collection": …, "doc": …}` object
/// per line.
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl JsonlSink<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl JsonlSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_doc<T: Serialize>(
        &mut self,
        collection: &'static str,
        doc: &T,
    ) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, &Envelope { collection, doc })?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> RecordSink for JsonlSink<W> {
    fn write_search(&mut self, record: &SearchResult) -> Result<(), SinkError> {
        self.write_doc(COLLECTION_SEARCH, record)
    }

    fn write_organization(&mut self, record: &Organization) -> Result<(), SinkError> {
        self.write_doc(COLLECTION_ORG, record)
    }

    fn write_report(&mut self, record: &Report) -> Result<(), SinkError> {
        self.write_doc(COLLECTION_REPORT, record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(self.writer.flush()?)
    }
}
