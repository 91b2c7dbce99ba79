//! Row writers for the two output formats.

use crate::error::Result;
use crate::record::{EtymologyRow, COLUMNS};
use clap::ValueEnum;
use serde::Serialize;
use std::io::{BufWriter, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Comma-separated, twelve columns
    #[default]
    Csv,
    /// One JSON object per line
    Jsonl,
}

#[derive(Serialize)]
struct JsonRow<'a> {
    #[serde(flatten)]
    row: &'a EtymologyRow,
    citation: &'a str,
}

enum Sink<W: Write> {
    Csv(csv::Writer<W>),
    Jsonl(BufWriter<W>),
}

/// Writes rows in the selected format, appending the citation tag to each
pub struct RowWriter<W: Write> {
    sink: Sink<W>,
    citation: String,
}

impl<W: Write> RowWriter<W> {
    pub fn new(writer: W, format: OutputFormat, citation: impl Into<String>, header: bool) -> Result<Self> {
        let sink = match format {
            OutputFormat::Csv => {
                let mut csv = csv::WriterBuilder::new()
                    .has_headers(false)
                    .buffer_capacity(256 * 1024)
                    .from_writer(writer);
                if header {
                    csv.write_record(COLUMNS)?;
                }
                Sink::Csv(csv)
            }
            OutputFormat::Jsonl => Sink::Jsonl(BufWriter::with_capacity(256 * 1024, writer)),
        };
        Ok(Self {
            sink,
            citation: citation.into(),
        })
    }

    pub fn write_row(&mut self, row: &EtymologyRow) -> Result<()> {
        match &mut self.sink {
            Sink::Csv(csv) => csv.write_record(row.columns(&self.citation))?,
            Sink::Jsonl(out) => {
                let json = serde_json::to_string(&JsonRow {
                    row,
                    citation: &self.citation,
                })?;
                writeln!(out, "{}", json)?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::Csv(csv) => csv.flush()?,
            Sink::Jsonl(out) => out.flush()?,
        }
        Ok(())
    }
}
