//! Etymology extraction from Wiktionary dump pages.
//!
//! The per-page core turns one language section of a page into
//! [`EtymologyRow`]s: template calls are parsed line by line, a section state
//! machine routes etymology and pronunciation lines to their interpreters, a
//! chain builder records each derivation hop, and duplicate rows are merged.
//! The surrounding modules stream pages out of a dump, load lookup tables,
//! and write rows as CSV or JSON lines.

pub mod chain;
pub mod config;
pub mod dump;
pub mod error;
pub mod etymology;
pub mod interpreter;
pub mod merge;
pub mod output;
pub mod parallel;
pub mod pronunciation;
pub mod record;
pub mod section;
pub mod tables;
pub mod template;

pub use config::Config;
pub use error::{EtymologyError, Result};
pub use interpreter::{headword, interpret_page};
pub use record::EtymologyRow;
pub use tables::{Derivation, Tables};
