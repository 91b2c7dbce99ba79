//! Page streaming from a MediaWiki XML dump.
//!
//! The dump is read in fixed-size chunks and complete `<page>...</page>`
//! blocks are handed to a callback. Each block is then reduced to a title and
//! trimmed, non-blank text lines, and split into per-language sections.

use crate::interpreter::is_meta_title;
use crate::section::{language_tag, Header};
use crate::tables::Tables;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::io::Read;

const CHUNK_SIZE: usize = 1024 * 1024;
const PAGE_OPEN: &[u8] = b"<page>";
const PAGE_CLOSE: &[u8] = b"</page>";
const LANGUAGE_HEADER_DEPTH: usize = 2;
const PRONUNCIATION_HEADER: &str = "Pronunciation";

lazy_static! {
    pub static ref TITLE_PATTERN: Regex = Regex::new(r"<title>([^<]+)</title>").unwrap();
    pub static ref NS_PATTERN: Regex = Regex::new(r"<ns>(\d+)</ns>").unwrap();
    pub static ref TEXT_PATTERN: Regex = Regex::new(r"(?s)<text[^>]*>(.+?)</text>").unwrap();
    pub static ref REDIRECT_PATTERN: Regex = Regex::new(r#"<redirect\s+title="[^"]+""#).unwrap();
}

/// Which pages are worth interpreting
#[derive(Debug, Clone)]
pub struct PageFilter {
    pub namespaces: HashSet<u32>,
    pub skip_redirects: bool,
}

impl Default for PageFilter {
    fn default() -> Self {
        Self {
            // main and Reconstruction
            namespaces: [0, 118].into_iter().collect(),
            skip_redirects: true,
        }
    }
}

/// Why a page block was not interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No `<title>` or no `<text>` body
    Malformed,
    Namespace,
    Redirect,
    Meta,
}

/// A page's title plus its decoded wikitext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    pub text: String,
}

impl Page {
    /// Trimmed, non-blank lines of the page body
    pub fn lines(&self) -> Vec<&str> {
        self.text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Stream complete `<page>` blocks to `callback` until it returns false.
///
/// Bytes are buffered raw so a multi-byte character split across two chunks
/// is decoded whole.
pub fn scan_pages(mut reader: impl Read, mut callback: impl FnMut(String) -> bool) -> std::io::Result<usize> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut pages = 0usize;

    loop {
        let bytes_read = reader.read(&mut chunk)?;
        if bytes_read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..bytes_read]);

        // Extract complete pages
        while let Some(start) = find_bytes(&buffer, PAGE_OPEN) {
            match find_bytes(&buffer[start..], PAGE_CLOSE) {
                Some(end_offset) => {
                    let end = start + end_offset + PAGE_CLOSE.len();
                    let page_xml = String::from_utf8_lossy(&buffer[start..end]).into_owned();
                    buffer.drain(..end);
                    pages += 1;

                    if !callback(page_xml) {
                        return Ok(pages);
                    }
                }
                None => {
                    buffer.drain(..start);
                    break;
                }
            }
        }

        // keep a tail that could hold a partial `<page>` tag
        if buffer.len() > PAGE_OPEN.len() && find_bytes(&buffer, PAGE_OPEN).is_none() {
            buffer.drain(..buffer.len() - PAGE_OPEN.len());
        }
    }

    Ok(pages)
}

/// Decode the entities MediaWiki escapes in titles and text
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Pull title and text out of one `<page>` block, applying the filter
pub fn extract_page(page_xml: &str, filter: &PageFilter) -> Result<Page, SkipReason> {
    let title = TITLE_PATTERN
        .captures(page_xml)
        .map(|cap| decode_entities(&cap[1]))
        .ok_or(SkipReason::Malformed)?;

    if let Some(cap) = NS_PATTERN.captures(page_xml) {
        let in_scope = cap[1].parse::<u32>().map_or(false, |ns| filter.namespaces.contains(&ns));
        if !in_scope {
            return Err(SkipReason::Namespace);
        }
    }

    if filter.skip_redirects && REDIRECT_PATTERN.is_match(page_xml) {
        return Err(SkipReason::Redirect);
    }

    if is_meta_title(&title) {
        return Err(SkipReason::Meta);
    }

    let text = TEXT_PATTERN
        .captures(page_xml)
        .map(|cap| decode_entities(&cap[1]))
        .ok_or(SkipReason::Malformed)?;

    Ok(Page { title, text })
}

/// Split a page's lines into one block per known language.
///
/// A block starts at a depth-2 header naming a known language or at a
/// resolvable `{{wikipedia||lang=..}}` tag; a depth-2 header naming an
/// unknown language closes it. A depth-2 `Pronunciation` header stays inside.
pub fn split_language_sections<'a>(lines: &[&'a str], tables: &Tables) -> Vec<Vec<&'a str>> {
    let mut sections = Vec::new();
    let mut current: Option<Vec<&'a str>> = None;

    for &line in lines {
        let starts_section = match Header::parse(line) {
            Some(h) if h.depth == LANGUAGE_HEADER_DEPTH && h.text == PRONUNCIATION_HEADER => false,
            Some(h) if h.depth == LANGUAGE_HEADER_DEPTH => {
                if tables.languages.code_for_name(h.text).is_none() {
                    sections.extend(current.take());
                    continue;
                }
                true
            }
            Some(_) => false,
            None => language_tag(line).map_or(false, |code| tables.languages.resolve_code(code).is_some()),
        };

        if starts_section {
            sections.extend(current.take());
            current = Some(vec![line]);
        } else if let Some(section) = current.as_mut() {
            section.push(line);
        }
    }

    sections.extend(current);
    sections
}
