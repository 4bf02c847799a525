//! Event-based comment export decoder (quick-xml)

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use super::{
    CommentDecoder, CommentExportPage, apply_field, is_comment_field, open_comment, parse_max_id,
};
use crate::error::{JournalError, Result};

/// Walks the document as a stream of events without building a tree
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamDecoder;

/// Text element currently being collected
struct Capture {
    name: String,
    depth: usize,
    text: String,
}

#[derive(Default)]
struct State {
    page: CommentExportPage,
    /// Open element names, root first
    stack: Vec<String>,
    comment: Option<u64>,
    capture: Option<Capture>,
    seen_root: bool,
}

impl CommentDecoder for StreamDecoder {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn decode(&self, document: &str) -> Result<CommentExportPage> {
        let mut reader = Reader::from_str(document);
        let mut state = State::default();

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(e) => state.open(&e)?,
                Event::Empty(e) => {
                    state.open(&e)?;
                    state.close()?;
                }
                Event::End(_) => state.close()?,
                Event::Text(t) => {
                    let text = t.unescape().map_err(xml_error)?;
                    state.text(&text)?;
                }
                Event::CData(c) => {
                    let text = std::str::from_utf8(&c).map_err(xml_error)?;
                    state.text(text)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !state.seen_root {
            return Err(JournalError::decode("comment export has no root element"));
        }
        if !state.stack.is_empty() {
            return Err(JournalError::decode(format!(
                "comment export ended inside <{}>",
                state.stack.join("><")
            )));
        }
        Ok(state.page)
    }
}

impl State {
    fn open(&mut self, element: &BytesStart<'_>) -> Result<()> {
        let name = element_name(element.name().as_ref())?;
        let depth = self.stack.len();
        if depth == 0 && self.seen_root {
            return Err(JournalError::decode(format!(
                "comment export has <{}> after the root element",
                name
            )));
        }
        let parent = self.stack.last().cloned();

        match (depth, parent.as_deref(), name.as_str()) {
            (1, _, "maxid") => self.begin_capture(&name, depth),
            (2, Some("comments"), "comment") => {
                let attrs = attributes(element)?;
                let id = open_comment(&mut self.page, |key| lookup(&attrs, key))?;
                self.comment = Some(id);
            }
            (3, Some("comment"), field) if is_comment_field(field) => {
                self.begin_capture(&name, depth)
            }
            (2, Some("usermaps"), "usermap") => {
                let attrs = attributes(element)?;
                self.page
                    .add_usermap(lookup(&attrs, "id"), lookup(&attrs, "user"))?;
            }
            _ => {}
        }

        self.seen_root = true;
        self.stack.push(name);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let depth = self.stack.len().saturating_sub(1);
        let name = self.stack.pop();

        let finished = self.capture.as_ref().is_some_and(|c| c.depth == depth);
        if finished {
            if let Some(capture) = self.capture.take() {
                self.finish_capture(capture)?;
            }
        } else if depth == 2 && name.as_deref() == Some("comment") {
            self.comment = None;
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        let depth = self.stack.len();
        if depth == 0 {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(JournalError::decode(format!(
                "comment export has text outside the root element: {:?}",
                text.trim()
            )));
        }

        // Only direct children of the captured element count
        if let Some(capture) = self.capture.as_mut() {
            if capture.depth + 1 == depth {
                capture.text.push_str(text);
            }
        }
        Ok(())
    }

    fn begin_capture(&mut self, name: &str, depth: usize) {
        self.capture = Some(Capture {
            name: name.to_string(),
            depth,
            text: String::new(),
        });
    }

    fn finish_capture(&mut self, capture: Capture) -> Result<()> {
        if capture.name == "maxid" {
            self.page.max_id = Some(parse_max_id(&capture.text)?);
            return Ok(());
        }
        if let Some(id) = self.comment {
            apply_field(self.page.comment_mut(id), &capture.name, &capture.text)?;
        }
        Ok(())
    }
}

fn attributes(element: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = element_name(attr.key.as_ref())?;
        let raw = std::str::from_utf8(&attr.value).map_err(xml_error)?;
        let normalized = normalize_attribute(raw);
        let value: Cow<'_, str> = unescape(&normalized).map_err(xml_error)?;
        attrs.push((key, value.into_owned()));
    }
    Ok(attrs)
}

/// Literal whitespace in attribute values reads as single spaces;
/// character references are left to [`unescape`]
fn normalize_attribute(raw: &str) -> String {
    raw.replace("\r\n", " ")
        .replace(['\r', '\n', '\t'], " ")
}

fn lookup<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

fn element_name(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(xml_error)
}

fn xml_error(e: impl std::fmt::Display) -> JournalError {
    JournalError::decode(format!("invalid comment export: {}", e))
}
