/*!
 * XML framing for the assembled context document
 *
 * Every piece of output is rendered to its own string so the assembler can
 * measure it against the budget before committing to it.
 */

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::Result;
use crate::types::{FileDescriptor, FileKind};

/// What the assembler managed to load for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileBody {
    Text(String),
    Binary,
    Unreadable(String),
}

impl FileBody {
    /// Line count of a text body
    pub fn lines(&self) -> Option<usize> {
        match self {
            FileBody::Text(content) => Some(content.lines().count()),
            _ => None,
        }
    }
}

/// Renders document pieces as XML fragments
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlWriter;

impl XmlWriter {
    pub fn new() -> Self {
        Self
    }

    fn render<F>(&self, build: F) -> Result<String>
    where
        F: FnOnce(&mut Writer<Vec<u8>>) -> std::io::Result<()>,
    {
        let mut writer = Writer::new(Vec::new());
        build(&mut writer)?;
        let mut buffer = writer.into_inner();
        buffer.write_all(b"\n")?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Opening and closing tags of the whole document
    pub fn envelope(&self, root_name: &str) -> Result<(String, String)> {
        let open = self.render(|w| {
            let mut start = BytesStart::new("context");
            start.push_attribute(("root", root_name));
            w.write_event(Event::Start(start))
        })?;
        let close = self.render(|w| w.write_event(Event::End(BytesEnd::new("context"))))?;
        Ok((open, close))
    }

    /// Opening and closing tags of a section
    pub fn section(&self, name: &str) -> Result<(String, String)> {
        let open = self.render(|w| w.write_event(Event::Start(BytesStart::new(name))))?;
        let close = self.render(|w| w.write_event(Event::End(BytesEnd::new(name))))?;
        Ok((open, close))
    }

    /// One line of the directory tree
    pub fn tree_line(&self, line: &str) -> Result<String> {
        self.render(|w| w.write_event(Event::Text(text(line))))
    }

    /// One summary row: kind, line count, size and modification time
    pub fn summary_row(&self, file: &FileDescriptor, body: &FileBody) -> Result<String> {
        self.render(|w| {
            let mut entry = BytesStart::new("entry");
            push_file_attributes(&mut entry, file, body);
            let modified = DateTime::<Utc>::from(file.modified)
                .to_rfc3339_opts(SecondsFormat::Secs, true);
            entry.push_attribute(("modified", modified.as_str()));
            w.write_event(Event::Empty(entry))
        })
    }

    /// A file's content framed by a path header
    pub fn file_block(&self, file: &FileDescriptor, body: &FileBody) -> Result<String> {
        self.render(|w| {
            let mut start = BytesStart::new("file");
            push_file_attributes(&mut start, file, body);
            match body {
                FileBody::Text(content) => {
                    w.write_event(Event::Start(start))?;
                    w.write_event(Event::Text(BytesText::new("\n")))?;
                    w.write_event(Event::Text(text(content)))?;
                    if !content.is_empty() && !content.ends_with('\n') {
                        w.write_event(Event::Text(BytesText::new("\n")))?;
                    }
                    w.write_event(Event::End(BytesEnd::new("file")))
                }
                FileBody::Binary => w.write_event(Event::Empty(start)),
                FileBody::Unreadable(reason) => {
                    start.push_attribute(("status", "unreadable"));
                    start.push_attribute(("reason", reason.as_str()));
                    w.write_event(Event::Empty(start))
                }
            }
        })
    }
}

/// Text node escaping only `<`, `>` and `&`, so quotes stay readable
fn text(content: &str) -> BytesText<'_> {
    BytesText::from_escaped(partial_escape(content))
}

fn push_file_attributes(start: &mut BytesStart<'_>, file: &FileDescriptor, body: &FileBody) {
    let kind = match body {
        FileBody::Text(_) => FileKind::Text,
        FileBody::Binary => FileKind::Binary,
        FileBody::Unreadable(_) => file.kind,
    };
    start.push_attribute(("path", file.relative_path.as_str()));
    start.push_attribute(("kind", kind.as_str()));
    start.push_attribute(("size", file.size.to_string().as_str()));
    if let Some(lines) = body.lines() {
        start.push_attribute(("lines", lines.to_string().as_str()));
    }
}
