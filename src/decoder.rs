use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::DecodeError;

const RECORD_TAG: &[u8] = b"page";
const ALIAS_TAG: &[u8] = b"redirect";

/// One `<page>` of the dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub title: String,
    pub alias_target: Option<String>,
    pub body: String,
}

impl Record {
    /// A redirect page: points at another title and carries no content of its own.
    pub fn is_alias(&self) -> bool {
        self.alias_target.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Body,
}

/// Which record field the character data at `path` (relative to `<page>`) belongs to.
fn field_at(path: &[Vec<u8>]) -> Option<Field> {
    match path {
        [name] if name.as_slice() == b"title" => Some(Field::Title),
        [outer, name] if outer.as_slice() == b"revision" && name.as_slice() == b"text" => {
            Some(Field::Body)
        }
        _ => None,
    }
}

/// Forward-only scanner yielding one [`Record`] per `<page>` element.
///
/// Only the page currently being assembled is held in memory; the event
/// buffer is reused across tokens.
pub struct RecordDecoder<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> RecordDecoder<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: Reader::from_reader(input),
            buf: Vec::with_capacity(8192),
            done: false,
        }
    }

    /// Bytes consumed from the underlying stream so far.
    pub fn byte_offset(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn next_record(&mut self) -> Result<Option<Record>, DecodeError> {
        loop {
            let position = self.reader.buffer_position() as u64;
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|source| DecodeError::Xml { position, source })?;

            let found = match event {
                Event::Start(ref e) if is_record(e) => Some(true),
                Event::Empty(ref e) if is_record(e) => Some(false),
                Event::Eof => return Ok(None),
                _ => None,
            };
            self.buf.clear();

            match found {
                Some(true) => return self.read_record().map(Some),
                Some(false) => return Ok(Some(Record::default())),
                None => {}
            }
        }
    }

    /// Materialize the subtree of a `<page>` whose start tag was just consumed.
    fn read_record(&mut self) -> Result<Record, DecodeError> {
        let mut record = Record::default();
        let mut path: Vec<Vec<u8>> = Vec::new();
        let mut capture: Option<Field> = None;

        loop {
            let position = self.reader.buffer_position() as u64;
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|source| DecodeError::Xml { position, source })?;

            match event {
                Event::Start(ref e) => {
                    let name = e.local_name().as_ref().to_vec();
                    if path.is_empty() && name == ALIAS_TAG {
                        record.alias_target = Some(alias_target(e, position)?);
                    }
                    path.push(name);
                    capture = field_at(&path);
                    // a later <title> or <revision><text> replaces the earlier one
                    match capture {
                        Some(Field::Title) => record.title.clear(),
                        Some(Field::Body) => record.body.clear(),
                        None => {}
                    }
                }
                Event::Empty(ref e) => {
                    let name = e.local_name().as_ref().to_vec();
                    if path.is_empty() && name == ALIAS_TAG {
                        record.alias_target = Some(alias_target(e, position)?);
                    }
                    path.push(name);
                    match field_at(&path) {
                        Some(Field::Title) => record.title.clear(),
                        Some(Field::Body) => record.body.clear(),
                        None => {}
                    }
                    path.pop();
                }
                Event::Text(ref e) => {
                    if let Some(field) = capture {
                        let text = e
                            .unescape()
                            .map_err(|source| DecodeError::Xml { position, source })?;
                        push_field(&mut record, field, &text);
                    }
                }
                Event::CData(ref e) => {
                    if let Some(field) = capture {
                        let text = std::str::from_utf8(e)
                            .map_err(|_| DecodeError::Utf8 { position })?;
                        push_field(&mut record, field, text);
                    }
                }
                Event::End(_) => {
                    if path.pop().is_none() {
                        self.buf.clear();
                        return Ok(record);
                    }
                    capture = field_at(&path);
                }
                Event::Eof => return Err(DecodeError::UnclosedRecord),
                _ => {}
            }
            self.buf.clear();
        }
    }
}

impl<R: BufRead> Iterator for RecordDecoder<R> {
    type Item = Result<Record, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn is_record(e: &BytesStart) -> bool {
    e.local_name().as_ref() == RECORD_TAG
}

fn alias_target(e: &BytesStart, position: u64) -> Result<String, DecodeError> {
    let attr = e
        .try_get_attribute("title")
        .map_err(|source| DecodeError::Attribute { position, source })?;
    match attr {
        Some(attr) => Ok(attr
            .unescape_value()
            .map_err(|source| DecodeError::Xml { position, source })?
            .into_owned()),
        None => Ok(String::new()),
    }
}

fn push_field(record: &mut Record, field: Field, text: &str) {
    match field {
        Field::Title => record.title.push_str(text),
        Field::Body => record.body.push_str(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(xml: &str) -> Vec<Record> {
        RecordDecoder::new(xml.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    const DUMP: &str = r#"<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/" xml:lang="en">
  <siteinfo>
    <sitename>Wikipedia</sitename>
    <namespaces><namespace key="0" case="first-letter" /></namespaces>
  </siteinfo>
  <page>
    <title>Apollo 11</title>
    <ns>0</ns>
    <id>662</id>
    <revision>
      <id>1001</id>
      <contributor><username>Someone</username></contributor>
      <text xml:space="preserve">{{Infobox Space mission
|mission_name=&lt;!--See above--&gt;
|insignia=Apollo_11_insignia.png
}}</text>
    </revision>
  </page>
  <page>
    <title>Apollo XI</title>
    <redirect title="Apollo 11" />
    <revision>
      <text xml:space="preserve">#REDIRECT [[Apollo 11]]</text>
    </revision>
  </page>
</mediawiki>"#;

    #[test]
    fn yields_every_page_in_order() {
        let records = decode(DUMP);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Apollo 11");
        assert_eq!(records[1].title, "Apollo XI");
    }

    #[test]
    fn content_page_fields() {
        let records = decode(DUMP);
        let page = &records[0];
        assert!(!page.is_alias());
        assert_eq!(page.alias_target, None);
        assert_eq!(
            page.body,
            "{{Infobox Space mission\n|mission_name=<!--See above-->\n|insignia=Apollo_11_insignia.png\n}}"
        );
    }

    #[test]
    fn redirect_page_is_alias() {
        let records = decode(DUMP);
        assert!(records[1].is_alias());
        assert_eq!(records[1].alias_target.as_deref(), Some("Apollo 11"));
    }

    #[test]
    fn redirect_with_empty_body() {
        let xml = r#"<mediawiki><page><title>A</title><redirect title="B"/><revision><text/></revision></page></mediawiki>"#;
        let records = decode(xml);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_alias());
        assert_eq!(records[0].body, "");
    }

    #[test]
    fn empty_redirect_title_is_content() {
        let xml = r#"<page><title>A</title><redirect title=""/><revision><text>x</text></revision></page>"#;
        let records = decode(xml);
        assert!(!records[0].is_alias());
    }

    #[test]
    fn ids_and_usernames_do_not_leak_into_fields() {
        let records = decode(DUMP);
        assert!(!records[0].title.contains("662"));
        assert!(!records[0].body.contains("Someone"));
    }

    #[test]
    fn nested_title_outside_page_level_is_ignored() {
        let xml = r#"<page><title>Real</title><revision><title>Fake</title><text>b</text></revision></page>"#;
        let records = decode(xml);
        assert_eq!(records[0].title, "Real");
    }

    #[test]
    fn last_revision_text_wins() {
        let xml = r#"<page><title>T</title><revision><text>old</text></revision><revision><text>new</text></revision></page>"#;
        assert_eq!(decode(xml)[0].body, "new");
    }

    #[test]
    fn cdata_is_kept_verbatim() {
        let xml = r#"<page><title>T</title><revision><text><![CDATA[a &amp; <b>]]></text></revision></page>"#;
        assert_eq!(decode(xml)[0].body, "a &amp; <b>");
    }

    #[test]
    fn whitespace_is_preserved() {
        let xml = "<page><title> T </title><revision><text>\n  line\n</text></revision></page>";
        let records = decode(xml);
        assert_eq!(records[0].title, " T ");
        assert_eq!(records[0].body, "\n  line\n");
    }

    #[test]
    fn page_without_text() {
        let xml = "<page><title>T</title></page>";
        let records = decode(xml);
        assert_eq!(records[0].body, "");
        assert_eq!(records[0].alias_target, None);
    }

    #[test]
    fn byte_offset_advances_past_each_page() {
        let xml = "<mediawiki><page><title>A</title></page><page><title>B</title></page></mediawiki>";
        let mut decoder = RecordDecoder::new(xml.as_bytes());
        assert_eq!(decoder.byte_offset(), 0);
        let first = decoder.next().unwrap().unwrap();
        assert_eq!(first.title, "A");
        let after_first = decoder.byte_offset();
        assert_eq!(after_first, xml.find("<page><title>B").unwrap() as u64);
        decoder.next().unwrap().unwrap();
        assert!(decoder.byte_offset() > after_first);
        assert!(decoder.next().is_none());
    }

    #[test]
    fn no_pages() {
        assert!(decode("<mediawiki><siteinfo/></mediawiki>").is_empty());
        assert!(decode("").is_empty());
    }

    #[test]
    fn unclosed_page_is_an_error() {
        let xml = "<mediawiki><page><title>T</title>";
        let results: Vec<_> = RecordDecoder::new(xml.as_bytes()).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn mismatched_tags_stop_the_stream() {
        let xml = "<page><title>A</title></page><page><title>B</oops></page><page><title>C</title></page>";
        let results: Vec<_> = RecordDecoder::new(xml.as_bytes()).collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().title, "A");
        assert!(matches!(results[1], Err(DecodeError::Xml { .. })));
    }
}
