//! Streaming parser for the efetch JATS XML feed.
//!
//! A malformed document is fatal for the identifier being processed; every
//! individual field extraction degrades to the record sentinels instead.

use std::collections::BTreeMap;

use pmcscope_core::models::{SectionKind, UNKNOWN_DATE};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{HarvestError, Result};

/// Phrase the feed embeds in the metadata container when the publisher
/// withholds the full text.
const RESTRICTED_PHRASE: &str = "does not allow downloading of the full text in XML form";

/// Raw fields pulled from one article document, before any reconciliation
/// rules are applied.
#[derive(Debug, Default)]
pub struct ArticleXml {
    pub has_front: bool,
    pub publisher: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub contributors: Vec<Contributor>,
    pub pub_dates: Vec<PubDate>,
    pub keywords: Vec<String>,
    pub sections: Vec<RawSection>,
    front_text: String,
}

#[derive(Debug, Default)]
pub struct Contributor {
    pub given: String,
    pub surname: String,
}

#[derive(Debug, Default)]
pub struct PubDate {
    pub pub_type: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
}

#[derive(Debug, Default)]
pub struct RawSection {
    pub title: String,
    pub paragraphs: Vec<String>,
}

impl ArticleXml {
    /// True when the metadata container is absent or carries the
    /// access-restriction phrase.
    pub fn restricted(&self) -> bool {
        !self.has_front || self.front_text.contains(RESTRICTED_PHRASE)
    }

    /// Contributor display names in source order; entries with neither a
    /// given name nor a surname are skipped.
    pub fn author_names(&self) -> Vec<String> {
        self.contributors
            .iter()
            .filter_map(|contrib| {
                let name = format!("{} {}", contrib.given, contrib.surname)
                    .trim()
                    .to_string();
                (!name.is_empty()).then_some(name)
            })
            .collect()
    }

    /// Canonical `YYYY-MM-DD` date. Entry selection prefers `epub`, then
    /// `collection`, then the first entry present; the year is required while
    /// month and day default to 1. Any non-numeric component yields the
    /// `"Unknown"` sentinel.
    pub fn publication_date(&self) -> String {
        const PREFERRED_TYPES: [&str; 2] = ["epub", "collection"];

        let mut selected = None;
        for pub_type in PREFERRED_TYPES {
            if let Some(date) = self
                .pub_dates
                .iter()
                .find(|d| d.pub_type.as_deref() == Some(pub_type))
            {
                selected = Some(date);
                break;
            }
        }

        let Some(date) = selected.or_else(|| self.pub_dates.first()) else {
            return UNKNOWN_DATE.to_string();
        };
        format_date(date).unwrap_or_else(|| UNKNOWN_DATE.to_string())
    }

    /// Captured body sections keyed by kind. Always empty for restricted
    /// records; sections with no paragraph text are omitted.
    pub fn section_map(&self) -> BTreeMap<SectionKind, String> {
        let mut sections = BTreeMap::new();
        if self.restricted() {
            return sections;
        }
        for sec in &self.sections {
            let Some(kind) = SectionKind::classify(&sec.title) else {
                continue;
            };
            if sec.paragraphs.is_empty() {
                continue;
            }
            sections.insert(kind, sec.paragraphs.join("\n"));
        }
        sections
    }
}

fn format_date(date: &PubDate) -> Option<String> {
    let year: i32 = date.year.as_deref()?.trim().parse().ok()?;
    let month: u32 = non_empty_or(date.month.as_deref(), "1").trim().parse().ok()?;
    let day: u32 = non_empty_or(date.day.as_deref(), "1").trim().parse().ok()?;
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

fn non_empty_or<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default,
    }
}

/// Collapse runs of whitespace, as mixed inline markup otherwise leaves
/// stray newlines and indentation inside extracted text.
fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn attr_value(e: &BytesStart, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

#[derive(Debug, Clone, Copy)]
enum DateField {
    Year,
    Month,
    Day,
}

/// Event-loop state. Text is routed into whichever capture buffers are open;
/// the element path (parents only, current element excluded) drives the
/// "first matching node" rules.
#[derive(Default)]
struct XmlParser {
    doc: ArticleXml,
    path: Vec<String>,
    front_depth: usize,
    body_depth: usize,
    saw_element: bool,
    abstract_captured: bool,
    current_contrib: Option<Contributor>,
    current_date: Option<PubDate>,
    sec_stack: Vec<usize>,
    buf_publisher: Option<String>,
    buf_title: Option<String>,
    buf_abstract: Option<String>,
    buf_given: Option<String>,
    buf_surname: Option<String>,
    buf_date_field: Option<(DateField, String)>,
    buf_keyword: Option<String>,
    buf_sec_title: Option<(usize, String)>,
    buf_paragraph: Option<String>,
}

impl XmlParser {
    fn parent_is(&self, name: &str) -> bool {
        self.path.last().map(String::as_str) == Some(name)
    }

    fn grandparent_is(&self, name: &str) -> bool {
        self.path.len() >= 2 && self.path[self.path.len() - 2] == name
    }

    fn within(&self, name: &str) -> bool {
        self.path.iter().any(|elem| elem == name)
    }

    fn handle_start(&mut self, name: &str, e: &BytesStart) {
        self.saw_element = true;
        match name {
            "front" => {
                self.front_depth += 1;
                self.doc.has_front = true;
            }
            "body" => self.body_depth += 1,
            "publisher-name"
                if self.parent_is("publisher")
                    && self.within("journal-meta")
                    && self.doc.publisher.is_none() =>
            {
                self.buf_publisher = Some(String::new());
            }
            "article-title"
                if self.parent_is("title-group")
                    && self.within("article-meta")
                    && self.doc.title.is_none() =>
            {
                self.buf_title = Some(String::new());
            }
            "contrib" if self.parent_is("contrib-group") && self.within("article-meta") => {
                self.current_contrib = Some(Contributor::default());
            }
            "given-names" if self.current_contrib.is_some() && self.parent_is("name") => {
                self.buf_given = Some(String::new());
            }
            "surname" if self.current_contrib.is_some() && self.parent_is("name") => {
                self.buf_surname = Some(String::new());
            }
            "pub-date" if self.parent_is("article-meta") => {
                self.current_date = Some(PubDate {
                    pub_type: attr_value(e, "pub-type"),
                    ..PubDate::default()
                });
            }
            "year" if self.current_date.is_some() && self.parent_is("pub-date") => {
                self.buf_date_field = Some((DateField::Year, String::new()));
            }
            "month" if self.current_date.is_some() && self.parent_is("pub-date") => {
                self.buf_date_field = Some((DateField::Month, String::new()));
            }
            "day" if self.current_date.is_some() && self.parent_is("pub-date") => {
                self.buf_date_field = Some((DateField::Day, String::new()));
            }
            "kwd" if self.parent_is("kwd-group") => {
                self.buf_keyword = Some(String::new());
            }
            "sec" if self.body_depth > 0 => {
                self.doc.sections.push(RawSection::default());
                self.sec_stack.push(self.doc.sections.len() - 1);
            }
            "title" if self.parent_is("sec") && self.body_depth > 0 => {
                if let Some(&index) = self.sec_stack.last() {
                    if self.doc.sections[index].title.is_empty() {
                        self.buf_sec_title = Some((index, String::new()));
                    }
                }
            }
            "p" => {
                if self.parent_is("abstract")
                    && self.grandparent_is("article-meta")
                    && !self.abstract_captured
                {
                    self.buf_abstract = Some(String::new());
                } else if self.body_depth > 0 && !self.sec_stack.is_empty() {
                    self.buf_paragraph = Some(String::new());
                }
            }
            _ => {}
        }
    }

    fn handle_text(&mut self, text: &str) {
        if self.front_depth > 0 {
            self.doc.front_text.push_str(text);
            self.doc.front_text.push(' ');
        }
        for buf in [
            &mut self.buf_publisher,
            &mut self.buf_title,
            &mut self.buf_abstract,
            &mut self.buf_given,
            &mut self.buf_surname,
            &mut self.buf_keyword,
            &mut self.buf_paragraph,
        ] {
            if let Some(buf) = buf {
                buf.push_str(text);
            }
        }
        if let Some((_, buf)) = &mut self.buf_date_field {
            buf.push_str(text);
        }
        if let Some((_, buf)) = &mut self.buf_sec_title {
            buf.push_str(text);
        }
    }

    fn handle_comment(&mut self, text: &str) {
        if self.front_depth > 0 {
            self.doc.front_text.push_str(text);
            self.doc.front_text.push(' ');
        }
    }

    fn handle_end(&mut self, name: &str) {
        match name {
            "front" => self.front_depth = self.front_depth.saturating_sub(1),
            "body" => self.body_depth = self.body_depth.saturating_sub(1),
            "publisher-name" => {
                if let Some(buf) = self.buf_publisher.take() {
                    let text = clean_text(&buf);
                    if !text.is_empty() {
                        self.doc.publisher = Some(text);
                    }
                }
            }
            "article-title" => {
                if let Some(buf) = self.buf_title.take() {
                    let text = clean_text(&buf);
                    if !text.is_empty() {
                        self.doc.title = Some(text);
                    }
                }
            }
            "given-names" => {
                if let (Some(buf), Some(contrib)) =
                    (self.buf_given.take(), self.current_contrib.as_mut())
                {
                    contrib.given = clean_text(&buf);
                }
            }
            "surname" => {
                if let (Some(buf), Some(contrib)) =
                    (self.buf_surname.take(), self.current_contrib.as_mut())
                {
                    contrib.surname = clean_text(&buf);
                }
            }
            "contrib" => {
                if let Some(contrib) = self.current_contrib.take() {
                    self.doc.contributors.push(contrib);
                }
            }
            "year" | "month" | "day" => {
                if let (Some((field, buf)), Some(date)) =
                    (self.buf_date_field.take(), self.current_date.as_mut())
                {
                    let text = clean_text(&buf);
                    let slot = match field {
                        DateField::Year => &mut date.year,
                        DateField::Month => &mut date.month,
                        DateField::Day => &mut date.day,
                    };
                    if slot.is_none() {
                        *slot = Some(text);
                    }
                }
            }
            "pub-date" => {
                if let Some(date) = self.current_date.take() {
                    self.doc.pub_dates.push(date);
                }
            }
            "kwd" => {
                if let Some(buf) = self.buf_keyword.take() {
                    let text = clean_text(&buf);
                    if !text.is_empty() {
                        self.doc.keywords.push(text);
                    }
                }
            }
            "title" => {
                if let Some((index, buf)) = self.buf_sec_title.take() {
                    self.doc.sections[index].title = clean_text(&buf);
                }
            }
            "p" => {
                if let Some(buf) = self.buf_abstract.take() {
                    let text = clean_text(&buf);
                    if !text.is_empty() {
                        self.doc.abstract_text = Some(text);
                    }
                    self.abstract_captured = true;
                } else if let Some(buf) = self.buf_paragraph.take() {
                    let text = clean_text(&buf);
                    if !text.is_empty() {
                        // A paragraph belongs to every section enclosing it.
                        for &index in &self.sec_stack {
                            self.doc.sections[index].paragraphs.push(text.clone());
                        }
                    }
                }
            }
            "sec" => {
                self.sec_stack.pop();
            }
            _ => {}
        }
    }
}

/// Parse one efetch response. Errors only on a malformed or element-free
/// document; missing nodes inside a well-formed document never fail here.
pub fn parse_article_xml(xml: &str) -> Result<ArticleXml> {
    let mut reader = Reader::from_str(xml);
    let mut parser = XmlParser::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                parser.handle_start(&name, &e);
                parser.path.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                parser.handle_start(&name, &e);
                parser.handle_end(&name);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                parser.path.pop();
                parser.handle_end(&name);
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| HarvestError::Parse(format!("invalid article xml: {e}")))?;
                parser.handle_text(&text);
            }
            Ok(Event::CData(t)) => {
                let text = String::from_utf8_lossy(&t).into_owned();
                parser.handle_text(&text);
            }
            Ok(Event::Comment(t)) => {
                let text = String::from_utf8_lossy(&t).into_owned();
                parser.handle_comment(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(HarvestError::Parse(format!("invalid article xml: {e}")));
            }
        }
    }

    if !parser.saw_element {
        return Err(HarvestError::Parse("document contains no elements".to_string()));
    }

    Ok(parser.doc)
}
