// src/feed/parser.rs
//! RSS 2.0 / RSS 1.0 / Atom parsing into [`Item`]s.
//!
//! A namespace-aware event walk: only the entry's own children in the
//! feed's namespace count, so extension elements (`atom:link`,
//! `media:title`, ...) and interleaved siblings never collide with them.

use anyhow::{anyhow, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use super::{normalize_title, Item};

const ATOM_NS: &[u8] = b"http://www.w3.org/2005/Atom";
const RSS1_NS: &[u8] = b"http://purl.org/rss/1.0/";
const DC_NS: &[u8] = b"http://purl.org/dc/elements/1.1/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    Unbound,
    Atom,
    Rss1,
    Dc,
    Other,
}

fn classify(r: ResolveResult<'_>) -> Ns {
    match r {
        ResolveResult::Unbound => Ns::Unbound,
        ResolveResult::Bound(Namespace(ns)) if ns == ATOM_NS => Ns::Atom,
        ResolveResult::Bound(Namespace(ns)) if ns == RSS1_NS => Ns::Rss1,
        ResolveResult::Bound(Namespace(ns)) if ns == DC_NS => Ns::Dc,
        _ => Ns::Other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Rss,
    Atom,
}

/// Root element decides the format and the namespace entry children live in.
#[derive(Debug, Clone, Copy)]
struct Layout {
    kind: FeedKind,
    core: Ns,
}

impl Layout {
    fn from_root(ns: Ns, local: &[u8]) -> Result<Self> {
        match local {
            b"rss" => Ok(Self { kind: FeedKind::Rss, core: ns }),
            b"RDF" => Ok(Self { kind: FeedKind::Rss, core: Ns::Rss1 }),
            b"feed" => Ok(Self { kind: FeedKind::Atom, core: ns }),
            other => Err(anyhow!(
                "unrecognized feed format (root element <{}>)",
                String::from_utf8_lossy(other)
            )),
        }
    }

    fn entry_tag(&self) -> &'static [u8] {
        match self.kind {
            FeedKind::Rss => b"item",
            FeedKind::Atom => b"entry",
        }
    }

    /// Which field a direct child of an entry feeds, if any.
    fn field(&self, ns: Ns, local: &[u8]) -> Option<Field> {
        if ns == Ns::Dc && local == b"date" {
            return Some(Field::FallbackDate);
        }
        if ns != self.core {
            return None;
        }
        match (self.kind, local) {
            (_, b"title") => Some(Field::Title),
            (FeedKind::Rss, b"link") => Some(Field::Link),
            (FeedKind::Rss, b"pubDate") => Some(Field::Date),
            // `updated` first: status feeds keep the link and bump this field.
            (FeedKind::Atom, b"updated") => Some(Field::Date),
            (FeedKind::Atom, b"published") => Some(Field::FallbackDate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Date,
    FallbackDate,
}

/// Text collected for one field; nested markup (xhtml titles) is flattened.
struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

#[derive(Default)]
struct Draft {
    title: Option<String>,
    link: Option<String>,
    fallback_link: Option<String>,
    date: Option<String>,
    fallback_date: Option<String>,
}

impl Draft {
    fn set(&mut self, field: Field, text: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Date => &mut self.date,
            Field::FallbackDate => &mut self.fallback_date,
        };
        slot.get_or_insert(text);
    }

    /// Atom links: the first alternate (or rel-less) one wins, else the first of any rel.
    fn atom_link(&mut self, e: &BytesStart<'_>) {
        let Some(href) = attr(e, b"href") else {
            return;
        };
        match attr(e, b"rel").as_deref() {
            None | Some("alternate") => {
                self.link.get_or_insert(href);
            }
            _ => {
                self.fallback_link.get_or_insert(href);
            }
        }
    }

    fn finish(self) -> Item {
        let link = self.link.or(self.fallback_link).unwrap_or_default();
        let ts = self.date.or(self.fallback_date).unwrap_or_default();
        Item::new(
            normalize_title(self.title.as_deref().unwrap_or_default()),
            link.trim(),
            ts.trim(),
        )
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    let a = e.try_get_attribute(key).ok().flatten()?;
    Some(html_escape::decode_html_entities(&String::from_utf8_lossy(&a.value)).into_owned())
}

pub fn detect(xml: &str) -> Result<FeedKind> {
    let mut reader = NsReader::from_str(xml);
    loop {
        match reader.read_event().context("reading feed xml")? {
            Event::Start(e) | Event::Empty(e) => {
                let (ns, local) = reader.resolve_element(e.name());
                return Ok(Layout::from_root(classify(ns), local.as_ref())?.kind);
            }
            Event::Eof => return Err(anyhow!("empty feed document")),
            _ => {}
        }
    }
}

/// Parse a feed body. Unknown formats and malformed XML are an error, never a
/// partial result.
pub fn parse_feed(xml: &str) -> Result<Vec<Item>> {
    let mut reader = NsReader::from_str(xml);
    let mut layout: Option<Layout> = None;
    let mut depth = 0usize;
    let mut entry: Option<(usize, Draft)> = None;
    let mut capture: Option<Capture> = None;
    let mut items = Vec::new();

    loop {
        let event = reader.read_event().context("reading feed xml")?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                depth += 1;
                let (ns, local) = reader.resolve_element(e.name());
                let ns = classify(ns);
                let local = local.as_ref();

                match (layout, entry.as_mut()) {
                    (None, _) => layout = Some(Layout::from_root(ns, local)?),
                    (Some(l), None) => {
                        if !empty && ns == l.core && local == l.entry_tag() {
                            entry = Some((depth, Draft::default()));
                        }
                    }
                    (Some(l), Some((entry_depth, draft))) => {
                        if capture.is_none() && depth == *entry_depth + 1 {
                            if let Some(field) = l.field(ns, local).filter(|_| !empty) {
                                capture = Some(Capture { field, depth, text: String::new() });
                            }
                            if l.kind == FeedKind::Atom && ns == l.core && local == b"link" {
                                draft.atom_link(e);
                            }
                        }
                    }
                }

                if empty {
                    depth -= 1;
                }
            }
            Event::Text(t) => {
                if let Some(c) = capture.as_mut() {
                    let raw = String::from_utf8_lossy(&t);
                    c.text.push_str(&html_escape::decode_html_entities(&raw));
                }
            }
            Event::CData(t) => {
                if let Some(c) = capture.as_mut() {
                    c.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => {
                if capture.as_ref().is_some_and(|c| c.depth == depth) {
                    if let (Some(c), Some((_, draft))) = (capture.take(), entry.as_mut()) {
                        draft.set(c.field, c.text);
                    }
                }
                if entry.as_ref().is_some_and(|(d, _)| *d == depth) {
                    if let Some((_, draft)) = entry.take() {
                        items.push(draft.finish());
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if layout.is_none() {
        return Err(anyhow!("empty feed document"));
    }
    Ok(items)
}
