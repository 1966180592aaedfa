//! Feed parsing into a navigable channel/item tree.
//!
//! The parser walks the raw feed body with `quick-xml`'s event reader and
//! builds a generic [`Element`] tree, then lifts the parts the archive
//! cares about into tagged [`Channel`] and [`Item`] views. Feeds in the
//! wild are frequently malformed, so the reader runs with end-name
//! checking disabled: a mismatched closing tag is ignored and an element
//! left open at end of input is closed where the document ends. Only an
//! unrecoverable reader error stops the walk, and even then whatever tree
//! was built so far is returned.
//!
//! Item elements additionally record the byte range they occupy in the
//! original body, so [`Item::raw`] is an exact, unrewritten slice of the
//! feed from `<item` through `</item>`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

/// One markup element: name, attributes, text content, and children.
///
/// Namespace prefixes are kept verbatim in `name` (`itunes:image` stays
/// `itunes:image`), matching how podcast feeds are actually queried.
#[derive(Debug, Clone, Default)]
pub struct Element {
    /// Tag name as written, prefix included.
    pub name: String,
    /// Attributes in document order, entity references resolved.
    pub attrs: Vec<(String, String)>,
    /// Concatenated text and CDATA content of this element.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<Element>,
    /// Byte range of this element in the original body, when known.
    pub(crate) span: Option<(usize, usize)>,
}

impl Element {
    /// First attribute value with the given name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Depth-first iterator over all descendants, excluding `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<&Element> = self.children.iter().collect();
        stack.reverse();
        Descendants { stack }
    }

    /// First descendant with the given name, in document order.
    pub fn find_first(&self, name: &str) -> Option<&Element> {
        self.descendants().find(|el| el.name == name)
    }

    /// Trimmed text of the first descendant with the given name.
    fn text_of_first(&self, name: &str) -> String {
        self.find_first(name)
            .map(|el| el.text.trim().to_string())
            .unwrap_or_default()
    }
}

/// Document-order descendant traversal.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        let el = self.stack.pop()?;
        for child in el.children.iter().rev() {
            self.stack.push(child);
        }
        Some(el)
    }
}

/// Read-only parse result: every channel found in the feed.
#[derive(Debug)]
pub struct FeedDocument {
    pub channels: Vec<Channel>,
}

/// A feed channel: title, its element subtree, and its items in order.
#[derive(Debug)]
pub struct Channel {
    /// Channel title, empty when the feed omits it.
    pub title: String,
    /// The `<channel>` element subtree, for media discovery.
    pub element: Element,
    /// Items in document order.
    pub items: Vec<Item>,
}

/// One feed entry.
#[derive(Debug)]
pub struct Item {
    /// Item title, empty when the feed omits it.
    pub title: String,
    /// Feed-supplied identifier, empty when the feed omits it.
    pub guid: String,
    /// Exact original fragment from `<item` through `</item>`.
    pub raw: String,
    /// The `<item>` element subtree, for media discovery.
    pub element: Element,
}

/// Parse a raw feed body into a [`FeedDocument`].
///
/// Never fails: recoverable markup problems are tolerated, and an
/// unrecoverable reader error just truncates the walk at that point.
pub fn parse_feed(raw: &str) -> FeedDocument {
    let root = build_tree(raw);

    let mut channels = Vec::new();
    for channel_el in root.descendants().filter(|el| el.name == "channel") {
        let items = channel_el
            .descendants()
            .filter(|el| el.name == "item")
            .map(|item_el| Item {
                title: item_el.text_of_first("title"),
                guid: item_el.text_of_first("guid"),
                raw: item_el
                    .span
                    .and_then(|(start, end)| raw.get(start..end))
                    .unwrap_or_default()
                    .to_string(),
                element: item_el.clone(),
            })
            .collect();

        channels.push(Channel {
            title: channel_el.text_of_first("title"),
            element: channel_el.clone(),
            items,
        });
    }

    FeedDocument { channels }
}

/// Build the generic element tree for the whole document.
fn build_tree(raw: &str) -> Element {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().check_end_names = false;

    let mut root = Element::default();
    // Open elements, each with the byte offset of its start tag.
    let mut stack: Vec<(Element, usize)> = Vec::new();
    let mut pos = 0usize;

    loop {
        let event = reader.read_event();
        let start = pos;
        pos = reader.buffer_position() as usize;

        match event {
            Ok(Event::Start(tag)) => {
                stack.push((element_from_tag(&tag), start));
            }
            Ok(Event::Empty(tag)) => {
                let mut el = element_from_tag(&tag);
                el.span = Some((start, pos));
                attach(&mut root, &mut stack, el);
            }
            Ok(Event::End(tag)) => {
                let tag_name = tag.name();
                let name = String::from_utf8_lossy(tag_name.as_ref());
                match stack.last() {
                    Some((el, _)) if el.name == name.as_ref() => {
                        // Pattern above guarantees the pop.
                        if let Some((mut el, opened_at)) = stack.pop() {
                            el.span = Some((opened_at, pos));
                            attach(&mut root, &mut stack, el);
                        }
                    }
                    // Stray closing tag with no matching open element.
                    _ => warn!(element = %name, offset = start, "ignoring stray end tag"),
                }
            }
            Ok(Event::Text(text)) => {
                let decoded = match std::str::from_utf8(&text)
                    .ok()
                    .and_then(|s| quick_xml::escape::unescape(s).ok())
                {
                    Some(cow) => cow.into_owned(),
                    None => String::from_utf8_lossy(&text).into_owned(),
                };
                append_text(&mut root, &mut stack, &decoded);
            }
            Ok(Event::CData(cdata)) => {
                let decoded = String::from_utf8_lossy(&cdata).into_owned();
                append_text(&mut root, &mut stack, &decoded);
            }
            Ok(Event::GeneralRef(entity)) => {
                let name = String::from_utf8_lossy(&entity).into_owned();
                append_text(&mut root, &mut stack, &resolve_entity(&name));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, offset = start, "stopping feed parse on unrecoverable markup error");
                break;
            }
        }
    }

    // Close anything still open where the document ended.
    while let Some((el, _)) = stack.pop() {
        attach(&mut root, &mut stack, el);
    }

    root
}

/// Resolve a general entity reference to its text.
///
/// Handles the five predefined XML entities and numeric character
/// references; anything else is kept verbatim, ampersand included.
fn resolve_entity(name: &str) -> String {
    match name {
        "amp" => return "&".to_string(),
        "lt" => return "<".to_string(),
        "gt" => return ">".to_string(),
        "apos" => return "'".to_string(),
        "quot" => return "\"".to_string(),
        _ => {}
    }
    if let Some(num) = name.strip_prefix('#') {
        let parsed = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse::<u32>().ok(),
        };
        if let Some(ch) = parsed.and_then(char::from_u32) {
            return ch.to_string();
        }
    }
    format!("&{name};")
}

fn element_from_tag(tag: &BytesStart<'_>) -> Element {
    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in tag.attributes().with_checks(false).flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(cow) => cow.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attrs.push((key, value));
    }
    Element {
        name,
        attrs,
        ..Element::default()
    }
}

fn attach(root: &mut Element, stack: &mut Vec<(Element, usize)>, el: Element) {
    match stack.last_mut() {
        Some((parent, _)) => parent.children.push(el),
        None => root.children.push(el),
    }
}

fn append_text(root: &mut Element, stack: &mut Vec<(Element, usize)>, text: &str) {
    match stack.last_mut() {
        Some((el, _)) => el.text.push_str(text),
        None => root.text.push_str(text),
    }
}
