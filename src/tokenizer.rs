//! Markup tokenizer: turns score markup into the open / text / close
//! event stream consumed by the import builder.

use roxmltree::{Document as XmlDocument, Node};

use crate::error::{ImportError, Result};

/// Attributes of an opened element, in document order.
///
/// Lookups of absent attributes yield the empty string, so "absent" and
/// "empty" are indistinguishable to consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy when driving a handler by hand.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set an attribute, replacing an earlier value of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Value of `name`, or `""` when absent.
    pub fn value(&self, name: &str) -> &str {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map_or("", |(_, v)| v.as_str())
    }

    /// Whether `name` is present with a non-empty value.
    pub fn is_set(&self, name: &str) -> bool {
        !self.value(name).is_empty()
    }

    /// Integer value of `name`; absent or malformed values read as 0.
    pub fn int(&self, name: &str) -> i32 {
        self.value(name).trim().parse().unwrap_or(0)
    }

    /// Unsigned value of `name`; absent or malformed values read as 0.
    pub fn uint(&self, name: &str) -> u32 {
        self.value(name).trim().parse().unwrap_or(0)
    }

    /// Boolean flag written as `"1"`.
    pub fn flag(&self, name: &str) -> bool {
        self.value(name) == "1"
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut attributes = Attributes::new();
        for (name, value) in iter {
            attributes.insert(name, value);
        }
        attributes
    }
}

/// Receiver of the tokenizer's event stream.
///
/// A handler returning an error aborts the stream; no further events are
/// delivered.
pub trait ContentHandler {
    fn open(&mut self, name: &str, attributes: &Attributes) -> Result<()>;

    fn text(&mut self, text: &str);

    fn close(&mut self, name: &str) -> Result<()>;

    /// Called once when the markup is not well-formed. The returned error
    /// is what the tokenizer reports.
    fn fatal_error(&mut self, line: u32, column: u32, message: &str) -> ImportError {
        ImportError::Syntax {
            line,
            column,
            message: message.to_string(),
        }
    }
}

/// Parse `xml` and feed every element and text node to `handler` in
/// document order.
pub fn tokenize<H: ContentHandler + ?Sized>(xml: &str, handler: &mut H) -> Result<()> {
    // Score files may carry a DOCTYPE declaration, so we must allow DTDs
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = match XmlDocument::parse_with_options(xml, options) {
        Ok(doc) => doc,
        Err(e) => {
            let pos = e.pos();
            return Err(handler.fatal_error(pos.row, pos.col, &e.to_string()));
        }
    };

    // Walk without recursion; nesting depth is up to the input
    let mut stack: Vec<(Node, roxmltree::Children)> = vec![(doc.root(), doc.root().children())];
    while let Some((node, children)) = stack.last_mut() {
        let Some(child) = children.next() else {
            let node = *node;
            stack.pop();
            if node.is_element() {
                handler.close(node.tag_name().name())?;
            }
            continue;
        };
        if child.is_element() {
            let attributes: Attributes = child
                .attributes()
                .map(|a| (a.name(), a.value()))
                .collect();
            handler.open(child.tag_name().name(), &attributes)?;
            stack.push((child, child.children()));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                handler.text(text);
            }
        }
    }

    Ok(())
}
