//! Minimal hardened XML element tree.
//!
//! Manifests, `.plugin` descriptors and the remote feed are all small
//! documents from untrusted sources. They are read into a plain element
//! tree; document type declarations (and with them every entity
//! definition) and XInclude elements are refused outright, and entity
//! references other than the five predefined ones fail to unescape.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// One element with its concatenated text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified tag name.
    pub name: String,
    /// Concatenated text and CDATA content.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        if local == "include" && name.contains(':') {
            return Err(format!("include element <{name}> is not allowed"));
        }
        Ok(Self {
            name,
            ..Self::default()
        })
    }

    /// First direct child named `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Trimmed text of the first direct child named `name`.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }

    /// First element named `name` in depth-first order, including `self`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Every element named `name` in depth-first order, including `self`.
    #[must_use]
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect(name, &mut found);
        found
    }

    fn collect<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        if self.name == name {
            found.push(self);
        }
        for child in &self.children {
            child.collect(name, found);
        }
    }
}

/// Parses `input` into its root element.
///
/// Errors are human-readable reasons; callers wrap them with the document's
/// origin.
pub fn parse_document(input: &str) -> Result<XmlElement, String> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(XmlElement::from_start(&start)?),
            Ok(Event::Empty(start)) => {
                let element = XmlElement::from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "unexpected closing tag".to_string())?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                let value = text.unescape().map_err(|e| e.to_string())?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&value);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::DocType(_)) => {
                return Err("document type declarations are not allowed".to_string());
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "error at position {}: {}",
                    reader.error_position(),
                    e
                ));
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{}>", open.name));
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err("multiple root elements".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let doc = parse_document(
            "<?xml version=\"1.0\"?><A><B>one</B><C><B>two</B></C><D/></A>",
        )
        .unwrap();
        assert_eq!(doc.name, "A");
        assert_eq!(doc.child_text("B"), Some("one"));
        assert_eq!(doc.find_all("B").len(), 2);
        assert!(doc.child("D").is_some());
    }

    #[test]
    fn test_predefined_entities_and_cdata() {
        let doc = parse_document("<A><B>Tom &amp; Jerry</B><C><![CDATA[<raw>]]></C></A>").unwrap();
        assert_eq!(doc.child_text("B"), Some("Tom & Jerry"));
        assert_eq!(doc.child_text("C"), Some("<raw>"));
    }

    #[test]
    fn test_rejects_doctype() {
        let input = "<?xml version=\"1.0\"?>\
            <!DOCTYPE A [<!ENTITY xxe SYSTEM \"file:///etc/passwd\">]>\
            <A>&xxe;</A>";
        let err = parse_document(input).unwrap_err();
        assert!(err.contains("document type"));
    }

    #[test]
    fn test_rejects_unknown_entity() {
        assert!(parse_document("<A>&xxe;</A>").is_err());
    }

    #[test]
    fn test_rejects_xinclude() {
        let input = "<A xmlns:xi=\"http://www.w3.org/2001/XInclude\">\
            <xi:include href=\"/etc/passwd\"/></A>";
        assert!(parse_document(input).is_err());
    }

    #[test]
    fn test_rejects_mismatched_tags() {
        assert!(parse_document("<A><B></A>").is_err());
        assert!(parse_document("<A>").is_err());
        assert!(parse_document("").is_err());
    }
}
