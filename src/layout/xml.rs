use crate::error::{DespeckleError, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A child of an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    /// Raw (still escaped) comment body
    Comment(String),
    /// Raw processing instruction body
    ProcessingInstruction(String),
}

/// An XML element with its attributes in document order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Qualified name, including any namespace prefix
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Name without namespace prefix
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Build a name in the same namespace as this element
    pub fn sibling_name(&self, local: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Child elements together with their index in `children`
    pub fn elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(i, node)| match node {
                Node::Element(el) => Some((i, el)),
                _ => None,
            })
    }

    /// First child element with the given local name
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.elements()
            .map(|(_, el)| el)
            .find(|el| el.local_name() == local)
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(el) if el.local_name() == local => Some(el),
            _ => None,
        })
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn insert(&mut self, index: usize, child: Element) {
        let index = index.min(self.children.len());
        self.children.insert(index, Node::Element(child));
    }

    /// Follow a path of child indices down the tree
    pub fn descendant(&self, path: &[usize]) -> Option<&Element> {
        path.iter().try_fold(self, |el, &i| match el.children.get(i) {
            Some(Node::Element(child)) => Some(child),
            _ => None,
        })
    }

    pub fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut el = self;
        for &i in path {
            el = match el.children.get_mut(i) {
                Some(Node::Element(child)) => child,
                _ => return None,
            };
        }
        Some(el)
    }
}

/// A parsed XML document
///
/// Unknown elements, attributes and comments survive a parse/serialize cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: Element,
}

impl XmlDocument {
    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(element_from(&e)?),
                Event::Empty(e) => {
                    let el = element_from(&e)?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| DespeckleError::Xml("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::Text(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(e.unescape()?.into_owned()));
                    }
                }
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(Node::CData(String::from_utf8_lossy(&e).into_owned()));
                    }
                }
                Event::Comment(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(Node::Comment(String::from_utf8_lossy(&e).into_owned()));
                    }
                }
                Event::PI(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::ProcessingInstruction(
                            String::from_utf8_lossy(&e).into_owned(),
                        ));
                    }
                }
                Event::Decl(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        if let Some(open) = stack.last() {
            return Err(DespeckleError::Xml(format!(
                "unclosed element <{}>",
                open.name
            )));
        }

        root.map(|root| Self { root })
            .ok_or_else(|| DespeckleError::Xml("document has no root element".to_string()))
    }

    /// Serialize with an XML declaration
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Text(BytesText::new("\n")))?;
        write_element(&mut writer, &self.root)?;
        writer.write_event(Event::Text(BytesText::new("\n")))?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| DespeckleError::Xml(format!("serialized document is not UTF-8: {}", e)))
    }
}

fn element_from(start: &BytesStart) -> Result<Element> {
    let mut el = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        el.attributes.push((key, value));
    }
    Ok(el)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.push(el);
    } else if root.is_some() {
        return Err(DespeckleError::Xml(format!(
            "second root element <{}>",
            el.name
        )));
    } else {
        *root = Some(el);
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        match child {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            Node::CData(data) => writer.write_event(Event::CData(BytesCData::new(data.as_str())))?,
            Node::Comment(body) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(body.as_str())))?
            }
            Node::ProcessingInstruction(body) => {
                writer.write_event(Event::PI(BytesText::from_escaped(body.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<pc:PcGts xmlns:pc="http://schema.primaresearch.org/PAGE/gts/pagecontent/2019-07-15" pcGtsId="p1">
  <!-- keep me -->
  <pc:Page imageFilename="img/p1.png" custom="a &amp; b">
    <pc:Unknown><![CDATA[raw <data>]]></pc:Unknown>
  </pc:Page>
</pc:PcGts>
"#;

    #[test]
    fn test_parse_keeps_prefix_and_attributes() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.root.local_name(), "PcGts");
        assert_eq!(doc.root.prefix(), Some("pc"));
        assert_eq!(doc.root.attr("pcGtsId"), Some("p1"));

        let page = doc.root.child("Page").unwrap();
        assert_eq!(page.attr("custom"), Some("a & b"));
        assert_eq!(page.sibling_name("AlternativeImage"), "pc:AlternativeImage");
    }

    #[test]
    fn test_serialize_preserves_unknown_content() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let xml = doc.to_xml().unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<!-- keep me -->"));
        assert!(xml.contains("<![CDATA[raw <data>]]>"));
        assert!(xml.contains("custom=\"a &amp; b\""));

        let reparsed = XmlDocument::parse(&xml).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_descendant_paths() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let (page_index, _) = doc
            .root
            .elements()
            .find(|(_, el)| el.local_name() == "Page")
            .unwrap();
        let page = doc.root.descendant(&[page_index]).unwrap();
        assert_eq!(page.local_name(), "Page");
        assert!(doc.root.descendant(&[page_index, 99]).is_none());
    }

    #[test]
    fn test_rejects_unclosed_elements() {
        assert!(XmlDocument::parse("<PcGts><Page>").is_err());
        assert!(XmlDocument::parse("").is_err());
    }
}
