//! Schema-agnostic XML to value-tree conversion.
//!
//! Every element becomes either a [`Value::Leaf`] (no attributes, no child
//! elements) or a [`Value::Node`] keyed by attribute and child-element names.
//! Attribute values and text content are passed through [`coerce`], so
//! `"45"` arrives as an integer and `"1.20"` as a float. Names are kept
//! verbatim, prefixes included (`gs:cell`, `batch:status`).
//!
//! The module knows nothing about feeds; see [`crate::feed`] for that.

use std::collections::BTreeMap;
use std::fmt;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::Error;

/// Key under which a node's own text content is serialized.
pub const TEXT_KEY: &str = "$t";

/// A coerced attribute value or text content.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value of an integer or float scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(n) => Some(*n as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(_) => None,
        }
    }

    pub fn is_number(&self) -> bool {
        !matches!(self, Scalar::Text(_))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Integer(n) => write!(f, "{}", n),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Integer(n)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

/// One converted element (or attribute).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Leaf(Scalar),
    Node(Node),
}

/// All values recorded under one key: a single element, or every same-named
/// sibling in document order.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Field {
    One(Value),
    Many(Vec<Value>),
}

/// An element with attributes and/or child elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    fields: BTreeMap<String, Field>,
    text: Option<Scalar>,
}

impl Value {
    /// First value stored under `key`; always `None` for leaves.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_node().and_then(|n| n.get(key))
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.as_node().and_then(|n| n.field(key))
    }

    /// The element's own text: the leaf scalar itself, or a node's `$t`.
    pub fn text(&self) -> Option<&Scalar> {
        match self {
            Value::Leaf(s) => Some(s),
            Value::Node(n) => n.text(),
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            Value::Leaf(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Leaf(s) => Some(s),
            Value::Node(_) => None,
        }
    }
}

impl Field {
    pub fn first(&self) -> Option<&Value> {
        match self {
            Field::One(v) => Some(v),
            Field::Many(vs) => vs.first(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        match self {
            Field::One(v) => std::slice::from_ref(v).iter(),
            Field::Many(vs) => vs.iter(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Field::One(_) => 1,
            Field::Many(vs) => vs.len(),
        }
    }

    fn push(&mut self, value: Value) {
        let prev = std::mem::replace(self, Field::Many(Vec::new()));
        *self = match prev {
            Field::One(first) => Field::Many(vec![first, value]),
            Field::Many(mut values) => {
                values.push(value);
                Field::Many(values)
            }
        };
    }
}

impl<'a> IntoIterator for &'a Field {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Node {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).and_then(Field::first)
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    pub fn text(&self) -> Option<&Scalar> {
        self.text.as_ref()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.text.is_none()
    }

    fn insert(&mut self, key: String, value: Value) {
        match self.fields.get_mut(&key) {
            Some(field) => field.push(value),
            None => {
                self.fields.insert(key, Field::One(value));
            }
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.fields.len() + usize::from(self.text.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, field) in &self.fields {
            map.serialize_entry(key, field)?;
        }
        if let Some(text) = &self.text {
            map.serialize_entry(TEXT_KEY, text)?;
        }
        map.end()
    }
}

/// Lexical coercion: integer, then float, else the string untouched.
pub fn coerce(raw: &str) -> Scalar {
    let s = raw.trim();
    if looks_like_integer(s) {
        if let Ok(n) = s.parse::<i64>() {
            return Scalar::Integer(n);
        }
    }
    if looks_like_float(s) {
        if let Ok(x) = s.parse::<f64>() {
            return Scalar::Float(x);
        }
    }
    Scalar::Text(raw.to_string())
}

fn strip_sign(s: &str) -> &str {
    s.strip_prefix(['+', '-']).unwrap_or(s)
}

fn looks_like_integer(s: &str) -> bool {
    let digits = strip_sign(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn looks_like_float(s: &str) -> bool {
    let body = strip_sign(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };

    if let Some(exp) = exponent {
        if !looks_like_integer(exp) {
            return false;
        }
    }

    let mut digits = 0usize;
    let mut dots = 0usize;
    for b in mantissa.bytes() {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

struct Frame {
    name: String,
    node: Node,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, Error> {
        let name = utf8(start.name().as_ref())?.to_string();
        let mut node = Node::default();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::Xml(format!("in <{}>: {}", name, e)))?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("attribute {} of <{}>: {}", key, name, e)))?;
            node.insert(key, Value::Leaf(coerce(&value)));
        }
        Ok(Self {
            name,
            node,
            text: String::new(),
        })
    }

    fn finish(self) -> (String, Value) {
        let Frame {
            name,
            mut node,
            text,
        } = self;
        let text = text.trim();
        if node.fields.is_empty() {
            return (name, Value::Leaf(coerce(text)));
        }
        if !text.is_empty() {
            node.text = Some(coerce(text));
        }
        (name, Value::Node(node))
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(bytes).map_err(|e| Error::Xml(format!("invalid UTF-8: {}", e)))
}

/// Hands a completed element to its parent, or records it as the document root.
fn attach(
    stack: &mut [Frame],
    root: &mut Option<(String, Value)>,
    name: String,
    value: Value,
) {
    match stack.last_mut() {
        Some(parent) => parent.node.insert(name, value),
        None => *root = Some((name, value)),
    }
}

/// Appends a raw text chunk to the open element; trimming happens once the element closes.
fn push_text(stack: &mut [Frame], text: &str) -> Result<(), Error> {
    match stack.last_mut() {
        Some(frame) => frame.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err(Error::Xml("text outside the root element".into())),
    }
    Ok(())
}

/// Parses an XML document into a value tree.
///
/// The result is a node with a single key, the root element's name, so an
/// Atom feed comes back as `{"feed": {...}}`.
pub fn parse(xml: &str) -> Result<Value, Error> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::Xml(format!("{} at position {}", e, reader.buffer_position()))
        })?;

        match event {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(Error::Xml("multiple root elements".into()));
                }
                stack.push(Frame::open(&start)?);
            }
            Event::Empty(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(Error::Xml("multiple root elements".into()));
                }
                let (name, value) = Frame::open(&start)?.finish();
                attach(&mut stack, &mut root, name, value);
            }
            Event::End(end) => {
                let frame = stack.pop().ok_or_else(|| {
                    Error::Xml(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(end.name().as_ref())
                    ))
                })?;
                let (name, value) = frame.finish();
                attach(&mut stack, &mut root, name, value);
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| Error::Xml(format!("bad text content: {}", e)))?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                push_text(&mut stack, utf8(&raw)?)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::Xml(format!("unclosed element <{}>", open.name)));
    }
    let (name, value) = root.ok_or_else(|| Error::Xml("document has no root element".into()))?;

    let mut document = Node::default();
    document.insert(name, value);
    Ok(Value::Node(document))
}
