//! Parsing of the decrypted XML payload of a KDBX3 database.
//!
//! The `xml-rs` event stream is first converted into a simplified event
//! stream. Protected values are decrypted during that conversion: the
//! converter walks the whole document in order, so every protected node
//! consumes its exact slice of the inner keystream in document order, no
//! matter which subtrees the model parsers later skip.

mod entry;
mod group;
mod meta;

pub(crate) use meta::Meta;

use std::collections::HashMap;
use std::iter::Peekable;

use base64::{engine::general_purpose as base64_engine, Engine as _};
use thiserror::Error;
use xml::name::OwnedName;
use xml::reader::{EventReader, XmlEvent};

use crate::{
    crypt::{ciphers::Cipher, CryptographyError},
    db::{Group, ProtectedString},
};

/// A simplified XML event. Depth bookkeeping and protected-value decryption
/// have already happened by the time these are produced.
#[derive(Debug, Clone)]
pub enum SimpleXmlEvent {
    Start(String, HashMap<String, String>),
    End(String),
    Characters(String),
    Protected(ProtectedString),
}

#[derive(Debug, Error)]
pub enum XmlParseError {
    #[error(transparent)]
    Xml(#[from] xml::reader::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Cryptography(#[from] CryptographyError),

    #[error("Unexpected end of XML document")]
    Eof,

    #[error("Expected {} but got {:?}", expected, event)]
    BadEvent {
        expected: &'static str,
        event: SimpleXmlEvent,
    },
}

/// The content of one parsed database document.
#[derive(Debug, Default)]
pub(crate) struct KeePassXml {
    pub(crate) meta: Meta,
    pub(crate) groups: Vec<Group>,
}

/// Parse a database from its inner XML document, decrypting protected
/// values with `inner_cipher` as they are encountered.
pub(crate) fn parse(
    xml: &[u8],
    inner_cipher: &mut dyn Cipher,
) -> Result<KeePassXml, XmlParseError> {
    let events = parse_xml_events(xml, inner_cipher)?;
    let mut iterator = events.into_iter().peekable();
    KeePassXml::from_xml(&mut iterator)
}

/// Convert the raw `xml-rs` event stream into `SimpleXmlEvent`s, decrypting
/// the text of elements carrying `Protected="True"` along the way.
fn parse_xml_events(
    xml: &[u8],
    inner_cipher: &mut dyn Cipher,
) -> Result<Vec<SimpleXmlEvent>, XmlParseError> {
    let mut events = Vec::new();

    // for every open element, whether its text is protected
    let mut protected_stack: Vec<bool> = Vec::new();

    for ev in EventReader::new(xml) {
        match ev? {
            XmlEvent::StartElement {
                name: OwnedName { local_name, .. },
                attributes,
                ..
            } => {
                let attributes: HashMap<String, String> = attributes
                    .into_iter()
                    .map(|a| (a.name.local_name, a.value))
                    .collect();

                let protected = attributes.iter().any(|(key, value)| {
                    key.eq_ignore_ascii_case("protected") && value.eq_ignore_ascii_case("true")
                });
                protected_stack.push(protected);

                events.push(SimpleXmlEvent::Start(local_name, attributes));
            }
            XmlEvent::EndElement {
                name: OwnedName { local_name, .. },
            } => {
                protected_stack.pop();
                events.push(SimpleXmlEvent::End(local_name));
            }
            XmlEvent::Characters(content) | XmlEvent::CData(content) => {
                if protected_stack.last().copied().unwrap_or(false) {
                    let ciphertext = base64_engine::STANDARD.decode(content.as_bytes())?;
                    let pad = inner_cipher.keystream(ciphertext.len())?;
                    events.push(SimpleXmlEvent::Protected(ProtectedString::new(
                        ciphertext, pad,
                    )));
                } else {
                    events.push(SimpleXmlEvent::Characters(content));
                }
            }
            // whitespace, comments, processing instructions, document frame
            _ => {}
        }
    }

    Ok(events)
}

pub(crate) trait FromXml {
    type Parses;

    fn from_xml<I: Iterator<Item = SimpleXmlEvent>>(
        iterator: &mut Peekable<I>,
    ) -> Result<Self::Parses, XmlParseError>;
}

impl FromXml for KeePassXml {
    type Parses = Self;

    fn from_xml<I: Iterator<Item = SimpleXmlEvent>>(
        iterator: &mut Peekable<I>,
    ) -> Result<Self::Parses, XmlParseError> {
        let open_tag = iterator.next().ok_or(XmlParseError::Eof)?;
        if !matches!(open_tag, SimpleXmlEvent::Start(ref tag, _) if tag.eq_ignore_ascii_case("KeePassFile"))
        {
            return Err(XmlParseError::BadEvent {
                expected: "Open KeePassFile tag",
                event: open_tag,
            });
        }

        let mut out = Self::default();

        while let Some(event) = iterator.peek() {
            match event {
                SimpleXmlEvent::Start(name, _) => match name.to_ascii_lowercase().as_str() {
                    "meta" => {
                        out.meta = Meta::from_xml(iterator)?;
                    }
                    "root" => {
                        parse_root(iterator, &mut out.groups)?;
                    }
                    _ => {
                        IgnoreSubfield::from_xml(iterator)?;
                    }
                },
                SimpleXmlEvent::End(name) if name.eq_ignore_ascii_case("KeePassFile") => break,
                _ => {
                    return Err(XmlParseError::BadEvent {
                        expected: "start tag or close KeePassFile",
                        event: event.clone(),
                    })
                }
            }
        }

        let _close_tag = iterator.next().ok_or(XmlParseError::Eof)?;

        Ok(out)
    }
}

/// Parse the `Root` element: one or more top-level groups. Other children
/// (such as `DeletedObjects`) are skipped.
fn parse_root<I: Iterator<Item = SimpleXmlEvent>>(
    iterator: &mut Peekable<I>,
    groups: &mut Vec<Group>,
) -> Result<(), XmlParseError> {
    let open_tag = iterator.next().ok_or(XmlParseError::Eof)?;
    if !matches!(open_tag, SimpleXmlEvent::Start(ref tag, _) if tag.eq_ignore_ascii_case("Root")) {
        return Err(XmlParseError::BadEvent {
            expected: "Open Root tag",
            event: open_tag,
        });
    }

    while let Some(event) = iterator.peek() {
        match event {
            SimpleXmlEvent::Start(name, _) => {
                if name.eq_ignore_ascii_case("Group") {
                    groups.push(Group::from_xml(iterator)?);
                } else {
                    IgnoreSubfield::from_xml(iterator)?;
                }
            }
            SimpleXmlEvent::End(name) if name.eq_ignore_ascii_case("Root") => break,
            _ => {
                return Err(XmlParseError::BadEvent {
                    expected: "start tag or close Root",
                    event: event.clone(),
                })
            }
        }
    }

    let _close_tag = iterator.next().ok_or(XmlParseError::Eof)?;

    Ok(())
}

/// Helper type to simplify parsing of single-value elements
#[derive(Debug)]
pub(crate) struct SimpleTag<V> {
    #[allow(dead_code)]
    pub(crate) name: String,
    pub(crate) value: V,
}

pub(crate) trait FromXmlCharacters: Sized {
    fn from_xml_characters(value: Option<String>) -> Self;
}

impl FromXmlCharacters for String {
    fn from_xml_characters(value: Option<String>) -> Self {
        value.unwrap_or_default()
    }
}

impl FromXmlCharacters for Option<String> {
    fn from_xml_characters(value: Option<String>) -> Self {
        value
    }
}

impl FromXmlCharacters for Option<usize> {
    fn from_xml_characters(value: Option<String>) -> Self {
        value.and_then(|v| v.trim().parse().ok())
    }
}

impl<V: FromXmlCharacters> FromXml for SimpleTag<V> {
    type Parses = Self;

    fn from_xml<I: Iterator<Item = SimpleXmlEvent>>(
        iterator: &mut Peekable<I>,
    ) -> Result<Self::Parses, XmlParseError> {
        let open_tag = iterator.next().ok_or(XmlParseError::Eof)?;
        let name = if let SimpleXmlEvent::Start(name, _) = open_tag {
            name
        } else {
            return Err(XmlParseError::BadEvent {
                expected: "open tag",
                event: open_tag,
            });
        };

        let mut value: Option<String> = None;

        if let Some(SimpleXmlEvent::Characters(_)) = iterator.peek() {
            if let Some(SimpleXmlEvent::Characters(content)) = iterator.next() {
                value = Some(content);
            }
        }

        let close_tag = iterator.next().ok_or(XmlParseError::Eof)?;
        if !matches!(close_tag, SimpleXmlEvent::End(ref tag) if tag.eq_ignore_ascii_case(&name)) {
            return Err(XmlParseError::BadEvent {
                expected: "matching close tag",
                event: close_tag,
            });
        }

        Ok(SimpleTag {
            name,
            value: V::from_xml_characters(value),
        })
    }
}

/// Consume a whole element subtree without interpreting it.
pub(crate) struct IgnoreSubfield;

impl FromXml for IgnoreSubfield {
    type Parses = ();

    fn from_xml<I: Iterator<Item = SimpleXmlEvent>>(
        iterator: &mut Peekable<I>,
    ) -> Result<Self::Parses, XmlParseError> {
        let open_tag = iterator.next().ok_or(XmlParseError::Eof)?;
        if !matches!(open_tag, SimpleXmlEvent::Start(..)) {
            return Err(XmlParseError::BadEvent {
                expected: "open tag of ignored subfield",
                event: open_tag,
            });
        }

        let mut depth = 1usize;
        while depth > 0 {
            match iterator.next().ok_or(XmlParseError::Eof)? {
                SimpleXmlEvent::Start(..) => depth += 1,
                SimpleXmlEvent::End(_) => depth -= 1,
                SimpleXmlEvent::Characters(_) | SimpleXmlEvent::Protected(_) => {}
            }
        }

        Ok(())
    }
}
