use std::collections::HashMap;
use std::iter::Peekable;

use base64::{engine::general_purpose as base64_engine, Engine as _};

use crate::xml_db::parse::{
    FromXml, IgnoreSubfield, SimpleTag, SimpleXmlEvent, XmlParseError,
};

/// The recognized subset of the database `Meta` section.
#[derive(Debug, Default)]
pub(crate) struct Meta {
    /// SHA-256 of the outer header, as recorded by the producer
    pub(crate) header_hash: Option<Vec<u8>>,
    pub(crate) database_name: Option<String>,
    /// Custom icon UUID (base64) to raw PNG data
    pub(crate) custom_icons: HashMap<String, Vec<u8>>,
}

impl FromXml for Meta {
    type Parses = Self;

    fn from_xml<I: Iterator<Item = SimpleXmlEvent>>(
        iterator: &mut Peekable<I>,
    ) -> Result<Self::Parses, XmlParseError> {
        let open_tag = iterator.next().ok_or(XmlParseError::Eof)?;
        if !matches!(open_tag, SimpleXmlEvent::Start(ref tag, _) if tag.eq_ignore_ascii_case("Meta"))
        {
            return Err(XmlParseError::BadEvent {
                expected: "Open Meta tag",
                event: open_tag,
            });
        }

        let mut out = Self::default();

        while let Some(event) = iterator.peek() {
            match event {
                SimpleXmlEvent::Start(name, _) => match name.to_ascii_lowercase().as_str() {
                    "headerhash" => {
                        if let Some(encoded) =
                            SimpleTag::<Option<String>>::from_xml(iterator)?.value
                        {
                            out.header_hash =
                                Some(base64_engine::STANDARD.decode(encoded.trim())?);
                        }
                    }
                    "databasename" => {
                        out.database_name = SimpleTag::<Option<String>>::from_xml(iterator)?.value;
                    }
                    "customicons" => {
                        parse_custom_icons(iterator, &mut out.custom_icons)?;
                    }
                    _ => {
                        IgnoreSubfield::from_xml(iterator)?;
                    }
                },
                SimpleXmlEvent::End(name) if name.eq_ignore_ascii_case("Meta") => break,
                _ => {
                    return Err(XmlParseError::BadEvent {
                        expected: "start tag or close Meta",
                        event: event.clone(),
                    })
                }
            }
        }

        let _close_tag = iterator.next().ok_or(XmlParseError::Eof)?;

        Ok(out)
    }
}

fn parse_custom_icons<I: Iterator<Item = SimpleXmlEvent>>(
    iterator: &mut Peekable<I>,
    icons: &mut HashMap<String, Vec<u8>>,
) -> Result<(), XmlParseError> {
    let _open_tag = iterator.next().ok_or(XmlParseError::Eof)?;

    while let Some(event) = iterator.peek() {
        match event {
            SimpleXmlEvent::Start(name, _) => {
                if name.eq_ignore_ascii_case("Icon") {
                    if let Some((uuid, data)) = parse_icon(iterator)? {
                        icons.insert(uuid, data);
                    }
                } else {
                    IgnoreSubfield::from_xml(iterator)?;
                }
            }
            SimpleXmlEvent::End(name) if name.eq_ignore_ascii_case("CustomIcons") => break,
            _ => {
                return Err(XmlParseError::BadEvent {
                    expected: "start tag or close CustomIcons",
                    event: event.clone(),
                })
            }
        }
    }

    let _close_tag = iterator.next().ok_or(XmlParseError::Eof)?;

    Ok(())
}

fn parse_icon<I: Iterator<Item = SimpleXmlEvent>>(
    iterator: &mut Peekable<I>,
) -> Result<Option<(String, Vec<u8>)>, XmlParseError> {
    let _open_tag = iterator.next().ok_or(XmlParseError::Eof)?;

    let mut uuid: Option<String> = None;
    let mut data: Option<Vec<u8>> = None;

    while let Some(event) = iterator.peek() {
        match event {
            SimpleXmlEvent::Start(name, _) => match name.to_ascii_lowercase().as_str() {
                "uuid" => {
                    uuid = SimpleTag::<Option<String>>::from_xml(iterator)?.value;
                }
                "data" => {
                    if let Some(encoded) = SimpleTag::<Option<String>>::from_xml(iterator)?.value {
                        data = Some(base64_engine::STANDARD.decode(encoded.trim())?);
                    }
                }
                _ => {
                    IgnoreSubfield::from_xml(iterator)?;
                }
            },
            SimpleXmlEvent::End(name) if name.eq_ignore_ascii_case("Icon") => break,
            _ => {
                return Err(XmlParseError::BadEvent {
                    expected: "start tag or close Icon",
                    event: event.clone(),
                })
            }
        }
    }

    let _close_tag = iterator.next().ok_or(XmlParseError::Eof)?;

    Ok(uuid.zip(data))
}
