use std::iter::Peekable;

use crate::{
    db::{Entry, Group},
    xml_db::parse::{FromXml, IgnoreSubfield, SimpleTag, SimpleXmlEvent, XmlParseError},
};

impl FromXml for Group {
    type Parses = Self;

    fn from_xml<I: Iterator<Item = SimpleXmlEvent>>(
        iterator: &mut Peekable<I>,
    ) -> Result<Self::Parses, XmlParseError> {
        let open_tag = iterator.next().ok_or(XmlParseError::Eof)?;
        if !matches!(open_tag, SimpleXmlEvent::Start(ref tag, _) if tag.eq_ignore_ascii_case("Group"))
        {
            return Err(XmlParseError::BadEvent {
                expected: "Open Group tag",
                event: open_tag,
            });
        }

        let mut out = Self::default();

        while let Some(event) = iterator.peek() {
            match event {
                SimpleXmlEvent::Start(name, _) => match name.to_ascii_lowercase().as_str() {
                    "uuid" => {
                        out.uuid = SimpleTag::<String>::from_xml(iterator)?.value;
                    }
                    "name" => {
                        out.name = SimpleTag::<String>::from_xml(iterator)?.value;
                    }
                    "iconid" => {
                        out.icon_id = SimpleTag::<Option<usize>>::from_xml(iterator)?.value;
                    }
                    "customiconuuid" => {
                        out.custom_icon_uuid =
                            SimpleTag::<Option<String>>::from_xml(iterator)?.value;
                    }
                    "group" => {
                        out.groups.push(Group::from_xml(iterator)?);
                    }
                    "entry" => {
                        out.entries.push(Entry::from_xml(iterator)?);
                    }
                    _ => {
                        IgnoreSubfield::from_xml(iterator)?;
                    }
                },
                SimpleXmlEvent::End(name) if name.eq_ignore_ascii_case("Group") => break,
                _ => {
                    return Err(XmlParseError::BadEvent {
                        expected: "start tag or close Group",
                        event: event.clone(),
                    })
                }
            }
        }

        let _close_tag = iterator.next().ok_or(XmlParseError::Eof)?;

        Ok(out)
    }
}
