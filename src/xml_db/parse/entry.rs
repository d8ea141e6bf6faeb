use std::iter::Peekable;

use crate::{
    db::{Entry, Value},
    xml_db::parse::{FromXml, IgnoreSubfield, SimpleTag, SimpleXmlEvent, XmlParseError},
};

/// The key under which an entry's password is stored.
const PASSWORD_FIELD: &str = "Password";

impl FromXml for Entry {
    type Parses = Self;

    fn from_xml<I: Iterator<Item = SimpleXmlEvent>>(
        iterator: &mut Peekable<I>,
    ) -> Result<Self::Parses, XmlParseError> {
        let open_tag = iterator.next().ok_or(XmlParseError::Eof)?;
        if !matches!(open_tag, SimpleXmlEvent::Start(ref tag, _) if tag.eq_ignore_ascii_case("Entry"))
        {
            return Err(XmlParseError::BadEvent {
                expected: "Open Entry tag",
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
                    "iconid" => {
                        out.icon_id = SimpleTag::<Option<usize>>::from_xml(iterator)?.value;
                    }
                    "customiconuuid" => {
                        out.custom_icon_uuid =
                            SimpleTag::<Option<String>>::from_xml(iterator)?.value;
                    }
                    "tags" => {
                        out.tags = SimpleTag::<Option<String>>::from_xml(iterator)?.value;
                    }
                    "string" => {
                        let field = StringField::from_xml(iterator)?;
                        if let Some(value) = field.value {
                            if field.key == PASSWORD_FIELD {
                                out.password = Some(value);
                            } else {
                                out.fields.insert(field.key, value);
                            }
                        }
                    }
                    "history" => {
                        parse_history(iterator, &mut out.history)?;
                    }
                    _ => {
                        IgnoreSubfield::from_xml(iterator)?;
                    }
                },
                SimpleXmlEvent::End(name) if name.eq_ignore_ascii_case("Entry") => break,
                _ => {
                    return Err(XmlParseError::BadEvent {
                        expected: "start tag or close Entry",
                        event: event.clone(),
                    })
                }
            }
        }

        let _close_tag = iterator.next().ok_or(XmlParseError::Eof)?;

        Ok(out)
    }
}

/// Previous versions of an entry. Their own history is always empty.
fn parse_history<I: Iterator<Item = SimpleXmlEvent>>(
    iterator: &mut Peekable<I>,
    history: &mut Vec<Entry>,
) -> Result<(), XmlParseError> {
    let _open_tag = iterator.next().ok_or(XmlParseError::Eof)?;

    while let Some(event) = iterator.peek() {
        match event {
            SimpleXmlEvent::Start(name, _) => {
                if name.eq_ignore_ascii_case("Entry") {
                    let mut entry = Entry::from_xml(iterator)?;
                    entry.history.clear();
                    history.push(entry);
                } else {
                    IgnoreSubfield::from_xml(iterator)?;
                }
            }
            SimpleXmlEvent::End(name) if name.eq_ignore_ascii_case("History") => break,
            _ => {
                return Err(XmlParseError::BadEvent {
                    expected: "start tag or close History",
                    event: event.clone(),
                })
            }
        }
    }

    let _close_tag = iterator.next().ok_or(XmlParseError::Eof)?;

    Ok(())
}

#[derive(Debug, Default)]
struct StringField {
    key: String,
    value: Option<Value>,
}

impl FromXml for StringField {
    type Parses = StringField;

    fn from_xml<I: Iterator<Item = SimpleXmlEvent>>(
        iterator: &mut Peekable<I>,
    ) -> Result<Self::Parses, XmlParseError> {
        let open_tag = iterator.next().ok_or(XmlParseError::Eof)?;
        if !matches!(open_tag, SimpleXmlEvent::Start(ref tag, _) if tag.eq_ignore_ascii_case("String"))
        {
            return Err(XmlParseError::BadEvent {
                expected: "Open String tag",
                event: open_tag,
            });
        }

        let mut out = Self::default();

        while let Some(event) = iterator.peek() {
            match event {
                SimpleXmlEvent::Start(name, _) => match name.to_ascii_lowercase().as_str() {
                    "key" => {
                        out.key = SimpleTag::<String>::from_xml(iterator)?.value;
                    }
                    "value" => {
                        let value = Value::from_xml(iterator)?;
                        if !value.is_empty() {
                            out.value = Some(value);
                        }
                    }
                    _ => {
                        IgnoreSubfield::from_xml(iterator)?;
                    }
                },
                SimpleXmlEvent::End(name) if name.eq_ignore_ascii_case("String") => break,
                _ => {
                    return Err(XmlParseError::BadEvent {
                        expected: "start tag or close String",
                        event: event.clone(),
                    })
                }
            }
        }

        let _close_tag = iterator.next().ok_or(XmlParseError::Eof)?;

        Ok(out)
    }
}

impl FromXml for Value {
    type Parses = Value;

    fn from_xml<I: Iterator<Item = SimpleXmlEvent>>(
        iterator: &mut Peekable<I>,
    ) -> Result<Self::Parses, XmlParseError> {
        let open_tag = iterator.next().ok_or(XmlParseError::Eof)?;
        let name = if let SimpleXmlEvent::Start(name, _) = open_tag {
            name
        } else {
            return Err(XmlParseError::BadEvent {
                expected: "Open Value tag",
                event: open_tag,
            });
        };

        let value = match iterator.peek() {
            Some(SimpleXmlEvent::Characters(_) | SimpleXmlEvent::Protected(_)) => {
                match iterator.next() {
                    Some(SimpleXmlEvent::Characters(content)) => Value::Unprotected(content),
                    Some(SimpleXmlEvent::Protected(protected)) => Value::Protected(protected),
                    _ => Value::Unprotected(String::new()),
                }
            }
            _ => Value::Unprotected(String::new()),
        };

        let close_tag = iterator.next().ok_or(XmlParseError::Eof)?;
        if !matches!(close_tag, SimpleXmlEvent::End(ref tag) if tag.eq_ignore_ascii_case(&name)) {
            return Err(XmlParseError::BadEvent {
                expected: "Close Value tag",
                event: close_tag,
            });
        }

        Ok(value)
    }
}
