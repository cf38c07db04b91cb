//! Generic XML element tree for serde values.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <home version="1">
//!   <map>
//!     <field name="name"><str>Kitchen</str></field>
//!     <field name="levels"><list><num>0</num><num>1</num></list></field>
//!     <field name="height"><float>250.5</float></field>
//!     <field name="ceiling"><null/></field>
//!   </map>
//! </home>
//! ```
//!
//! Floats keep their own element so integral values read back as floats;
//! non-finite floats are written as `NaN`, `inf` and `-inf`.

use std::borrow::Cow;
use std::io::{BufReader, Read, Write};

use ciborium::value::{Integer, Value};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ArchiveError, Result};

const ROOT: &str = "home";
const ROOT_VERSION: &str = "1";
const NULL: &str = "null";
const BOOL: &str = "bool";
const NUM: &str = "num";
const FLOAT: &str = "float";
const STR: &str = "str";
const LIST: &str = "list";
const MAP: &str = "map";
const FIELD: &str = "field";
const FIELD_NAME: &str = "name";

/// Write `value` as a complete XML document.
pub fn write_document<W: Write>(value: &Value, writer: W) -> Result<()> {
    let mut writer = Writer::new(writer);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(
        &mut writer,
        Event::Start(BytesStart::new(ROOT).with_attributes([("version", ROOT_VERSION)])),
    )?;
    write_value(&mut writer, value)?;
    emit(&mut writer, Event::End(BytesEnd::new(ROOT)))
}

fn write_value<W: Write>(writer: &mut Writer<W>, value: &Value) -> Result<()> {
    match value {
        Value::Null => emit(writer, Event::Empty(BytesStart::new(NULL))),
        Value::Bool(b) => write_text(writer, BOOL, if *b { "true" } else { "false" }),
        Value::Integer(n) => write_text(writer, NUM, &i128::from(*n).to_string()),
        // `Display` gives the shortest text that parses back to the same
        // float, including `NaN`, `inf` and `-inf`.
        Value::Float(f) => write_text(writer, FLOAT, &f.to_string()),
        Value::Text(s) => write_text(writer, STR, s),
        Value::Array(items) => {
            emit(writer, Event::Start(BytesStart::new(LIST)))?;
            for item in items {
                write_value(writer, item)?;
            }
            emit(writer, Event::End(BytesEnd::new(LIST)))
        }
        Value::Map(fields) => {
            emit(writer, Event::Start(BytesStart::new(MAP)))?;
            for (name, field) in fields {
                let Value::Text(name) = name else {
                    return Err(ArchiveError::Encoding(format!("map key {name:?} is not text")));
                };
                emit(
                    writer,
                    Event::Start(BytesStart::new(FIELD).with_attributes([(FIELD_NAME, name.as_str())])),
                )?;
                write_value(writer, field)?;
                emit(writer, Event::End(BytesEnd::new(FIELD)))?;
            }
            emit(writer, Event::End(BytesEnd::new(MAP)))
        }
        other => Err(ArchiveError::Encoding(format!("no XML form for {other:?}"))),
    }
}

fn write_text<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(tag)))?;
    if !text.is_empty() {
        emit(writer, Event::Text(BytesText::new(text)))?;
    }
    emit(writer, Event::End(BytesEnd::new(tag)))
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| ArchiveError::Encoding(e.to_string()))
}

/// An element under construction.
struct Frame {
    tag: String,
    field_name: Option<String>,
    text: String,
    children: Vec<Node>,
}

enum Node {
    Value(Value),
    Field(String, Value),
}

/// Parse a document written by [`write_document`].
pub fn read_document<R: Read>(reader: R) -> Result<Value> {
    let mut reader = Reader::from_reader(BufReader::new(reader));
    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ArchiveError::Decoding(e.to_string()))?;
        match event {
            Event::Start(e) => stack.push(open_frame(&e)?),
            Event::Empty(e) => {
                let frame = open_frame(&e)?;
                close_frame(frame, &mut stack, &mut root)?;
            }
            Event::Text(t) => {
                if let Some(frame) = stack.last_mut() {
                    let text = t.unescape().map_err(|e| ArchiveError::Decoding(e.to_string()))?;
                    frame.text.push_str(&text);
                }
            }
            Event::CData(t) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| ArchiveError::Decoding("unbalanced end tag".into()))?;
                close_frame(frame, &mut stack, &mut root)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ArchiveError::Decoding("unexpected end of document".into()));
    }
    root.ok_or_else(|| ArchiveError::Decoding(format!("missing <{ROOT}> element")))
}

fn open_frame(start: &BytesStart<'_>) -> Result<Frame> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let field_name = if tag == FIELD {
        let attribute = start
            .try_get_attribute(FIELD_NAME)
            .map_err(|e| ArchiveError::Decoding(e.to_string()))?
            .ok_or_else(|| ArchiveError::Decoding("field without name".into()))?;
        let name: Cow<'_, str> = attribute
            .unescape_value()
            .map_err(|e| ArchiveError::Decoding(e.to_string()))?;
        Some(name.into_owned())
    } else {
        None
    };
    Ok(Frame {
        tag,
        field_name,
        text: String::new(),
        children: Vec::new(),
    })
}

fn close_frame(frame: Frame, stack: &mut Vec<Frame>, root: &mut Option<Value>) -> Result<()> {
    if frame.tag == ROOT {
        let value = single_value(frame.children, ROOT)?;
        *root = Some(value);
        return Ok(());
    }
    let node = match frame.tag.as_str() {
        FIELD => {
            let name = frame.field_name.unwrap_or_default();
            Node::Field(name, single_value(frame.children, FIELD)?)
        }
        _ => Node::Value(frame_value(frame)?),
    };
    let parent = stack
        .last_mut()
        .ok_or_else(|| ArchiveError::Decoding("element outside of the document root".into()))?;
    parent.children.push(node);
    Ok(())
}

fn frame_value(frame: Frame) -> Result<Value> {
    match frame.tag.as_str() {
        NULL => Ok(Value::Null),
        BOOL => match frame.text.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(ArchiveError::Decoding(format!("invalid bool {other:?}"))),
        },
        NUM => parse_integer(&frame.text).map(Value::Integer),
        FLOAT => parse_float(&frame.text).map(Value::Float),
        STR => Ok(Value::Text(frame.text)),
        LIST => frame
            .children
            .into_iter()
            .map(|child| match child {
                Node::Value(value) => Ok(value),
                Node::Field(name, _) => Err(ArchiveError::Decoding(format!("field {name:?} inside a list"))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        MAP => {
            let mut fields = Vec::with_capacity(frame.children.len());
            for child in frame.children {
                match child {
                    Node::Field(name, value) => fields.push((Value::Text(name), value)),
                    Node::Value(_) => return Err(ArchiveError::Decoding("value outside of a field".into())),
                }
            }
            Ok(Value::Map(fields))
        }
        other => Err(ArchiveError::Decoding(format!("unknown element <{other}>"))),
    }
}

fn single_value(children: Vec<Node>, tag: &str) -> Result<Value> {
    let mut values = children.into_iter();
    match (values.next(), values.next()) {
        (Some(Node::Value(value)), None) => Ok(value),
        _ => Err(ArchiveError::Decoding(format!("<{tag}> must hold exactly one value"))),
    }
}

fn parse_integer(text: &str) -> Result<Integer> {
    let text = text.trim();
    text.parse::<i128>()
        .ok()
        .and_then(|n| Integer::try_from(n).ok())
        .ok_or_else(|| ArchiveError::Decoding(format!("invalid integer {text:?}")))
}

fn parse_float(text: &str) -> Result<f64> {
    let text = text.trim();
    text.parse::<f64>()
        .map_err(|_| ArchiveError::Decoding(format!("invalid float {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: &Value) -> Value {
        let mut buf = Vec::new();
        write_document(value, &mut buf).unwrap();
        read_document(buf.as_slice()).unwrap()
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_roundtrip_nested_values() {
        let value = Value::Map(vec![
            (text("name"), text("Villa")),
            (
                text("walls"),
                Value::Array(vec![
                    Value::Map(vec![(text("x"), Value::Integer(0.into())), (text("y"), Value::Float(-3.5))]),
                    Value::Map(vec![(text("x"), Value::Integer(12.into())), (text("y"), Value::Float(4.0))]),
                ]),
            ),
            (text("camera"), Value::Null),
            (text("visible"), Value::Bool(true)),
            (text("empty"), text("")),
            (text("nested"), Value::Array(vec![Value::Array(vec![]), Value::Map(vec![])])),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_non_finite_floats_are_spelled_out() {
        let value = Value::Array(vec![
            Value::Float(f64::INFINITY),
            Value::Float(f64::NEG_INFINITY),
            Value::Float(f64::NAN),
        ]);
        let mut buf = Vec::new();
        write_document(&value, &mut buf).unwrap();
        let xml = String::from_utf8(buf.clone()).unwrap();
        assert!(xml.contains("<float>inf</float><float>-inf</float><float>NaN</float>"), "{xml}");

        let Value::Array(items) = read_document(buf.as_slice()).unwrap() else {
            panic!("expected a list");
        };
        assert_eq!(items[0], Value::Float(f64::INFINITY));
        assert_eq!(items[1], Value::Float(f64::NEG_INFINITY));
        assert!(matches!(items[2], Value::Float(f) if f.is_nan()));
    }

    #[test]
    fn test_escaping() {
        let value = Value::Map(vec![(text("a<&>\"b"), text("x < y & z > \"w\""))]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_rejects_non_text_keys() {
        let value = Value::Map(vec![(Value::Integer(1.into()), Value::Null)]);
        assert!(write_document(&value, Vec::new()).is_err());
    }

    #[test]
    fn test_rejects_unknown_elements() {
        let doc = br#"<?xml version="1.0"?><home version="1"><wall/></home>"#;
        assert!(read_document(&doc[..]).is_err());
    }

    #[test]
    fn test_rejects_missing_root() {
        assert!(read_document(&b"<?xml version=\"1.0\"?>"[..]).is_err());
    }
}
