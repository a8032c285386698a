//! Reading and writing the XML property list form.
//!
//! Only the plist DTD subset is understood: `plist`, `dict`, `key`,
//! `array`, `string`, `integer`, `real`, `true`, `false`, `data` and
//! `date`. That subset needs no general XML machinery, so the tokenizer is
//! a small hand-rolled cursor; processing instructions, doctype and
//! comments are skipped, attributes are ignored.
//!
//! XML archives carry their references as `{"CF$UID": n}` records; callers
//! run [`crate::uid::normalize`] on the parsed tree before resolving.

use crate::error::{Result, UnkeyedError};
use crate::value::{apple_date_to_rfc3339, rfc3339_to_apple_date, Plain, Value};

/// Heuristic check for XML input.
pub fn is_xml(data: &[u8]) -> bool {
    let trimmed = skip_leading(data);
    trimmed.starts_with(b"<?xml")
        || trimmed.starts_with(b"<!DOCTYPE")
        || trimmed.starts_with(b"<plist")
}

fn skip_leading(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(b"\xef\xbb\xbf").unwrap_or(data);
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

/// Parses an XML property list into a raw value tree.
pub fn parse(data: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(data)
        .map_err(|e| UnkeyedError::Format(format!("input is neither bplist00 nor UTF-8: {e}")))?;
    let mut parser = Parser { src: text, pos: 0 };
    parser.skip_misc();
    let plist = parser.open_tag()?;
    if plist.name != "plist" {
        return Err(UnkeyedError::Format(format!(
            "expected <plist>, found <{}>",
            plist.name
        )));
    }
    if plist.self_closing {
        return Err(UnkeyedError::Format("empty <plist/>".into()));
    }
    let value = parser.value()?;
    parser.skip_misc();
    parser.close_tag("plist")?;
    Ok(value)
}

struct Tag<'a> {
    name: &'a str,
    self_closing: bool,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    /// Skips whitespace, the XML declaration, doctype and comments.
    fn skip_misc(&mut self) {
        loop {
            self.skip_ws();
            let rest = self.rest();
            let skip_to = if rest.starts_with("<?") {
                rest.find("?>").map(|i| i + 2)
            } else if rest.starts_with("<!--") {
                rest.find("-->").map(|i| i + 3)
            } else if rest.starts_with("<!") {
                rest.find('>').map(|i| i + 1)
            } else {
                None
            };
            match skip_to {
                Some(len) => self.pos += len,
                None => return,
            }
        }
    }

    fn at_closing_tag(&self) -> bool {
        self.rest().starts_with("</")
    }

    fn open_tag(&mut self) -> Result<Tag<'a>> {
        if !self.rest().starts_with('<') {
            return Err(self.fail("expected an element"));
        }
        self.pos += 1;
        let rest = self.rest();
        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .ok_or_else(|| self.fail("unterminated tag"))?;
        let name = &rest[..name_len];
        if name.is_empty() {
            return Err(self.fail("empty tag name"));
        }
        self.pos += name_len;
        // Attributes (e.g. plist version) are skipped, not interpreted.
        let rest = self.rest();
        let close = rest
            .find('>')
            .ok_or_else(|| self.fail("unterminated tag"))?;
        let self_closing = rest[..close].ends_with('/');
        self.pos += close + 1;
        Ok(Tag { name, self_closing })
    }

    fn close_tag(&mut self, name: &str) -> Result<()> {
        self.skip_ws();
        let rest = self.rest();
        if let Some(after) = rest.strip_prefix("</") {
            if let Some(after) = after.strip_prefix(name) {
                let trimmed = after.trim_start();
                if let Some(after) = trimmed.strip_prefix('>') {
                    self.pos = self.src.len() - after.len();
                    return Ok(());
                }
            }
        }
        Err(self.fail(&format!("expected </{name}>")))
    }

    /// Consumes character data up to the next `<`.
    fn text(&mut self) -> Result<String> {
        let rest = self.rest();
        let len = rest.find('<').ok_or_else(|| self.fail("unterminated text"))?;
        self.pos += len;
        unescape(&rest[..len])
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_misc();
        let tag = self.open_tag()?;
        match tag.name {
            "dict" => {
                if tag.self_closing {
                    return Ok(Value::Dict(Vec::new()));
                }
                let mut entries = Vec::new();
                loop {
                    self.skip_misc();
                    if self.at_closing_tag() {
                        self.close_tag("dict")?;
                        return Ok(Value::Dict(entries));
                    }
                    let key_tag = self.open_tag()?;
                    if key_tag.name != "key" {
                        return Err(self.fail(&format!(
                            "expected <key>, found <{}>",
                            key_tag.name
                        )));
                    }
                    let key = if key_tag.self_closing {
                        String::new()
                    } else {
                        let key = self.text()?;
                        self.close_tag("key")?;
                        key
                    };
                    let value = self.value()?;
                    entries.push((Value::Text(key), value));
                }
            }
            "array" => {
                if tag.self_closing {
                    return Ok(Value::Array(Vec::new()));
                }
                let mut items = Vec::new();
                loop {
                    self.skip_misc();
                    if self.at_closing_tag() {
                        self.close_tag("array")?;
                        return Ok(Value::Array(items));
                    }
                    items.push(self.value()?);
                }
            }
            "string" => self.scalar(tag, "string", |text| Ok(Value::Text(text.to_string()))),
            "integer" => self.scalar(tag, "integer", |text| {
                text.trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|e| UnkeyedError::Format(format!("bad <integer> {text:?}: {e}")))
            }),
            "real" => self.scalar(tag, "real", |text| {
                text.trim()
                    .parse::<f64>()
                    .map(Value::Real)
                    .map_err(|e| UnkeyedError::Format(format!("bad <real> {text:?}: {e}")))
            }),
            "data" => self.scalar(tag, "data", |text| {
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                base64::decode(compact)
                    .map(Value::Bytes)
                    .map_err(|e| UnkeyedError::Format(format!("bad <data> payload: {e}")))
            }),
            "date" => self.scalar(tag, "date", |text| {
                rfc3339_to_apple_date(text.trim())
                    .map(Value::Date)
                    .ok_or_else(|| UnkeyedError::Format(format!("bad <date> {text:?}")))
            }),
            "true" => self.empty(tag, "true", Value::Bool(true)),
            "false" => self.empty(tag, "false", Value::Bool(false)),
            other => Err(self.fail(&format!("unexpected element <{other}>"))),
        }
    }

    fn scalar<F>(&mut self, tag: Tag<'_>, name: &str, build: F) -> Result<Value>
    where
        F: FnOnce(&str) -> Result<Value>,
    {
        if tag.self_closing {
            return build("");
        }
        let text = self.text()?;
        self.close_tag(name)?;
        build(&text)
    }

    fn empty(&mut self, tag: Tag<'_>, name: &str, value: Value) -> Result<Value> {
        if !tag.self_closing {
            self.close_tag(name)?;
        }
        Ok(value)
    }

    fn fail(&self, message: &str) -> UnkeyedError {
        let line = self.src[..self.pos].lines().count().max(1);
        UnkeyedError::Format(format!("XML plist, line {line}: {message}"))
    }
}

fn unescape(text: &str) -> Result<String> {
    if !text.contains('&') {
        return Ok(text.to_string());
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let entity_rest = &rest[amp + 1..];
        let semi = entity_rest
            .find(';')
            .ok_or_else(|| UnkeyedError::Format("unterminated XML entity".into()))?;
        let entity = &entity_rest[..semi];
        match entity {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "apos" => out.push('\''),
            "quot" => out.push('"'),
            _ => {
                let code = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>()));
                match code.and_then(|r| r.ok()).and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => {
                        return Err(UnkeyedError::Format(format!("unknown XML entity &{entity};")))
                    }
                }
            }
        }
        rest = &entity_rest[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Serializes a resolved document as an XML property list.
///
/// Null values become empty strings here; XML plists cannot express null at
/// all, so this writer is lenient by construction.
pub fn write(root: &Plain) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \
         \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n",
    );
    write_value(&mut out, root, 0);
    out.push_str("</plist>\n");
    out
}

fn write_value(out: &mut String, value: &Plain, depth: usize) {
    let pad = "\t".repeat(depth);
    match value {
        Plain::Null => push_line(out, &pad, "<string/>"),
        Plain::Bool(true) => push_line(out, &pad, "<true/>"),
        Plain::Bool(false) => push_line(out, &pad, "<false/>"),
        Plain::Int(n) => push_line(out, &pad, &format!("<integer>{n}</integer>")),
        Plain::Real(r) => push_line(out, &pad, &format!("<real>{r}</real>")),
        Plain::Date(d) => push_line(
            out,
            &pad,
            &format!("<date>{}</date>", apple_date_to_rfc3339(*d)),
        ),
        Plain::Text(s) => {
            if s.is_empty() {
                push_line(out, &pad, "<string/>");
            } else {
                push_line(out, &pad, &format!("<string>{}</string>", escape(s)));
            }
        }
        Plain::Bytes(b) => push_line(out, &pad, &format!("<data>{}</data>", base64::encode(b))),
        Plain::Array(items) => {
            if items.is_empty() {
                push_line(out, &pad, "<array/>");
                return;
            }
            push_line(out, &pad, "<array>");
            for item in items {
                write_value(out, item, depth + 1);
            }
            push_line(out, &pad, "</array>");
        }
        Plain::Dict(entries) => {
            if entries.is_empty() {
                push_line(out, &pad, "<dict/>");
                return;
            }
            push_line(out, &pad, "<dict>");
            for (key, val) in entries {
                push_line(out, &"\t".repeat(depth + 1), &format!("<key>{}</key>", escape(key)));
                write_value(out, val, depth + 1);
            }
            push_line(out, &pad, "</dict>");
        }
    }
}

fn push_line(out: &mut String, pad: &str, line: &str) {
    out.push_str(pad);
    out.push_str(line);
    out.push('\n');
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}
