//! Tolerant incremental decoder for streamed JSON objects.
//!
//! The decoder is fed raw text deltas of a single JSON object whose top-level
//! fields are known in advance. After every delta it reports how far each
//! tracked field has progressed:
//!
//! - text fields grow as characters arrive (escapes are decoded, an escape
//!   split across deltas is held back until complete);
//! - array-of-object fields emit an element only once its closing `}` has
//!   been read.
//!
//! Values only ever grow. Malformed input stops further extraction without
//! retracting anything already reported. The decoder is a latency aid, the
//! provider's completed result is the source of truth.

use serde_json::Value;
use std::collections::HashMap;

/// Which top-level fields to track.
#[derive(Debug, Clone, Default)]
pub struct DecoderSchema {
    text_fields: Vec<String>,
    array_fields: Vec<String>,
}

impl DecoderSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text_field(mut self, name: impl Into<String>) -> Self {
        self.text_fields.push(name.into());
        self
    }

    pub fn array_field(mut self, name: impl Into<String>) -> Self {
        self.array_fields.push(name.into());
        self
    }
}

/// Progress reported by [`IncrementalDecoder::push`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// The text field grew; `value` is the whole decoded prefix so far.
    Text { field: String, value: String },
    /// A complete element was appended to an array field.
    Element {
        field: String,
        index: usize,
        value: Value,
    },
}

#[derive(Debug, Default)]
struct TextField {
    value: String,
    emitted_len: usize,
    started: bool,
    complete: bool,
}

#[derive(Debug, Default)]
struct ArrayField {
    elements: Vec<Value>,
    started: bool,
    complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// Object: key or `}`
    KeyOrClose,
    /// Object: key after a comma
    Key,
    Colon,
    /// Value (object member or array item after a comma)
    Value,
    /// Array: value or `]`
    ValueOrClose,
    CommaOrClose,
}

#[derive(Debug)]
enum FrameKind {
    Object {
        key: Option<String>,
        /// Byte offset of `{` when this object is an element of a tracked array
        element_of: Option<(String, usize)>,
    },
    Array {
        field: Option<String>,
    },
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    expect: Expect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Backslash,
    Unicode { code: u32, digits: u8 },
}

#[derive(Debug)]
enum Lex {
    /// Between tokens
    Structural,
    String {
        is_key: bool,
        /// Tracked text field receiving the characters
        target: Option<String>,
        buf: String,
        escape: Escape,
        high_surrogate: Option<u32>,
    },
    /// Number, `true`, `false` or `null`
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Consumed,
    /// The character ended a literal and must be read again as structure
    Reprocess,
}

/// Incremental, order-independent field extractor.
#[derive(Debug)]
pub struct IncrementalDecoder {
    raw: String,
    stack: Vec<Frame>,
    lex: Lex,
    root_closed: bool,
    poisoned: bool,
    texts: HashMap<String, TextField>,
    arrays: HashMap<String, ArrayField>,
    text_order: Vec<String>,
}

impl IncrementalDecoder {
    pub fn new(schema: DecoderSchema) -> Self {
        let texts = schema
            .text_fields
            .iter()
            .map(|name| (name.clone(), TextField::default()))
            .collect();
        let arrays = schema
            .array_fields
            .iter()
            .map(|name| (name.clone(), ArrayField::default()))
            .collect();
        Self {
            raw: String::new(),
            stack: Vec::new(),
            lex: Lex::Structural,
            root_closed: false,
            poisoned: false,
            texts,
            arrays,
            text_order: schema.text_fields,
        }
    }

    /// Feeds one delta and returns what grew because of it.
    ///
    /// Text updates come first in schema order, followed by any elements
    /// completed by this delta in the order they closed.
    pub fn push(&mut self, delta: &str) -> Vec<FieldUpdate> {
        let base = self.raw.len();
        self.raw.push_str(delta);

        let mut updates = Vec::new();
        let mut elements = Vec::new();
        for (offset, ch) in delta.char_indices() {
            if self.poisoned {
                break;
            }
            while self.feed(ch, base + offset, &mut elements) == Outcome::Reprocess {}
        }

        for name in &self.text_order {
            if let Some(field) = self.texts.get_mut(name) {
                if field.value.len() > field.emitted_len {
                    field.emitted_len = field.value.len();
                    updates.push(FieldUpdate::Text {
                        field: name.clone(),
                        value: field.value.clone(),
                    });
                }
            }
        }
        updates.extend(elements);
        updates
    }

    /// Decoded prefix of a text field, `None` until its value has started.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.texts
            .get(field)
            .filter(|f| f.started)
            .map(|f| f.value.as_str())
    }

    /// True once the closing quote of a text field has been read.
    pub fn is_text_complete(&self, field: &str) -> bool {
        self.texts.get(field).is_some_and(|f| f.complete)
    }

    /// Complete elements of an array field so far.
    pub fn elements(&self, field: &str) -> &[Value] {
        self.arrays
            .get(field)
            .map(|f| f.elements.as_slice())
            .unwrap_or_default()
    }

    pub fn is_array_complete(&self, field: &str) -> bool {
        self.arrays.get(field).is_some_and(|f| f.complete)
    }

    /// True once input stopped making sense; nothing further is extracted.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Everything received so far.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    // ========================================================================
    // State machine
    // ========================================================================

    fn feed(&mut self, ch: char, pos: usize, elements: &mut Vec<FieldUpdate>) -> Outcome {
        match self.lex {
            Lex::String { .. } => {
                self.feed_string(ch);
                Outcome::Consumed
            }
            Lex::Literal => {
                if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '+' | '-') {
                    Outcome::Consumed
                } else {
                    self.lex = Lex::Structural;
                    self.value_done();
                    Outcome::Reprocess
                }
            }
            Lex::Structural => {
                self.feed_structural(ch, pos, elements);
                Outcome::Consumed
            }
        }
    }

    fn feed_structural(&mut self, ch: char, pos: usize, elements: &mut Vec<FieldUpdate>) {
        if ch.is_whitespace() {
            return;
        }

        let Some(frame) = self.stack.last_mut() else {
            if ch == '{' && !self.root_closed {
                self.stack.push(Frame {
                    kind: FrameKind::Object {
                        key: None,
                        element_of: None,
                    },
                    expect: Expect::KeyOrClose,
                });
            } else {
                self.poisoned = true;
            }
            return;
        };

        match (frame.expect, ch) {
            (Expect::KeyOrClose | Expect::Key, '"') => {
                self.lex = Lex::String {
                    is_key: true,
                    target: None,
                    buf: String::new(),
                    escape: Escape::None,
                    high_surrogate: None,
                };
            }
            (Expect::Colon, ':') => frame.expect = Expect::Value,
            (Expect::CommaOrClose, ',') => {
                frame.expect = match frame.kind {
                    FrameKind::Object { .. } => Expect::Key,
                    FrameKind::Array { .. } => Expect::Value,
                };
            }
            (Expect::KeyOrClose | Expect::Key | Expect::CommaOrClose, '}')
                if matches!(frame.kind, FrameKind::Object { .. }) =>
            {
                self.close_frame(pos, elements);
            }
            (Expect::ValueOrClose | Expect::Value | Expect::CommaOrClose, ']')
                if matches!(frame.kind, FrameKind::Array { .. }) =>
            {
                self.close_frame(pos, elements);
            }
            (Expect::Value | Expect::ValueOrClose, _) => self.start_value(ch, pos),
            _ => self.poisoned = true,
        }
    }

    /// Key of the root object member currently being read, if the cursor is
    /// directly inside the root object.
    fn root_member_key(&self) -> Option<&str> {
        if self.stack.len() != 1 {
            return None;
        }
        match &self.stack[0].kind {
            FrameKind::Object { key, .. } => key.as_deref(),
            FrameKind::Array { .. } => None,
        }
    }

    fn start_value(&mut self, ch: char, pos: usize) {
        let root_key = self.root_member_key().map(str::to_owned);
        match ch {
            '"' => {
                let target = root_key.filter(|key| {
                    self.texts.get_mut(key).is_some_and(|field| {
                        let fresh = !field.started;
                        field.started = true;
                        fresh
                    })
                });
                self.lex = Lex::String {
                    is_key: false,
                    target,
                    buf: String::new(),
                    escape: Escape::None,
                    high_surrogate: None,
                };
            }
            '{' => {
                let element_of = match self.stack.last().map(|f| &f.kind) {
                    Some(FrameKind::Array { field: Some(field) }) => Some((field.clone(), pos)),
                    _ => None,
                };
                self.stack.push(Frame {
                    kind: FrameKind::Object {
                        key: None,
                        element_of,
                    },
                    expect: Expect::KeyOrClose,
                });
            }
            '[' => {
                let field = root_key.filter(|key| {
                    self.arrays.get_mut(key).is_some_and(|field| {
                        let fresh = !field.started;
                        field.started = true;
                        fresh
                    })
                });
                self.stack.push(Frame {
                    kind: FrameKind::Array { field },
                    expect: Expect::ValueOrClose,
                });
            }
            '-' | '0'..='9' | 't' | 'f' | 'n' => self.lex = Lex::Literal,
            _ => self.poisoned = true,
        }
    }

    fn close_frame(&mut self, pos: usize, elements: &mut Vec<FieldUpdate>) {
        let Some(frame) = self.stack.pop() else {
            self.poisoned = true;
            return;
        };

        match frame.kind {
            FrameKind::Object {
                element_of: Some((field, start)),
                ..
            } => {
                // `}` is one byte, so the element spans start..=pos.
                if let Ok(value) = serde_json::from_str::<Value>(&self.raw[start..=pos]) {
                    if let Some(array) = self.arrays.get_mut(&field) {
                        array.elements.push(value.clone());
                        elements.push(FieldUpdate::Element {
                            field,
                            index: array.elements.len() - 1,
                            value,
                        });
                    }
                }
            }
            FrameKind::Array { field: Some(field) } => {
                if let Some(array) = self.arrays.get_mut(&field) {
                    array.complete = true;
                }
            }
            _ => {}
        }

        if self.stack.is_empty() {
            self.root_closed = true;
        } else {
            self.value_done();
        }
    }

    /// Marks the current value of the innermost frame as finished.
    fn value_done(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.expect = Expect::CommaOrClose;
            if let FrameKind::Object { key, .. } = &mut frame.kind {
                *key = None;
            }
        }
    }

    fn feed_string(&mut self, ch: char) {
        let Lex::String {
            is_key,
            target,
            buf,
            escape,
            high_surrogate,
        } = &mut self.lex
        else {
            return;
        };

        let decoded = match *escape {
            Escape::None => match ch {
                '"' => {
                    if high_surrogate.take().is_some() {
                        emit(&mut self.texts, target, buf, char::REPLACEMENT_CHARACTER);
                    }
                    let is_key = *is_key;
                    let key = std::mem::take(buf);
                    let target = target.take();
                    self.lex = Lex::Structural;
                    self.string_done(is_key, key, target);
                    return;
                }
                '\\' => {
                    *escape = Escape::Backslash;
                    return;
                }
                other => Some(other),
            },
            Escape::Backslash => {
                *escape = Escape::None;
                match ch {
                    '"' => Some('"'),
                    '\\' => Some('\\'),
                    '/' => Some('/'),
                    'b' => Some('\u{0008}'),
                    'f' => Some('\u{000C}'),
                    'n' => Some('\n'),
                    'r' => Some('\r'),
                    't' => Some('\t'),
                    'u' => {
                        *escape = Escape::Unicode { code: 0, digits: 0 };
                        return;
                    }
                    _ => {
                        self.poisoned = true;
                        return;
                    }
                }
            }
            Escape::Unicode { code, digits } => {
                let Some(digit) = ch.to_digit(16) else {
                    self.poisoned = true;
                    return;
                };
                let code = code * 16 + digit;
                if digits < 3 {
                    *escape = Escape::Unicode {
                        code,
                        digits: digits + 1,
                    };
                    return;
                }
                *escape = Escape::None;

                let combined = match (high_surrogate.take(), code) {
                    (None, 0xD800..=0xDBFF) => {
                        *high_surrogate = Some(code);
                        return;
                    }
                    (Some(high), 0xDC00..=0xDFFF) => {
                        char::from_u32(0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00))
                    }
                    (Some(_), 0xD800..=0xDBFF) => {
                        emit(&mut self.texts, target, buf, char::REPLACEMENT_CHARACTER);
                        *high_surrogate = Some(code);
                        return;
                    }
                    (Some(_), _) => {
                        emit(&mut self.texts, target, buf, char::REPLACEMENT_CHARACTER);
                        char::from_u32(code)
                    }
                    (None, _) => char::from_u32(code),
                };
                combined.or(Some(char::REPLACEMENT_CHARACTER))
            }
        };

        if let Some(decoded) = decoded {
            if high_surrogate.take().is_some() {
                emit(&mut self.texts, target, buf, char::REPLACEMENT_CHARACTER);
            }
            emit(&mut self.texts, target, buf, decoded);
        }
    }

    fn string_done(&mut self, is_key: bool, text: String, target: Option<String>) {
        if is_key {
            match self.stack.last_mut() {
                Some(Frame {
                    kind: FrameKind::Object { key, .. },
                    expect,
                }) => {
                    *key = Some(text);
                    *expect = Expect::Colon;
                }
                _ => self.poisoned = true,
            }
            return;
        }

        if let Some(field) = target.and_then(|name| self.texts.get_mut(&name)) {
            field.complete = true;
        }
        self.value_done();
    }
}

/// Appends a decoded character to the tracked field, or to the key buffer
/// when the string is not tracked.
fn emit(
    texts: &mut HashMap<String, TextField>,
    target: &Option<String>,
    buf: &mut String,
    ch: char,
) {
    match target.as_ref().and_then(|name| texts.get_mut(name)) {
        Some(field) => field.value.push(ch),
        None => buf.push(ch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn narrative_decoder() -> IncrementalDecoder {
        IncrementalDecoder::new(
            DecoderSchema::new()
                .text_field("headline")
                .text_field("narration")
                .array_field("agentStateUpdates"),
        )
    }

    fn texts(updates: &[FieldUpdate], wanted: &str) -> Vec<String> {
        updates
            .iter()
            .filter_map(|update| match update {
                FieldUpdate::Text { field, value } if field == wanted => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_text_grows_across_deltas() {
        let mut decoder = narrative_decoder();
        assert!(decoder.push(r#"{"head"#).is_empty());
        assert!(decoder.text("headline").is_none());

        let updates = decoder.push(r#"line": "War"#);
        assert_eq!(texts(&updates, "headline"), vec!["War"]);

        let updates = decoder.push(r#" begins", "narr"#);
        assert_eq!(texts(&updates, "headline"), vec!["War begins"]);
        assert!(decoder.is_text_complete("headline"));
        assert!(!decoder.is_text_complete("narration"));
    }

    #[test]
    fn test_split_escape_is_held_back() {
        let mut decoder = narrative_decoder();
        decoder.push(r#"{"narration": "He said \"#);
        assert_eq!(decoder.text("narration"), Some("He said "));

        let updates = decoder.push(r#""no\"\nthen left"#);
        assert_eq!(texts(&updates, "narration"), vec!["He said \"no\"\nthen left"]);
    }

    #[test]
    fn test_unicode_escapes_and_surrogates() {
        let mut decoder = narrative_decoder();
        decoder.push(r#"{"headline": "café \ud83d"#);
        assert_eq!(decoder.text("headline"), Some("café "));
        decoder.push(r#"\ude00!""#);
        assert_eq!(decoder.text("headline"), Some("café 😀!"));
    }

    #[test]
    fn test_field_order_is_irrelevant() {
        let mut decoder = narrative_decoder();
        decoder.push(r#"{"agentStateUpdates": [], "narration": "N", "headline": "H"}"#);
        assert_eq!(decoder.text("headline"), Some("H"));
        assert_eq!(decoder.text("narration"), Some("N"));
        assert!(decoder.is_array_complete("agentStateUpdates"));
    }

    #[test]
    fn test_nested_keys_with_tracked_names_are_ignored() {
        let mut decoder = narrative_decoder();
        decoder.push(r#"{"meta": {"headline": "wrong"}, "headline": "right"}"#);
        assert_eq!(decoder.text("headline"), Some("right"));
    }

    #[test]
    fn test_element_emitted_only_after_closing_brace() {
        let mut decoder = narrative_decoder();
        let updates = decoder.push(r#"{"agentStateUpdates": [{"agentId": "A", "newState": "ri"#);
        assert!(updates.is_empty());
        assert!(decoder.elements("agentStateUpdates").is_empty());

        let updates = decoder.push(r#"ch"}, {"agentId": "B""#);
        assert_eq!(
            updates,
            vec![FieldUpdate::Element {
                field: "agentStateUpdates".into(),
                index: 0,
                value: json!({"agentId": "A", "newState": "rich"}),
            }]
        );

        decoder.push(r#", "newState": "poor"}]}"#);
        assert_eq!(decoder.elements("agentStateUpdates").len(), 2);
        assert!(decoder.is_array_complete("agentStateUpdates"));
    }

    #[test]
    fn test_braces_inside_strings_do_not_close_elements() {
        let mut decoder = narrative_decoder();
        let updates =
            decoder.push(r#"{"agentStateUpdates": [{"agentId": "A", "newState": "uses } and ]"#);
        assert!(updates.is_empty());
        decoder.push(r#""}]}"#);
        assert_eq!(
            decoder.elements("agentStateUpdates")[0]["newState"],
            "uses } and ]"
        );
    }

    #[test]
    fn test_literals_and_nested_values_are_skipped() {
        let mut decoder = narrative_decoder();
        decoder.push(r#"{"score": -1.5e3, "ok": true, "tags": ["a", {"b": null}], "headline": "H"}"#);
        assert_eq!(decoder.text("headline"), Some("H"));
        assert!(!decoder.is_poisoned());
    }

    #[test]
    fn test_malformed_input_keeps_reported_prefix() {
        let mut decoder = narrative_decoder();
        decoder.push(r#"{"headline": "Half"#);
        decoder.push(r#"", "narration" = "broken"#);
        assert!(decoder.is_poisoned());
        assert_eq!(decoder.text("headline"), Some("Half"));
        assert!(decoder.text("narration").is_none());
        assert!(decoder.push(r#" more "#).is_empty());
    }

    #[test]
    fn test_non_object_input_yields_nothing() {
        let mut decoder = narrative_decoder();
        assert!(decoder.push("Sorry, I cannot").is_empty());
        assert!(decoder.is_poisoned());
    }

    #[test]
    fn test_duplicate_field_does_not_roll_back() {
        let mut decoder = narrative_decoder();
        decoder.push(r#"{"headline": "First and longer", "headline": "x"}"#);
        assert_eq!(decoder.text("headline"), Some("First and longer"));
    }
}
