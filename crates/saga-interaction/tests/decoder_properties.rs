use proptest::prelude::*;
use saga_interaction::decoder::{DecoderSchema, FieldUpdate, IncrementalDecoder};
use serde_json::{Value, json};

fn schema() -> DecoderSchema {
    DecoderSchema::new()
        .text_field("headline")
        .text_field("narration")
        .array_field("agentStateUpdates")
}

/// Splits `text` at the given char positions.
fn chunk(text: &str, cuts: &[usize]) -> Vec<String> {
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let mut points: Vec<usize> = cuts
        .iter()
        .map(|cut| boundaries[cut % boundaries.len()])
        .collect();
    points.push(0);
    points.push(text.len());
    points.sort_unstable();
    points.dedup();
    points
        .windows(2)
        .map(|w| text[w[0]..w[1]].to_string())
        .collect()
}

/// JSON written token by token with generated whitespace between tokens.
struct Layout<'a> {
    out: String,
    gaps: std::iter::Cycle<std::slice::Iter<'a, String>>,
}

impl<'a> Layout<'a> {
    fn new(gaps: &'a [String]) -> Self {
        let mut layout = Self {
            out: String::new(),
            gaps: gaps.iter().cycle(),
        };
        layout.gap();
        layout
    }

    fn gap(&mut self) {
        if let Some(gap) = self.gaps.next() {
            self.out.push_str(gap);
        }
    }

    fn token(&mut self, token: &str) {
        self.out.push_str(token);
        self.gap();
    }

    fn string(&mut self, value: &str) {
        self.token(&serde_json::to_string(value).unwrap());
    }

    fn key(&mut self, key: &str) {
        self.string(key);
        self.token(":");
    }
}

/// A narrative document with members in `order` and an unrelated member
/// whose nested keys shadow the tracked ones.
///
/// Returns the text and, per update, the byte offset just past its `}`.
fn document(
    headline: &str,
    narration: &str,
    updates: &[(String, String)],
    order: &[usize],
    gaps: &[String],
) -> (String, Vec<usize>) {
    let mut doc = Layout::new(gaps);
    let mut element_ends = Vec::new();
    doc.token("{");
    for (position, member) in order.iter().enumerate() {
        if position > 0 {
            doc.token(",");
        }
        match *member {
            0 => {
                doc.key("headline");
                doc.string(headline);
            }
            1 => {
                doc.key("narration");
                doc.string(narration);
            }
            2 => {
                doc.key("agentStateUpdates");
                doc.token("[");
                for (index, (id, state)) in updates.iter().enumerate() {
                    if index > 0 {
                        doc.token(",");
                    }
                    doc.token("{");
                    doc.key("agentId");
                    doc.string(id);
                    doc.token(",");
                    doc.key("newState");
                    doc.string(state);
                    doc.out.push('}');
                    element_ends.push(doc.out.len());
                    doc.gap();
                }
                doc.token("]");
            }
            _ => {
                doc.key("aside");
                doc.token("{");
                doc.key("headline");
                doc.string("not this one");
                doc.token(",");
                doc.key("weight");
                doc.token("12.5");
                doc.token("}");
            }
        }
    }
    doc.token("}");
    (doc.out, element_ends)
}

fn member_order() -> impl Strategy<Value = Vec<usize>> {
    Just(vec![0, 1, 2, 3]).prop_shuffle()
}

fn whitespace() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[ \\t\\r\\n]{0,4}", 1..16)
}

#[test]
fn pretty_printed_document_decodes() {
    let text = serde_json::to_string_pretty(&json!({
        "agentStateUpdates": [{"agentId": "A", "newState": "owns the harbour"}],
        "narration": "The guild moved before dawn.",
        "headline": "Guild Seizes Harbour"
    }))
    .unwrap();
    let mut decoder = IncrementalDecoder::new(schema());
    for piece in chunk(&text, &[3, 17, 40, 41, 90]) {
        decoder.push(&piece);
    }

    assert!(!decoder.is_poisoned());
    assert_eq!(decoder.text("headline"), Some("Guild Seizes Harbour"));
    assert_eq!(decoder.text("narration"), Some("The guild moved before dawn."));
    assert_eq!(decoder.elements("agentStateUpdates").len(), 1);
    assert!(decoder.is_array_complete("agentStateUpdates"));
}

proptest! {
    #[test]
    fn property_text_prefixes_grow_and_converge(
        headline in any::<String>(),
        narration in any::<String>(),
        updates in prop::collection::vec((any::<String>(), any::<String>()), 0..4),
        order in member_order(),
        gaps in whitespace(),
        cuts in prop::collection::vec(any::<usize>(), 0..24),
    ) {
        let (text, _) = document(&headline, &narration, &updates, &order, &gaps);
        let mut decoder = IncrementalDecoder::new(schema());
        let mut last_headline = String::new();
        let mut last_narration = String::new();

        for piece in chunk(&text, &cuts) {
            for update in decoder.push(&piece) {
                if let FieldUpdate::Text { field, value } = update {
                    let last = if field == "headline" { &mut last_headline } else { &mut last_narration };
                    prop_assert!(value.len() > last.len());
                    prop_assert!(value.starts_with(last.as_str()));
                    *last = value;
                }
            }
        }

        prop_assert!(!decoder.is_poisoned());
        prop_assert_eq!(decoder.text("headline"), Some(headline.as_str()));
        prop_assert_eq!(decoder.text("narration"), Some(narration.as_str()));
        prop_assert!(decoder.is_text_complete("headline"));
        prop_assert!(decoder.is_text_complete("narration"));
        prop_assert_eq!(decoder.elements("agentStateUpdates").len(), updates.len());
    }

    #[test]
    fn property_elements_never_precede_their_closing_brace(
        updates in prop::collection::vec(("[a-zA-Z0-9-]{1,12}", any::<String>()), 1..5),
        order in member_order(),
        gaps in whitespace(),
        cuts in prop::collection::vec(any::<usize>(), 0..32),
    ) {
        let (text, element_ends) = document("h", "n", &updates, &order, &gaps);
        let mut decoder = IncrementalDecoder::new(schema());
        let mut received = 0;

        for piece in chunk(&text, &cuts) {
            received += piece.len();
            for update in decoder.push(&piece) {
                if let FieldUpdate::Element { index, .. } = update {
                    prop_assert!(received >= element_ends[index]);
                }
            }
        }

        let expected: Vec<Value> = updates
            .iter()
            .map(|(id, state)| json!({"agentId": id, "newState": state}))
            .collect();
        prop_assert_eq!(decoder.elements("agentStateUpdates"), expected.as_slice());
        prop_assert!(decoder.is_array_complete("agentStateUpdates"));
    }
}
