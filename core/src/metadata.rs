//! Metadata header encoding and decoding.
//!
//! Every stored script carries a single comment line of the form
//! `# metadata = {"name": ..., "description": ..., "created": ...}`.
//! Decoding is tolerant: it accepts the canonical line, falls back to
//! scanning for scattered quoted fields left behind by older tools, and
//! never fails on malformed input. Only the canonical form is ever written.
//!
//! Pure string processing; no I/O.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifact::Metadata;

/// Marker introducing the canonical header line. Only the first occurrence
/// in a body is honored.
pub const HEADER_MARKER: &str = "# metadata = {";

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""name"\s*:\s*"([^"]+)""#).unwrap_or_else(|_| unreachable!())
});
static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""description"\s*:\s*"([^"]+)""#).unwrap_or_else(|_| unreachable!())
});
static CREATED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""created"\s*:\s*"([^"]+)""#).unwrap_or_else(|_| unreachable!())
});

/// Byte span of the canonical header within a body, marker through the
/// closing brace of its map literal.
fn header_span(body: &str) -> Option<(usize, usize)> {
    let start = body.find(HEADER_MARKER)?;
    let brace = start + HEADER_MARKER.len() - 1;

    // Parse exactly one JSON value starting at the opening brace; the
    // stream deserializer tells us how many bytes it consumed, which
    // handles braces inside quoted field values.
    let mut stream = serde_json::Deserializer::from_str(&body[brace..]).into_iter::<Metadata>();
    if let Some(Ok(_)) = stream.next() {
        return Some((start, brace + stream.byte_offset()));
    }

    // Malformed literal: fall back to the first closing brace, matching
    // the legacy reader.
    let close = body[brace..].find('}')?;
    Some((start, brace + close + 1))
}

/// Decode the metadata embedded in `body`.
///
/// Returns `None` only when neither the canonical line nor the scattered
/// legacy fields yield anything; otherwise a best-effort, possibly partial
/// [`Metadata`]. Never panics on malformed input.
pub fn decode(body: &str) -> Option<Metadata> {
    if let Some(start) = body.find(HEADER_MARKER) {
        let brace = start + HEADER_MARKER.len() - 1;
        let mut stream =
            serde_json::Deserializer::from_str(&body[brace..]).into_iter::<Metadata>();
        if let Some(Ok(meta)) = stream.next() {
            return Some(meta);
        }
    }

    decode_legacy(body)
}

/// Legacy fallback: independently scan the whole body for quoted `name`,
/// `description`, and `created` fields (for example inside a docstring) and
/// assemble whatever subset is present. Missing fields stay empty.
fn decode_legacy(body: &str) -> Option<Metadata> {
    let field = |re: &Regex| {
        re.captures(body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };

    let meta = Metadata {
        name: field(&NAME_RE),
        description: field(&DESCRIPTION_RE),
        created: field(&CREATED_RE),
    };

    if meta.is_empty() { None } else { Some(meta) }
}

/// Encode metadata as the canonical single-line header.
pub fn encode(meta: &Metadata) -> String {
    let literal = serde_json::json!({
        "name": meta.name,
        "description": meta.description,
        "created": meta.created,
    });
    format!("# metadata = {literal}")
}

/// Replace the canonical header in `body` with the encoding of `meta`.
///
/// When no canonical header exists one is appended at the end of the body,
/// so a registry-driven write always leaves a well-formed header behind.
pub fn replace_header(body: &str, meta: &Metadata) -> String {
    match header_span(body) {
        Some((start, end)) => {
            let mut out = String::with_capacity(body.len());
            out.push_str(&body[..start]);
            out.push_str(&encode(meta));
            out.push_str(&body[end..]);
            out
        }
        None => {
            let mut out = body.to_string();
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&encode(meta));
            out.push('\n');
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body_with(meta: &Metadata) -> String {
        format!("def main():\n    pass\n{}\n", encode(meta))
    }

    #[test]
    fn test_roundtrip_canonical() {
        let meta = Metadata {
            name: "Word Counter".to_string(),
            description: "counts words in a file".to_string(),
            created: "2024-01-01 12:00:00".to_string(),
        };
        assert_eq!(decode(&body_with(&meta)), Some(meta));
    }

    #[test]
    fn test_roundtrip_with_braces_and_quotes_in_fields() {
        let meta = Metadata {
            name: "odd {name}".to_string(),
            description: "says \"hi\" and }".to_string(),
            created: "2024-06-01".to_string(),
        };
        assert_eq!(decode(&body_with(&meta)), Some(meta));
    }

    #[test]
    fn test_decode_missing_keys_default_empty() {
        let body = "print('x')\n# metadata = {\"description\": \"only desc\"}\n";
        let meta = decode(body).unwrap();
        assert_eq!(meta.name, "");
        assert_eq!(meta.description, "only desc");
        assert_eq!(meta.created, "");
    }

    #[test]
    fn test_decode_legacy_scattered_fields() {
        let body = concat!(
            "def main():\n",
            "    \"\"\"\n",
            "    \"name\": \"legacy tool\"\n",
            "    \"created\": \"2023-05-05\"\n",
            "    \"\"\"\n",
        );
        let meta = decode(body).unwrap();
        assert_eq!(meta.name, "legacy tool");
        assert_eq!(meta.description, "");
        assert_eq!(meta.created, "2023-05-05");
    }

    #[test]
    fn test_decode_none_without_any_fields() {
        assert_eq!(decode("print('no header here')\n"), None);
        assert_eq!(decode(""), None);
    }

    #[test]
    fn test_decode_malformed_canonical_falls_back() {
        let body = "# metadata = {not json}\n\"description\": \"rescued\"\n";
        let meta = decode(body).unwrap();
        assert_eq!(meta.description, "rescued");
    }

    #[test]
    fn test_first_marker_wins() {
        let body = concat!(
            "# metadata = {\"name\": \"first\"}\n",
            "# metadata = {\"name\": \"second\"}\n",
        );
        assert_eq!(decode(body).unwrap().name, "first");
    }

    #[test]
    fn test_replace_header_preserves_surrounding_text() {
        let before = "code above\n# metadata = {\"name\": \"old\", \"description\": \"d\", \"created\": \"c\"}\ncode below\n";
        let meta = Metadata {
            name: "new".to_string(),
            description: "d2".to_string(),
            created: "c".to_string(),
        };
        let after = replace_header(before, &meta);
        assert!(after.starts_with("code above\n"));
        assert!(after.ends_with("\ncode below\n"));
        assert_eq!(decode(&after), Some(meta));
    }

    #[test]
    fn test_replace_header_appends_when_missing() {
        let meta = Metadata::new("appended", "desc");
        let after = replace_header("print('bare script')", &meta);
        assert!(after.starts_with("print('bare script')\n"));
        assert_eq!(decode(&after), Some(meta));
    }
}
