/// Result of looking for an inline block delimited by an open and close marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan<'a> {
    /// The open marker does not occur in the document.
    NoOpen,
    /// The open marker occurs but no close marker follows it.
    Unterminated,
    /// Text strictly between the first open marker and the next close marker.
    Found(&'a str),
}

impl<'a> Scan<'a> {
    pub fn found(self) -> Option<&'a str> {
        match self {
            Scan::Found(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Locate the first `open` marker in `document` and return what sits between it and
/// the following `close` marker. Markers are matched byte-for-byte.
pub fn between<'a>(document: &'a str, open: &str, close: &str) -> Scan<'a> {
    let Some(start) = document.find(open) else {
        return Scan::NoOpen;
    };
    let start = start + open.len();

    match document[start..].find(close) {
        Some(len) => Scan::Found(&document[start..start + len]),
        None => Scan::Unterminated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: &str = r#"<script id="SIGI_STATE" type="application/json">"#;

    #[test]
    fn returns_interior_of_first_block() {
        let doc = format!("<html>{OPEN}{{\"a\":1}}</script><script>x</script></html>");
        assert_eq!(between(&doc, OPEN, "</script>"), Scan::Found("{\"a\":1}"));
    }

    #[test]
    fn missing_open_marker() {
        let doc = "<html><script>{}</script></html>";
        assert_eq!(between(doc, OPEN, "</script>"), Scan::NoOpen);
    }

    #[test]
    fn close_marker_before_open_does_not_count() {
        let doc = format!("</script>{OPEN}{{}}");
        assert_eq!(between(&doc, OPEN, "</script>"), Scan::Unterminated);
    }

    #[test]
    fn marker_attributes_must_match_exactly() {
        let doc = r#"<script type="application/json" id="SIGI_STATE">{}</script>"#;
        assert_eq!(between(doc, OPEN, "</script>").found(), None);
    }

    #[test]
    fn empty_interior() {
        let doc = format!("{OPEN}</script>");
        assert_eq!(between(&doc, OPEN, "</script>"), Scan::Found(""));
    }
}
