/// Strips scripts, event handlers and unknown tags from editor HTML
pub fn sanitize_rich_text(html: &str) -> String {
    ammonia::clean(html)
}

/// Plain-text rendition of editor HTML, whitespace collapsed
pub fn plain_text(html: &str) -> String {
    let rendered = html2text::from_read(html.as_bytes(), 80).unwrap_or_else(|e| {
        tracing::warn!("Failed to render rich text, using raw input: {}", e);
        html.to_string()
    });
    rendered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of the plain text, with an ellipsis when cut
pub fn excerpt(html: &str, max_chars: usize) -> String {
    let text = plain_text(html);
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.truncate(cut.trim_end().len());
    cut.push_str("...");
    cut
}

/// Case-insensitive substring match used by list searches; an empty query
/// matches everything
pub fn matches_query(query: &str, fields: &[&str]) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_are_removed() {
        let cleaned = sanitize_rich_text("<p>Id, Ego</p><script>alert(1)</script>");
        assert!(cleaned.contains("<p>Id, Ego</p>"));
        assert!(!cleaned.contains("script"));
    }

    #[test]
    fn excerpt_collapses_markup() {
        let html = "<h1>Freud</h1><p>The   structural model of the psyche</p>";
        let text = plain_text(html);
        assert!(text.contains("Freud"));
        assert!(text.contains("The structural model of the psyche"));

        let short = excerpt(html, 10);
        assert!(short.ends_with("..."));
        assert!(short.chars().count() <= 13);
    }

    #[test]
    fn query_matching() {
        assert!(matches_query("", &["anything"]));
        assert!(matches_query("  SANTOS ", &["Maria Santos", "202110123"]));
        assert!(!matches_query("wilson", &["Maria Santos"]));
    }
}
