/// Replace every `{{tag}}` in `template` with its value.
pub fn replace_tags(template: &str, tags: &[(&str, &str)]) -> String {
    tags.iter().fold(template.to_string(), |page, (tag, value)| {
        page.replace(&format!("{{{{{tag}}}}}"), value)
    })
}

/// Escape text for use inside HTML content or quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
