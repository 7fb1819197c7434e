// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Displayable content for assistant turns

/// Maximum characters kept from each source snippet
pub const SNIPPET_MAX_CHARS: usize = 400;

/// Appended to snippets that were cut
pub const ELLIPSIS: &str = "...";

const SNIPPET_STYLE: &str = "color:gray; font-size: 0.85rem; margin-top: 0.5rem;";

/// Trim, collapse newlines to spaces and cut to `max_chars` characters
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let snippet = text.trim().replace('\n', " ");
    if snippet.chars().count() > max_chars {
        let mut cut: String = snippet.chars().take(max_chars).collect();
        cut.push_str(ELLIPSIS);
        cut
    } else {
        snippet
    }
}

/// Answer paragraph followed by an optional source block
///
/// Answer and snippets are sanitized before being embedded in markup.
pub fn compose_reply(answer: &str, snippets: &[String]) -> String {
    let mut html = format!("<p><b>Answer:</b> {}</p>", ammonia::clean(answer));

    if !snippets.is_empty() {
        html.push_str("<hr><p><b>Source Docs:</b></p>");
        for snippet in snippets {
            html.push_str(&format!(
                "<div style='{}'>{}</div>",
                SNIPPET_STYLE,
                ammonia::clean(snippet)
            ));
        }
    }

    html
}
