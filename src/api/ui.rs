// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server-rendered chat page
//!
//! User turns are rendered from Markdown; assistant turns already hold
//! sanitized markup and are inserted as stored.

use pulldown_cmark::{html, Parser};

use crate::rag::{ChatRole, ChatTurn};

pub const PAGE_TITLE: &str = "Ask Chatbot!";

const PAGE_STYLE: &str = "\
body { font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
.turn { padding: 0.75rem 1rem; margin: 0.5rem 0; border-radius: 0.5rem; }
.user { background: #eef3ff; }
.assistant { background: #f5f5f5; }
.role { font-size: 0.75rem; text-transform: uppercase; color: #666; }
.error { background: #fdecea; color: #611a15; padding: 0.75rem 1rem; border-radius: 0.5rem; }
form { display: flex; gap: 0.5rem; margin-top: 1rem; }
input[name=question] { flex: 1; padding: 0.5rem; }";

/// Render Markdown typed by the user into sanitized HTML
pub fn render_markdown(text: &str) -> String {
    let mut out = String::new();
    html::push_html(&mut out, Parser::new(text));
    ammonia::clean(&out)
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_turn(turn: &ChatTurn) -> String {
    let body = match turn.role() {
        ChatRole::User => render_markdown(turn.content()),
        ChatRole::Assistant => turn.content().to_string(),
    };
    format!(
        "<div class=\"turn {role}\"><div class=\"role\">{role}</div>{body}</div>\n",
        role = turn.role().as_str(),
        body = body
    )
}

/// Full page: transcript, optional transient error, question input
pub fn render_page(turns: &[ChatTurn], error: Option<&str>) -> String {
    let mut page = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>{style}</style>\n</head>\n<body>\n<h1>{title}</h1>\n",
        title = PAGE_TITLE,
        style = PAGE_STYLE
    );

    page.push_str("<div id=\"transcript\">\n");
    for turn in turns {
        page.push_str(&render_turn(turn));
    }
    page.push_str("</div>\n");

    if let Some(message) = error {
        page.push_str(&format!(
            "<div class=\"error\" role=\"alert\">{}</div>\n",
            escape_text(message)
        ));
    }

    page.push_str(
        "<form method=\"post\" action=\"/chat\">\n\
         <input name=\"question\" placeholder=\"Pass your prompt here\" autocomplete=\"off\" autofocus>\n\
         <button type=\"submit\">Send</button>\n\
         </form>\n</body>\n</html>\n",
    );
    page
}
