//! DOM subtree to Markdown rendering.
//!
//! A recursive walk over the cleaned content tree. Rules of note:
//! code blocks keep their original whitespace and carry a best-effort
//! language tag, tables become pipe-delimited rows in their own block, and
//! images keep `alt`/`src` with the title omitted when absent.

use once_cell::sync::Lazy;
use regex::Regex;
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Selector};

static LANGUAGE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"language-(\w+)").expect("valid language pattern"));
static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid newline pattern"));

static CODE_CHILD: Lazy<Selector> = Lazy::new(|| Selector::parse("code").expect("valid selector"));
static TABLE_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static TABLE_CELL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("th, td").expect("valid selector"));

/// Render a cleaned content subtree as Markdown.
pub fn element_to_markdown(root: ElementRef) -> String {
    let mut out = String::new();
    render_children(*root, &mut out, 0);
    tidy(&out)
}

/// Render a cleaned content subtree as plain text with normalized whitespace.
pub fn element_to_text(root: ElementRef) -> String {
    root.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_children(node: NodeRef<Node>, out: &mut String, depth: usize) {
    for child in node.children() {
        render_node(child, out, depth);
    }
}

fn render_node(node: NodeRef<Node>, out: &mut String, depth: usize) {
    match node.value() {
        Node::Text(text) => push_inline(out, &text),
        Node::Element(_) => {
            if let Some(el) = ElementRef::wrap(node) {
                render_element(el, out, depth);
            }
        }
        _ => {}
    }
}

fn render_element(el: ElementRef, out: &mut String, depth: usize) {
    let name = el.value().name();
    match name {
        "script" | "style" | "noscript" | "template" | "head" | "iframe" => {}
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = (name.as_bytes()[1] - b'0') as usize;
            let text = render_inline(el, depth);
            if !text.is_empty() {
                ensure_block(out);
                out.push_str(&"#".repeat(level));
                out.push(' ');
                out.push_str(&text);
                end_block(out);
            }
        }
        "p" => {
            ensure_block(out);
            render_children(*el, out, depth);
            end_block(out);
        }
        "br" => out.push('\n'),
        "hr" => {
            ensure_block(out);
            out.push_str("---");
            end_block(out);
        }
        "strong" | "b" => wrapped_inline(el, out, depth, "**"),
        "em" | "i" => wrapped_inline(el, out, depth, "*"),
        "code" => inline_code(el, out),
        "pre" => fenced_code(el, out),
        "a" => link(el, out, depth),
        "img" => image(el, out),
        "ul" => list(el, out, depth, false),
        "ol" => list(el, out, depth, true),
        "blockquote" => blockquote(el, out, depth),
        "table" => table(el, out),
        "div" | "section" | "article" | "main" | "aside" | "figure" | "figcaption" | "header"
        | "footer" => {
            ensure_block(out);
            render_children(*el, out, depth);
            end_block(out);
        }
        _ => render_children(*el, out, depth),
    }
}

/// Render an element's children and flatten the result to one line.
fn render_inline(el: ElementRef, depth: usize) -> String {
    let mut inner = String::new();
    render_children(*el, &mut inner, depth);
    inner.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_inline(out: &mut String, text: &str) {
    let has_leading = text.starts_with(|c: char| c.is_whitespace());
    let has_trailing = text.ends_with(|c: char| c.is_whitespace());
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        if (has_leading || has_trailing) && needs_space(out) {
            out.push(' ');
        }
        return;
    }

    if has_leading && needs_space(out) {
        out.push(' ');
    }
    out.push_str(&collapsed);
    if has_trailing {
        out.push(' ');
    }
}

fn needs_space(out: &str) -> bool {
    !out.is_empty() && !out.ends_with(|c: char| c.is_whitespace())
}

fn wrapped_inline(el: ElementRef, out: &mut String, depth: usize, delim: &str) {
    let text = render_inline(el, depth);
    if text.is_empty() {
        return;
    }
    out.push_str(delim);
    out.push_str(&text);
    out.push_str(delim);
}

fn inline_code(el: ElementRef, out: &mut String) {
    let code: String = el.text().collect();
    let code = code.trim();
    if code.is_empty() {
        return;
    }
    out.push('`');
    out.push_str(code);
    out.push('`');
}

fn fenced_code(el: ElementRef, out: &mut String) {
    let code: String = el.text().collect();
    let code = code.trim_matches('\n');
    if code.trim().is_empty() {
        return;
    }

    ensure_block(out);
    out.push_str("```");
    if let Some(lang) = detect_language(el) {
        out.push_str(&lang);
    }
    out.push('\n');
    out.push_str(code);
    out.push('\n');
    out.push_str("```");
    end_block(out);
}

/// Best-effort language tag from `data-language` or a `language-*` class on
/// the pre element or a nested code element.
fn detect_language(el: ElementRef) -> Option<String> {
    if let Some(lang) = el.value().attr("data-language") {
        return Some(lang.to_string());
    }

    let from_class = |class: &str| {
        LANGUAGE_CLASS
            .captures(class)
            .map(|caps| caps[1].to_string())
    };

    el.value()
        .attr("class")
        .and_then(from_class)
        .or_else(|| {
            el.select(&CODE_CHILD)
                .next()
                .and_then(|code| code.value().attr("class"))
                .and_then(from_class)
        })
}

fn link(el: ElementRef, out: &mut String, depth: usize) {
    let text = render_inline(el, depth);
    match el.value().attr("href").filter(|href| !href.is_empty()) {
        Some(href) => {
            let label = if text.is_empty() { href.to_string() } else { text };
            out.push('[');
            out.push_str(&label);
            out.push_str("](");
            out.push_str(href);
            out.push(')');
        }
        None => out.push_str(&text),
    }
}

fn image(el: ElementRef, out: &mut String) {
    let Some(src) = el.value().attr("src").filter(|src| !src.is_empty()) else {
        return;
    };
    let alt = el.value().attr("alt").unwrap_or("");

    match el.value().attr("title").filter(|t| !t.is_empty()) {
        Some(title) => {
            out.push_str(&format!("![{}]({} \"{}\")", alt, src, title));
        }
        None => out.push_str(&format!("![{}]({})", alt, src)),
    }
}

fn list(el: ElementRef, out: &mut String, depth: usize, ordered: bool) {
    if depth == 0 {
        ensure_block(out);
    } else if !out.ends_with('\n') {
        out.push('\n');
    }

    let indent = "  ".repeat(depth);
    let mut index = 0;
    for item in el
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "li")
    {
        index += 1;
        let marker = if ordered {
            format!("{}. ", index)
        } else {
            "- ".to_string()
        };

        let mut body = String::new();
        render_children(*item, &mut body, depth + 1);
        let body = tidy(&body);

        out.push_str(&indent);
        out.push_str(&marker);
        for (i, line) in body.lines().enumerate() {
            if i > 0 {
                out.push('\n');
                out.push_str(&indent);
                out.push_str("  ");
            }
            out.push_str(line);
        }
        out.push('\n');
    }

    if depth == 0 {
        out.push('\n');
    }
}

fn blockquote(el: ElementRef, out: &mut String, depth: usize) {
    let mut inner = String::new();
    render_children(*el, &mut inner, depth);
    let inner = tidy(&inner);
    if inner.is_empty() {
        return;
    }

    ensure_block(out);
    for line in inner.lines() {
        if line.is_empty() {
            out.push_str(">\n");
        } else {
            out.push_str("> ");
            out.push_str(line);
            out.push('\n');
        }
    }
    end_block(out);
}

fn table(el: ElementRef, out: &mut String) {
    ensure_block(out);
    for row in el.select(&TABLE_ROW) {
        let cells: Vec<String> = row
            .select(&TABLE_CELL)
            .map(|cell| render_inline(cell, 0).replace('\n', " "))
            .collect();
        if cells.is_empty() {
            continue;
        }
        out.push_str("| ");
        out.push_str(&cells.join(" | "));
        out.push_str(" |\n");
    }
    end_block(out);
}

fn ensure_block(out: &mut String) {
    while out.ends_with(' ') || out.ends_with('\t') {
        out.pop();
    }
    if out.is_empty() {
        return;
    }
    while !out.ends_with("\n\n") {
        out.push('\n');
    }
}

fn end_block(out: &mut String) {
    while out.ends_with(' ') || out.ends_with('\t') {
        out.pop();
    }
    out.push_str("\n\n");
}

fn tidy(text: &str) -> String {
    let trimmed_lines: String = text
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    EXCESS_NEWLINES
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}
