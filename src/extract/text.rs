//! HTML → BBCode transcoding
//!
//! Message bodies are stored as BBCode. The transcoder is a plain tree
//! recursion over the message element; unknown markup passes through
//! transparently so nothing a post said is ever dropped.

use scraper::{ElementRef, Node};

use super::element_text;

/// Transcode a message element (`.postmsg`, `.postsignature`) to BBCode.
pub fn to_bbcode(element: &ElementRef<'_>) -> String {
    let mut out = String::new();
    append_children(&mut out, element);
    out
}

/// True if the element contains at least one smiley image. Inline images
/// posted by users carry the `postimg` class; everything else is a smiley.
pub fn contains_smilies(element: &ElementRef<'_>) -> bool {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "img")
        .any(|img| !img.value().classes().any(|class| class == "postimg"))
}

fn append_children(out: &mut String, element: &ElementRef<'_>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    append_element(out, &child);
                }
            }
            _ => {}
        }
    }
}

fn append_element(out: &mut String, element: &ElementRef<'_>) {
    let value = element.value();
    match value.name() {
        "a" => {
            out.push_str("[url=");
            out.push_str(value.attr("href").unwrap_or_default());
            out.push(']');
            append_children(out, element);
            out.push_str("[/url]");
        }
        "b" | "strong" => {
            out.push_str("[b]");
            append_children(out, element);
            out.push_str("[/b]");
        }
        "i" | "em" => {
            out.push_str("[i]");
            append_children(out, element);
            out.push_str("[/i]");
        }
        "br" => out.push('\n'),
        "blockquote" => {
            // The quote box nests an .incqbox whose leading h4 names the
            // quoted author ("Alice wrote:")
            let author = element
                .children()
                .filter_map(ElementRef::wrap)
                .next()
                .and_then(|incqbox| incqbox.children().filter_map(ElementRef::wrap).next())
                .filter(|first| first.value().name() == "h4")
                .map(|h4| element_text(&h4));
            out.push_str("[quote");
            if let Some(author) = author {
                out.push('=');
                out.push_str(author.strip_suffix(" wrote:").unwrap_or(&author));
            }
            out.push(']');
            append_children(out, element);
            out.push_str("[/quote]");
        }
        // Emitted as the quote author by the blockquote arm
        "h4" => {}
        "div" => {
            if value.classes().any(|class| class == "codebox") {
                out.push_str("[code]");
                append_children(out, element);
                out.push_str("[/code]");
            } else {
                append_children(out, element);
            }
        }
        "span" => {
            if value.classes().any(|class| class == "bbu") {
                out.push_str("[u]");
                append_children(out, element);
                out.push_str("[/u]");
            } else {
                append_children(out, element);
            }
        }
        "img" => {
            if value.classes().any(|class| class == "postimg" || class == "sigimage") {
                out.push_str("[img]");
                out.push_str(value.attr("src").unwrap_or_default());
                out.push_str("[/img]");
            } else {
                // Smiley: the alt text is the smiley the poster typed
                out.push_str(value.attr("alt").unwrap_or_default());
            }
        }
        _ => append_children(out, element),
    }
}
