//! Index page extraction: categories and the forums inside them

use scraper::ElementRef;

use super::{element_text, select_all, select_first, ExtractError, Extraction, Extractor};
use crate::model::{Category, Forum, Record};
use crate::util::query_id;

/// Extract every category block on an index page, with its forums. A
/// category that fails to parse is skipped whole (its forums cannot be
/// attributed); a single bad forum row only costs that row.
pub(super) fn extract(extractor: &Extractor, pun: &ElementRef<'_>) -> Extraction {
    let mut out = Extraction::default();

    for (position, block) in select_all(pun, ".blocktable").iter().enumerate() {
        let category = match parse_category(block, position as u32) {
            Ok(category) => category,
            Err(error) => {
                out.errors.push(error);
                continue;
            }
        };
        let category_name = category.name.clone();
        out.records.push(Record::Category(category));

        let mut forum_position = 0;
        for row in select_all(block, "tr") {
            // The heading row has no forum link
            if select_first(&row, "h3").is_none() {
                continue;
            }
            match parse_forum(extractor, &row, forum_position, &category_name) {
                Ok(forum) => out.records.push(Record::Forum(forum)),
                Err(error) => out.errors.push(error),
            }
            forum_position += 1;
        }
    }

    out
}

fn parse_category(block: &ElementRef<'_>, position: u32) -> Result<Category, ExtractError> {
    let name = select_first(block, "h2")
        .map(|h2| element_text(&h2))
        .filter(|name| !name.is_empty())
        .ok_or(ExtractError::MissingField {
            record: "category",
            field: "name",
        })?;
    Ok(Category { name, position })
}

fn parse_forum(
    extractor: &Extractor,
    row: &ElementRef<'_>,
    position: u32,
    category: &str,
) -> Result<Forum, ExtractError> {
    let is_redirect = row.value().classes().any(|class| class == "iredirect");

    let link = select_first(row, "a").ok_or(ExtractError::MissingField {
        record: "forum",
        field: "url",
    })?;
    let href = link
        .value()
        .attr("href")
        .ok_or(ExtractError::MissingField {
            record: "forum",
            field: "url",
        })?;

    let (id, redirect_url) = if is_redirect {
        // Redirect rows are links elsewhere; they have no id of their own
        (0, Some(href.to_string()))
    } else {
        let id = query_id(href, "id").ok_or_else(|| ExtractError::InvalidField {
            record: "forum",
            field: "id",
            value: href.to_string(),
        })?;
        (id, None)
    };

    let name = select_first(row, "h3")
        .map(|h3| element_text(&h3))
        .filter(|name| !name.is_empty())
        .ok_or(ExtractError::MissingField {
            record: "forum",
            field: "name",
        })?;

    let description = select_first(row, ".tclcon")
        .map(|tclcon| own_text(&tclcon))
        .filter(|text| !text.is_empty());

    let (num_topics, num_posts) = if is_redirect {
        (0, 0)
    } else {
        (
            cell_count(row, ".tc2", "forum", "topic count")?,
            cell_count(row, ".tc3", "forum", "post count")?,
        )
    };

    let (last_posted, last_post_id, last_poster) = parse_last_post(extractor, row, "forum")?;

    Ok(Forum {
        id,
        name,
        description,
        redirect_url,
        num_topics,
        num_posts,
        last_posted,
        last_post_id,
        last_poster,
        position,
        category: category.to_string(),
    })
}

/// Text directly inside an element, ignoring child elements.
fn own_text(element: &ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Parse the numeric content of a counter cell.
pub(super) fn cell_count(
    row: &ElementRef<'_>,
    css: &str,
    record: &'static str,
    field: &'static str,
) -> Result<u32, ExtractError> {
    let cell = select_first(row, css).ok_or(ExtractError::MissingField { record, field })?;
    let text = element_text(&cell);
    text.parse().map_err(|_| ExtractError::InvalidField {
        record,
        field,
        value: text,
    })
}

/// Parse the "last post" cell (`.tcr`) of a listing row: timestamp, post
/// id, and poster. Empty cells (empty forums, redirects) yield zeros.
pub(super) fn parse_last_post(
    extractor: &Extractor,
    row: &ElementRef<'_>,
    record: &'static str,
) -> Result<(i64, u32, Option<String>), ExtractError> {
    let cell = match select_first(row, ".tcr") {
        Some(cell) => cell,
        None => return Ok((0, 0, None)),
    };
    let cell_text = element_text(&cell);
    if cell_text.is_empty() || cell_text == "\u{a0}" {
        return Ok((0, 0, None));
    }

    let link = select_first(&cell, "a").ok_or(ExtractError::MissingField {
        record,
        field: "last post link",
    })?;
    let href = link
        .value()
        .attr("href")
        .ok_or(ExtractError::MissingField {
            record,
            field: "last post link",
        })?;
    let last_post_id = query_id(href, "pid").ok_or_else(|| ExtractError::InvalidField {
        record,
        field: "last post id",
        value: href.to_string(),
    })?;
    let last_posted = extractor.dates.parse(&element_text(&link))?;

    let last_poster = select_first(&cell, ".byuser")
        .map(|by| element_text(&by))
        .map(|text| text.strip_prefix("by ").unwrap_or(&text).to_string());

    Ok((last_posted, last_post_id, last_poster))
}
