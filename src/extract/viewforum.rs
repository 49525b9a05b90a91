//! Forum listing page extraction: topics

use scraper::ElementRef;

use super::index::{cell_count, parse_last_post};
use super::{container_id, element_text, select_all, select_first, ExtractError, Extraction, Extractor};
use crate::model::{Record, Topic};
use crate::util::query_id;

/// Extract every topic row on a forum listing page. Moved topics are
/// placeholders living in another forum and are skipped. The forum id is
/// read from the page links; pages short enough to lack them get 0.
pub(super) fn extract(extractor: &Extractor, pun: &ElementRef<'_>) -> Extraction {
    let mut out = Extraction::default();
    let forum_id = container_id(pun).unwrap_or(0);

    for row in select_all(pun, "tr") {
        if select_first(&row, ".tclcon").is_none() {
            // Heading row
            continue;
        }
        if row.value().classes().any(|class| class == "imoved") {
            continue;
        }
        match parse_topic(extractor, &row, forum_id) {
            Ok(topic) => out.records.push(Record::Topic(topic)),
            Err(error) => out.errors.push(error),
        }
    }

    out
}

fn parse_topic(
    extractor: &Extractor,
    row: &ElementRef<'_>,
    forum_id: u32,
) -> Result<Topic, ExtractError> {
    let link = select_first(row, ".tclcon a").ok_or(ExtractError::MissingField {
        record: "topic",
        field: "link",
    })?;
    let href = link
        .value()
        .attr("href")
        .ok_or(ExtractError::MissingField {
            record: "topic",
            field: "link",
        })?;
    let id = query_id(href, "id").ok_or_else(|| ExtractError::InvalidField {
        record: "topic",
        field: "id",
        value: href.to_string(),
    })?;

    let subject = element_text(&link);
    if subject.is_empty() {
        return Err(ExtractError::MissingField {
            record: "topic",
            field: "subject",
        });
    }

    let poster = select_first(row, ".byuser")
        .map(|by| element_text(&by))
        .map(|text| text.strip_prefix("by ").unwrap_or(&text).to_string())
        .ok_or(ExtractError::MissingField {
            record: "topic",
            field: "poster",
        })?;

    let num_replies = cell_count(row, ".tc2", "topic", "reply count")?;
    let num_views = cell_count(row, ".tc3", "topic", "view count")?;

    let (last_posted, last_post_id, last_poster) = parse_last_post(extractor, row, "topic")?;
    if last_post_id == 0 {
        // Every topic has at least one post; a blank cell means the row is
        // broken and a later resolution key would be meaningless
        return Err(ExtractError::MissingField {
            record: "topic",
            field: "last post",
        });
    }

    let classes: Vec<&str> = row.value().classes().collect();

    Ok(Topic {
        id,
        poster,
        subject,
        posted: 0,
        last_posted,
        last_post_id,
        last_poster,
        num_views,
        num_replies,
        closed: classes.contains(&"iclosed"),
        sticky: classes.contains(&"isticky"),
        forum_id,
    })
}
