//! Topic page extraction: posts and the users who wrote them

use scraper::ElementRef;

use super::text::{contains_smilies, to_bbcode};
use super::{container_id, element_text, select_all, select_first, ExtractError, Extraction, Extractor};
use crate::model::{ParentRef, Post, Record, User};
use crate::util::query_id;

/// Id shared by all guest posters; the users table seeds it.
const GUEST_ID: u32 = 1;

/// Extract every post on a topic page, plus a user record per poster
/// block. When the page links carry the topic id, posts reference it
/// directly; otherwise the whole page is keyed by its last post's id and
/// resolution happens later against some topic's last-post id.
pub(super) fn extract(extractor: &Extractor, pun: &ElementRef<'_>) -> Extraction {
    let mut out = Extraction::default();
    let topic_id = container_id(pun);

    let mut posts = Vec::new();
    for block in select_all(pun, ".blockpost") {
        match parse_post(extractor, &block) {
            Ok((post, user)) => {
                if let Some(user) = user {
                    out.records.push(Record::User(user));
                }
                posts.push(post);
            }
            Err(error) => out.errors.push(error),
        }
    }

    let parent = match topic_id {
        Some(id) => Some(ParentRef::Topic(id)),
        None => posts.last().map(|last| ParentRef::LastPost(last.id)),
    };
    if let Some(parent) = parent {
        for mut post in posts {
            post.topic = parent;
            out.records.push(Record::Post(post));
        }
    }

    out
}

fn parse_post(
    extractor: &Extractor,
    block: &ElementRef<'_>,
) -> Result<(Post, Option<User>), ExtractError> {
    // Post ids render as element ids of the form p<NNN>
    let id_attr = block.value().id().ok_or(ExtractError::MissingField {
        record: "post",
        field: "id",
    })?;
    let id: u32 = id_attr
        .strip_prefix('p')
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| ExtractError::InvalidField {
            record: "post",
            field: "id",
            value: id_attr.to_string(),
        })?;

    let (poster, poster_id, user) = parse_poster(block)?;

    let message_element = select_first(block, ".postmsg").ok_or(ExtractError::MissingField {
        record: "post",
        field: "message",
    })?;
    let message = to_bbcode(&message_element);
    let hide_smilies = !contains_smilies(&message_element);

    // The post's permalink anchor text is its date
    let date_link = select_first(block, "a").ok_or(ExtractError::MissingField {
        record: "post",
        field: "date",
    })?;
    let posted = extractor.dates.parse(&element_text(&date_link))?;

    let (edited, edited_by) = parse_edited(extractor, block);

    Ok((
        Post {
            id,
            poster,
            poster_id,
            message,
            hide_smilies,
            posted,
            edited,
            edited_by,
            topic: ParentRef::LastPost(id),
        },
        user,
    ))
}

/// Read the poster block: username, user id (guests share [`GUEST_ID`]),
/// and a user record for registered posters.
fn parse_poster(
    block: &ElementRef<'_>,
) -> Result<(String, u32, Option<User>), ExtractError> {
    let name_element = select_first(block, "dt").ok_or(ExtractError::MissingField {
        record: "post",
        field: "poster",
    })?;
    let username = element_text(&name_element);
    if username.is_empty() {
        return Err(ExtractError::MissingField {
            record: "post",
            field: "poster",
        });
    }

    // Guests have no profile link
    let profile_link = select_first(&name_element, "a");
    let poster_id = match profile_link {
        None => GUEST_ID,
        Some(link) => {
            let href = link
                .value()
                .attr("href")
                .ok_or(ExtractError::MissingField {
                    record: "post",
                    field: "poster id",
                })?;
            query_id(href, "id").ok_or_else(|| ExtractError::InvalidField {
                record: "post",
                field: "poster id",
                value: href.to_string(),
            })?
        }
    };

    let user = if poster_id == GUEST_ID {
        None
    } else {
        Some(User {
            id: poster_id,
            username: username.clone(),
            title: select_first(block, ".usertitle")
                .map(|title| element_text(&title))
                .filter(|title| !title.is_empty()),
            signature: select_first(block, ".postsignature")
                .map(|sig| to_bbcode(&sig).trim().to_string())
                .filter(|sig| !sig.is_empty()),
            has_avatar: select_first(block, ".postavatar").is_some(),
        })
    };

    Ok((username, poster_id, user))
}

/// Read the "Last edited by X (date)" line, when present. Absence or an
/// unparseable by-line just means "not edited"; it never fails the post.
fn parse_edited(extractor: &Extractor, block: &ElementRef<'_>) -> (Option<i64>, Option<String>) {
    let line = match select_first(block, ".postedit") {
        Some(element) => element_text(&element),
        None => return (None, None),
    };
    let rest = match line.strip_prefix("Last edited by ") {
        Some(rest) => rest,
        None => return (None, None),
    };
    let (name, date) = match (rest.find('('), rest.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            (rest[..open].trim(), rest[open + 1..close].trim())
        }
        _ => return (None, None),
    };
    match extractor.dates.parse(date) {
        Ok(edited) => (Some(edited), Some(name.to_string())),
        Err(_) => (None, None),
    }
}
