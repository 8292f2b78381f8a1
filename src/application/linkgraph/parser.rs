use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::entities::entity::LinkEntityData;
use crate::domain::linkgraph::graph::{Link, LinkKind, LinkStyle};

// `[[target]]`, `[[target|display]]`, with optional `!` (embed) or `@` (mention) prefix.
static LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([!@])?\[\[([^\[\]|]*)(?:\|([^\[\]]*))?\]\]").expect("link regex is valid")
});

/// Read access to the entity set a link token is resolved against.
pub trait EntityLookup {
    fn get(&self, id: &str) -> Option<&LinkEntityData>;

    /// Exact title match wins over a case-insensitive one.
    fn find_by_title(&self, title: &str) -> Option<&str>;

    fn entries(&self) -> Box<dyn Iterator<Item = &LinkEntityData> + '_>;
}

fn resolve<'a, L: EntityLookup + ?Sized>(lookup: &'a L, token: &str) -> Option<&'a str> {
    if token.is_empty() {
        return None;
    }
    if let Some(e) = lookup.get(token) {
        return Some(e.id.as_str());
    }
    lookup.find_by_title(token)
}

/// Parses every link token in `content`, in document order.
///
/// Never fails: an empty target, an unknown target or an unterminated `[[`
/// all come back as broken links with their text kept as written.
pub fn parse_links<L: EntityLookup + ?Sized>(
    source_id: &str,
    content: &str,
    lookup: &L,
) -> Vec<Link> {
    let mut links: Vec<Link> = Vec::new();
    let mut covered: Vec<(usize, usize)> = Vec::new();

    for cap in LINK_REGEX.captures_iter(content) {
        let Some(mat) = cap.get(0) else { continue };
        let style = match cap.get(1).map(|m| m.as_str()) {
            Some("!") => LinkStyle::Embed,
            Some("@") => LinkStyle::Mention,
            _ => LinkStyle::Reference,
        };
        let raw_target = cap.get(2).map(|m| m.as_str()).unwrap_or_default();
        let token = raw_target.trim();
        let display_text = cap
            .get(3)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| raw_target.to_string());
        let target_id = resolve(lookup, token).map(str::to_string);
        covered.push((mat.start(), mat.end()));
        links.push(Link {
            source_id: source_id.to_string(),
            is_broken: target_id.is_none(),
            target_id,
            display_text,
            kind: LinkKind::Markdown,
            style,
            start: mat.start(),
            end: mat.end(),
        });
    }

    for (start, _) in content.match_indices("[[") {
        let rest = &content[start + 2..];
        let stop = [rest.find('\n'), rest.find("[[")]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(rest.len());
        let end = start + 2 + stop;
        if covered.iter().any(|(s, e)| start < *e && end > *s) {
            continue;
        }
        links.push(Link {
            source_id: source_id.to_string(),
            target_id: None,
            display_text: rest[..stop].to_string(),
            is_broken: true,
            kind: LinkKind::Markdown,
            style: LinkStyle::Reference,
            start,
            end,
        });
    }

    links.sort_by_key(|l| l.start);
    links
}

/// Sorted, deduplicated ids of every resolved target in `content`.
pub fn referenced_targets<L: EntityLookup + ?Sized>(content: &str, lookup: &L) -> Vec<String> {
    let mut ids: Vec<String> = parse_links("", content, lookup)
        .into_iter()
        .filter_map(|l| l.target_id)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

pub fn outgoing_links<L: EntityLookup + ?Sized>(lookup: &L, entity_id: &str) -> Vec<Link> {
    match lookup.get(entity_id) {
        Some(entity) => parse_links(
            &entity.id,
            entity.content.as_deref().unwrap_or_default(),
            lookup,
        ),
        None => Vec::new(),
    }
}

/// Reverse scan over every entity's content. Linear in the total content
/// size, so it is meant for the focused entity only.
pub fn incoming_links<L: EntityLookup + ?Sized>(lookup: &L, entity_id: &str) -> Vec<Link> {
    links_to(lookup.entries(), entity_id, lookup)
}

/// Links in `sources` whose target resolves to `entity_id` against `lookup`,
/// ordered by source id and then by position.
pub fn links_to<'a, L: EntityLookup + ?Sized>(
    sources: impl IntoIterator<Item = &'a LinkEntityData>,
    entity_id: &str,
    lookup: &L,
) -> Vec<Link> {
    let mut sources: Vec<&LinkEntityData> = sources
        .into_iter()
        .filter(|e| e.content.as_deref().is_some_and(|c| c.contains("[[")))
        .collect();
    sources.sort_by(|a, b| a.id.cmp(&b.id));

    sources
        .into_iter()
        .flat_map(|source| {
            parse_links(
                &source.id,
                source.content.as_deref().unwrap_or_default(),
                lookup,
            )
        })
        .filter(|l| l.target_id.as_deref() == Some(entity_id))
        .collect()
}
