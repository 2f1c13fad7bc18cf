//! Ranking page extraction.
//!
//! The site serves GBK. Bytes are transcoded before the DOM is built so
//! member names survive intact. Extraction is all-or-nothing per page.

use std::sync::OnceLock;

use encoding_rs::Encoding;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use tiebarank_core::{MemberRecord, Page, RankLevel};

use crate::error::{CrawlError, Result};

/// Encoding the ranking pages are served in.
pub use encoding_rs::GBK as SITE_ENCODING;

/// Marker token that precedes the level digits in the title's class list.
const LEVEL_MARKER: &str = "lv";

struct Selectors {
    item: Selector,
    index: Selector,
    exp: Selector,
    card: Selector,
    anchor: Selector,
    title_div: Selector,
    total: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let parse = |s: &str| Selector::parse(s).expect("static selector");
        Selectors {
            item: parse(".drl_list_item"),
            index: parse(".drl_item_index"),
            exp: parse(".drl_item_exp"),
            card: parse(".drl_item_card"),
            anchor: parse("a"),
            title_div: parse(".drl_item_title div"),
            total: parse(".drl_info_txt_gray"),
        }
    })
}

/// Transcode raw bytes to UTF-8. A BOM overrides `encoding`.
pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(encoding = used.name(), "malformed byte sequences replaced while decoding");
    }
    text.into_owned()
}

/// Parse every member row on a ranking page, in source order.
pub fn extract_records(bytes: &[u8], encoding: &'static Encoding) -> Result<Vec<MemberRecord>> {
    let doc = Html::parse_document(&decode(bytes, encoding));
    records_from(&doc)
}

/// Parse a ranking page, including the community total if advertised.
pub fn extract_page(number: u32, bytes: &[u8], encoding: &'static Encoding) -> Result<Page> {
    let doc = Html::parse_document(&decode(bytes, encoding));
    let records = records_from(&doc)?;
    let total_members = total_from(&doc);
    debug!(page = number, records = records.len(), ?total_members, "page extracted");
    Ok(Page {
        number,
        records,
        total_members,
    })
}

/// Light projection for the boundary resolver: rank and level only.
pub fn extract_rank_levels(bytes: &[u8], encoding: &'static Encoding) -> Result<Vec<RankLevel>> {
    let doc = Html::parse_document(&decode(bytes, encoding));
    let sel = selectors();
    let mut out = Vec::new();
    for (i, item) in doc.select(&sel.item).enumerate() {
        let rank = parse_number(&item, &sel.index, "rank", i)?;
        let level = parse_level(&item, i)?;
        out.push(RankLevel { rank, level });
    }
    check_rank_order(out.iter().map(|r| r.rank))?;
    Ok(out)
}

fn records_from(doc: &Html) -> Result<Vec<MemberRecord>> {
    let sel = selectors();
    let mut records = Vec::new();

    for (i, item) in doc.select(&sel.item).enumerate() {
        let rank = parse_number(&item, &sel.index, "rank", i)?;
        let exp = parse_number(&item, &sel.exp, "experience", i)?;

        let card = item
            .select(&sel.card)
            .next()
            .ok_or_else(|| missing("link", i))?;
        let link = card
            .select(&sel.anchor)
            .next()
            .and_then(|a| a.value().attr("href"))
            .ok_or_else(|| missing("link", i))?
            .to_string();
        let patron = card.value().classes().any(|c| c == "drl_item_vip");
        let name = text_of(&card);

        let level = parse_level(&item, i)?;

        records.push(MemberRecord {
            rank,
            name,
            link,
            level,
            exp,
            patron,
            nickname: None,
        });
    }

    check_rank_order(records.iter().map(|r| r.rank))?;
    Ok(records)
}

fn total_from(doc: &Html) -> Option<u64> {
    let el = doc.select(&selectors().total).next()?;
    let raw = text_of(&el);
    match parse_count(&raw) {
        Some(n) => Some(n),
        None => {
            debug!(raw = %raw, "member total not parseable");
            None
        }
    }
}

fn parse_number(item: &ElementRef<'_>, sel: &Selector, field: &str, i: usize) -> Result<u64> {
    let el = item.select(sel).next().ok_or_else(|| missing(field, i))?;
    let raw = text_of(&el);
    parse_count(&raw)
        .ok_or_else(|| CrawlError::Parse(format!("record {i}: bad {field} {raw:?}")))
}

/// Level lives in the title div's class attribute, e.g. `bg_lv12`.
fn parse_level(item: &ElementRef<'_>, i: usize) -> Result<u32> {
    let class = item
        .select(&selectors().title_div)
        .next()
        .and_then(|d| d.value().attr("class"))
        .ok_or_else(|| missing("level", i))?;
    let (_, after) = class
        .split_once(LEVEL_MARKER)
        .ok_or_else(|| CrawlError::Parse(format!("record {i}: no level marker in {class:?}")))?;
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits
        .parse()
        .map_err(|_| CrawlError::Parse(format!("record {i}: bad level {class:?}")))
}

fn check_rank_order(ranks: impl Iterator<Item = u64>) -> Result<()> {
    let mut prev = 0;
    for rank in ranks {
        if rank <= prev {
            return Err(CrawlError::Parse(format!(
                "rank {rank} does not follow {prev}"
            )));
        }
        prev = rank;
    }
    Ok(())
}

/// Counters may carry thousands separators.
pub(crate) fn parse_count(raw: &str) -> Option<u64> {
    let digits: String = raw.trim().chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}

pub(crate) fn text_of(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn missing(field: &str, i: usize) -> CrawlError {
    CrawlError::Parse(format!("record {i}: missing {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::GBK;

    fn row(rank: u64, name: &str, level: &str, exp: u64, vip: bool) -> String {
        let vip = if vip { " drl_item_vip" } else { "" };
        format!(
            r#"<tr class="drl_list_item">
                <td class="drl_item_index">{rank}</td>
                <td class="drl_item_card{vip}"><a href="/home/main?un={name}">{name}</a></td>
                <td class="drl_item_title"><div class="{level}"></div></td>
                <td class="drl_item_exp">{exp}</td>
            </tr>"#
        )
    }

    fn page(rows: &[String]) -> Vec<u8> {
        let html = format!(
            r#"<html><body><span class="drl_info_txt_gray">1,234</span><table>{}</table></body></html>"#,
            rows.join("")
        );
        let (bytes, _, _) = GBK.encode(&html);
        bytes.into_owned()
    }

    #[test]
    fn parses_records_in_order() {
        let bytes = page(&[
            row(1, "旅行者", "bg_lv18", 90000, true),
            row(2, "派蒙", "bg_lv17", 80000, false),
            row(3, "alice", "bg_lv17", 79999, false),
        ]);
        let p = extract_page(1, &bytes, SITE_ENCODING).unwrap();
        assert_eq!(p.records.len(), 3);
        assert_eq!(p.total_members, Some(1234));
        assert_eq!(p.records[0].name, "旅行者");
        assert_eq!(p.records[0].link, "/home/main?un=旅行者");
        assert!(p.records[0].patron);
        assert!(!p.records[1].patron);
        assert_eq!(p.records[1].level, 17);
        assert_eq!(p.records[2].exp, 79999);
        assert!(p.records.windows(2).all(|w| w[0].rank < w[1].rank));
    }

    #[test]
    fn missing_level_marker_rejects_whole_page() {
        let bytes = page(&[
            row(1, "a", "bg_lv18", 10, false),
            row(2, "b", "bg_18", 9, false),
        ]);
        let err = extract_records(&bytes, SITE_ENCODING).unwrap_err();
        assert!(matches!(err, CrawlError::Parse(_)));
    }

    #[test]
    fn missing_link_is_a_parse_error() {
        let html = r#"<table><tr class="drl_list_item">
            <td class="drl_item_index">1</td>
            <td class="drl_item_card">nobody</td>
            <td class="drl_item_title"><div class="bg_lv3"></div></td>
            <td class="drl_item_exp">5</td></tr></table>"#;
        let err = extract_records(html.as_bytes(), SITE_ENCODING).unwrap_err();
        assert!(err.to_string().contains("missing link"));
    }

    #[test]
    fn descending_ranks_rejected() {
        let bytes = page(&[row(5, "a", "lv3", 1, false), row(4, "b", "lv3", 1, false)]);
        assert!(extract_records(&bytes, SITE_ENCODING).is_err());
    }

    #[test]
    fn rank_levels_projection() {
        let bytes = page(&[row(41, "a", "bg_lv12", 1, false), row(42, "b", "bg_lv9", 1, false)]);
        let out = extract_rank_levels(&bytes, SITE_ENCODING).unwrap();
        assert_eq!(out, vec![RankLevel { rank: 41, level: 12 }, RankLevel { rank: 42, level: 9 }]);
    }

    #[test]
    fn empty_page_yields_no_records() {
        let bytes = page(&[]);
        let p = extract_page(9999, &bytes, SITE_ENCODING).unwrap();
        assert!(p.records.is_empty());
    }

    #[test]
    fn counts_with_separators() {
        assert_eq!(parse_count(" 12,345,678 "), Some(12_345_678));
        assert_eq!(parse_count("n/a"), None);
    }
}
