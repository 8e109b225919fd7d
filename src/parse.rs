//! Rankings page extraction.
//!
//! Every field is read through a [`Cascade`]: an ordered list of [`FieldStrategy`]s tried until one
//! produces text. Structural breaks the cascade can't absorb are caught by the row count check in [`Extractor::extract`].

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::model::RawRow;
use crate::normalize::parse_value;
use crate::{Error, Result, MIN_PLAUSIBLE_ROWS};

/// One way of reading a field out of a candidate row.
pub trait FieldStrategy: Send + Sync {
    fn extract(&self, node: ElementRef<'_>) -> Option<String>;
}

/// Whitespace normalized text of the first descendant matching the selector.
pub struct Text(Selector);

impl Text {
    pub fn new(sel_str: &str) -> Result<Self> {
        Ok(Self(create_selector(sel_str)?))
    }
}

impl FieldStrategy for Text {
    fn extract(&self, node: ElementRef<'_>) -> Option<String> {
        node.select(&self.0).map(element_text).find(|t| !t.is_empty())
    }
}

/// A `data-*` attribute read from the row itself or, failing that, its first descendant carrying it.
pub struct DataAttr {
    name: &'static str,
    holder: Selector,
}

impl DataAttr {
    pub fn new(name: &'static str) -> Result<Self> {
        Ok(Self {
            name,
            holder: create_selector(&format!("[{name}]"))?,
        })
    }
}

impl FieldStrategy for DataAttr {
    fn extract(&self, node: ElementRef<'_>) -> Option<String> {
        node.value()
            .attr(self.name)
            .or_else(|| node.select(&self.holder).find_map(|el| el.value().attr(self.name)))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    }
}

/// Ordered fallbacks for a single field.
pub struct Cascade {
    field: &'static str,
    strategies: Vec<Box<dyn FieldStrategy>>,
}

impl Cascade {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, strategy: impl FieldStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn extract(&self, node: ElementRef<'_>) -> Option<String> {
        let found = self
            .strategies
            .iter()
            .enumerate()
            .find_map(|(i, s)| s.extract(node).map(|v| (i, v)));
        if let Some((i, _)) = &found {
            if *i > 0 {
                debug!(field = self.field, strategy = *i, "field found through fallback");
            }
        }
        found.map(|(_, v)| v)
    }
}

/// Anchor carrying the player's name and link. A candidate without one is not a player row.
struct NameAnchor(Vec<Selector>);

impl NameAnchor {
    fn find<'a>(&self, node: ElementRef<'a>) -> Option<(String, Option<String>)> {
        self.0.iter().find_map(|sel| {
            node.select(sel).find_map(|a| {
                let name = element_text(a);
                (!name.is_empty()).then(|| (name, a.value().attr("href").map(String::from)))
            })
        })
    }
}

/// What a single document scan produced, before the plausibility check.
#[derive(Debug, Default)]
pub struct Scan {
    pub rows: Vec<RawRow>,
    pub candidates: usize,
    pub degraded: bool,
}

/// Extracts [`RawRow`]s from a rankings document.
pub struct Extractor {
    container: Selector,
    fallback_rows: Selector,
    name: NameAnchor,
    team: Cascade,
    position: Cascade,
    value: Cascade,
    rank: Cascade,
    min_rows: usize,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            container: create_selector("#rankings-page-rankings")?,
            fallback_rows: create_selector("div.onePlayer, div[data-player-row]")?,
            name: NameAnchor(vec![
                create_selector(".player-name a")?,
                create_selector("a.player-name")?,
                create_selector(r#"a[href*="/players/"]"#)?,
            ]),
            team: Cascade::new("team")
                .then(Text::new(".player-team")?)
                .then(Text::new(".team")?)
                .then(DataAttr::new("data-team")?),
            position: Cascade::new("position")
                .then(Text::new("p.position")?)
                .then(Text::new(".position")?)
                .then(DataAttr::new("data-position")?),
            value: Cascade::new("value")
                .then(Text::new(".value p")?)
                .then(Text::new(".value")?)
                .then(DataAttr::new("data-value")?),
            rank: Cascade::new("rank")
                .then(Text::new(".rank-number p")?)
                .then(Text::new(".rank-number")?)
                .then(DataAttr::new("data-rank")?),
            min_rows: MIN_PLAUSIBLE_ROWS,
        })
    }

    /// Overrides the minimum row count a document must yield to be trusted.
    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    /// Extracts rows and refuses documents that yield fewer than the minimum row count.
    pub fn extract(&self, html: &str) -> Result<Vec<RawRow>> {
        let scan = self.scan(html)?;
        if scan.rows.len() < self.min_rows {
            return Err(Error::Extraction {
                found: scan.rows.len(),
                minimum: self.min_rows,
            });
        }
        Ok(scan.rows)
    }

    /// Extracts rows without the plausibility check. A document with no rankings at all is empty.
    pub fn extract_lenient(&self, html: &str) -> Vec<RawRow> {
        match self.scan(html) {
            Ok(scan) => scan.rows,
            Err(e) => {
                debug!("treating document as empty: {e}");
                Vec::new()
            }
        }
    }

    pub fn scan(&self, html: &str) -> Result<Scan> {
        let doc = Html::parse_document(html);

        let container = doc.select(&self.container).next();
        let (candidates, degraded): (Vec<ElementRef>, bool) = match container {
            Some(container) => (
                container
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| el.value().name() == "div")
                    .collect(),
                false,
            ),
            None => {
                let rows: Vec<ElementRef> = doc.select(&self.fallback_rows).collect();
                if rows.is_empty() {
                    return Err(Error::MissingContainer);
                }
                warn!(rows = rows.len(), "rankings container missing, using fallback row selector");
                (rows, true)
            }
        };

        let mut scan = Scan {
            rows: Vec::with_capacity(candidates.len()),
            candidates: candidates.len(),
            degraded,
        };
        for candidate in candidates {
            if let Some(row) = self.read_row(candidate) {
                scan.rows.push(row);
            }
        }

        debug!(candidates = scan.candidates, rows = scan.rows.len(), "scanned document");
        Ok(scan)
    }

    fn read_row(&self, node: ElementRef<'_>) -> Option<RawRow> {
        // No name anchor means an ad slot or a header.
        let (name, href) = self.name.find(node)?;

        // The value is the row's integrity gate: missing, non-numeric or zero drops the row.
        let Some(value) = self.value.extract(node).filter(|v| parse_value(v).is_some()) else {
            debug!(name = %name, "row without a usable value, skipping");
            return None;
        };

        Some(RawRow {
            name,
            href,
            team: self.team.extract(node),
            position: self.position.extract(node),
            value,
            rank: self.rank.extract(node),
        })
    }
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::Selector(sel_str.into()))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary_row(
        rank: u32,
        name: &str,
        slug: &str,
        team: &str,
        pos: &str,
        value: &str,
    ) -> String {
        format!(
            r#"<div class="onePlayer">
                <div class="rank-number"><p>{rank}</p></div>
                <div class="player-name"><p><a href="/dynasty-rankings/players/{slug}">{name}</a></p>
                    <span class="player-team">{team}</span></div>
                <div class="position-team"><p class="position">{pos}</p></div>
                <div class="value"><p>{value}</p></div>
            </div>"#
        )
    }

    fn primary_doc(rows: &str) -> String {
        format!(r#"<html><body><div id="rankings-page-rankings">{rows}</div></body></html>"#)
    }

    #[test]
    fn compiles_every_selector() {
        assert!(Extractor::new().is_ok());
    }

    #[test]
    fn reads_primary_markup() {
        let doc = primary_doc(&primary_row(1, "Josh Allen", "josh-allen-1", "BUF", "QB1", "9,999"));
        let scan = Extractor::new().unwrap().scan(&doc).unwrap();
        assert!(!scan.degraded);
        assert_eq!(
            scan.rows,
            vec![RawRow {
                name: "Josh Allen".into(),
                href: Some("/dynasty-rankings/players/josh-allen-1".into()),
                team: Some("BUF".into()),
                position: Some("QB1".into()),
                value: "9,999".into(),
                rank: Some("1".into()),
            }]
        );
    }

    #[test]
    fn decorative_rows_are_skipped_silently() {
        let rows = format!(
            r#"<div class="ad-slot"><p>Sponsored</p></div>{}<div class="header"><span>Value</span></div>"#,
            primary_row(1, "Josh Allen", "josh-allen-1", "BUF", "QB1", "9,999")
        );
        let scan = Extractor::new().unwrap().scan(&primary_doc(&rows)).unwrap();
        assert_eq!(scan.candidates, 3);
        assert_eq!(scan.rows.len(), 1);
    }

    #[test]
    fn missing_optional_fields_stay_empty() {
        let row = r#"<div><div class="player-name"><a href="/players/x-1">X</a></div>
            <div class="value"><p>100</p></div></div>"#;
        let scan = Extractor::new().unwrap().scan(&primary_doc(row)).unwrap();
        assert_eq!(scan.rows[0].team, None);
        assert_eq!(scan.rows[0].position, None);
        assert_eq!(scan.rows[0].rank, None);
    }

    #[test]
    fn row_without_value_is_dropped() {
        let row = r#"<div><div class="player-name"><a href="/players/x-1">X</a></div></div>"#;
        let scan = Extractor::new().unwrap().scan(&primary_doc(row)).unwrap();
        assert_eq!(scan.candidates, 1);
        assert!(scan.rows.is_empty());
    }

    #[test]
    fn unusable_values_drop_the_row() {
        let rows: String = ["0", "n/a", "", "1,234"]
            .iter()
            .enumerate()
            .map(|(i, v)| primary_row(i as u32 + 1, "P", &format!("p-{i}"), "BUF", "WR", v))
            .collect();
        let scan = Extractor::new().unwrap().scan(&primary_doc(&rows)).unwrap();
        assert_eq!(scan.candidates, 4);
        assert_eq!(scan.rows.len(), 1);
        assert_eq!(scan.rows[0].value, "1,234");
    }

    #[test]
    fn data_attributes_are_the_last_resort() {
        let doc = r#"<html><body>
            <div class="onePlayer" data-team="KC" data-position="QB2" data-value="8,000" data-rank="2">
                <a class="player-name" href="/players/patrick-mahomes-1">Patrick Mahomes</a>
            </div></body></html>"#;
        let scan = Extractor::new().unwrap().scan(doc).unwrap();
        assert!(scan.degraded);
        let row = &scan.rows[0];
        assert_eq!(row.team.as_deref(), Some("KC"));
        assert_eq!(row.position.as_deref(), Some("QB2"));
        assert_eq!(row.value, "8,000");
        assert_eq!(row.rank.as_deref(), Some("2"));
    }

    #[test]
    fn document_without_rankings_is_a_hard_failure() {
        let err = Extractor::new().unwrap().scan("<html><body><p>Maintenance</p></body></html>");
        assert!(matches!(err, Err(Error::MissingContainer)));

        let rows = Extractor::new().unwrap().extract_lenient("<html></html>");
        assert!(rows.is_empty());
    }

    #[test]
    fn plausibility_gate_boundary() {
        let rows: String = (1..=5)
            .map(|i| primary_row(i, &format!("P {i}"), &format!("p-{i}"), "BUF", "WR", "100"))
            .collect();
        let doc = primary_doc(&rows);

        let ok = Extractor::new().unwrap().with_min_rows(5).extract(&doc);
        assert_eq!(ok.unwrap().len(), 5);

        let err = Extractor::new().unwrap().with_min_rows(6).extract(&doc);
        assert!(matches!(err, Err(Error::Extraction { found: 5, minimum: 6 })));
    }
}
