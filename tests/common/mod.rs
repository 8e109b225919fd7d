#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rankscrape::request::{RawDocument, SourceClient};
use rankscrape::store::{MemoryStore, Row, Store};
use rankscrape::{Error, Result};

pub enum Reply {
    Doc(u16, String),
    Down,
}

/// Answers from a fixed url -> reply table and records every url it was asked for.
/// Unknown urls get a 404.
#[derive(Default)]
pub struct ScriptedSource {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.replies.insert(url.into(), Reply::Doc(200, body.into()));
        self
    }

    pub fn status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.replies.insert(url.into(), Reply::Doc(status, String::new()));
        self
    }

    pub fn down(mut self, url: impl Into<String>) -> Self {
        self.replies.insert(url.into(), Reply::Down);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceClient for ScriptedSource {
    async fn get(&self, url: &str) -> Result<RawDocument> {
        self.calls.lock().unwrap().push(url.to_string());
        let (status, body) = match self.replies.get(url) {
            Some(Reply::Doc(status, body)) => (*status, body.clone()),
            Some(Reply::Down) => return Err(Error::Transport(format!("{url}: timed out"))),
            None => (404, String::new()),
        };
        Ok(RawDocument {
            url: url.to_string(),
            status,
            body,
        })
    }
}

/// Memory store that rejects the upsert calls listed in `fail_calls` (0-based).
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_calls: Vec<usize>,
    calls: Mutex<usize>,
}

impl FlakyStore {
    pub fn failing(fail_calls: &[usize]) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_calls: fail_calls.to_vec(),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn upsert(&self, table: &str, rows: Vec<Row>, keys: &[&str]) -> Result<usize> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls - 1
        };
        if self.fail_calls.contains(&call) {
            return Err(Error::Store(format!("call {call} rejected")));
        }
        self.inner.upsert(table, rows, keys).await
    }
}

pub struct Player {
    pub rank: usize,
    pub name: String,
    pub slug: String,
    pub team: &'static str,
    pub position: String,
    pub value: usize,
}

pub fn players(first_rank: usize, count: usize) -> Vec<Player> {
    (first_rank..first_rank + count)
        .map(|rank| Player {
            rank,
            name: format!("Player {rank}"),
            slug: format!("player-{rank}"),
            team: if rank % 7 == 0 { "" } else { "BUF" },
            position: format!("WR{rank}"),
            value: 10_000 - rank,
        })
        .collect()
}

/// Current markup: rows are direct children of the rankings container.
pub fn primary_page(players: &[Player], decorative: usize) -> String {
    let mut rows = String::new();
    for (i, p) in players.iter().enumerate() {
        if i < decorative {
            rows.push_str(r#"<div class="ad-slot"><p>Advertisement</p></div>"#);
        }
        let team = if p.team.is_empty() {
            String::new()
        } else {
            format!(r#"<span class="player-team">{}</span>"#, p.team)
        };
        rows.push_str(&format!(
            r#"<div class="onePlayer">
                <div class="rank-number"><p>{rank}</p></div>
                <div class="player-name"><p><a href="/dynasty-rankings/players/{slug}">{name}</a></p>{team}</div>
                <div class="position-team"><p class="position">{pos}</p></div>
                <div class="value"><p>{value}</p></div>
            </div>"#,
            rank = p.rank,
            slug = p.slug,
            name = p.name,
            pos = p.position,
            value = with_separators(p.value),
        ));
    }
    format!(
        r#"<!DOCTYPE html><html><head><title>Rankings</title></head><body>
        <div id="rankings-page-rankings">{rows}</div></body></html>"#
    )
}

/// Older markup: no container, rows marked by data attributes, values in attributes.
pub fn fallback_page(players: &[Player]) -> String {
    let rows: String = players
        .iter()
        .map(|p| {
            let team = if p.team.is_empty() {
                String::new()
            } else {
                format!(r#" data-team="{}""#, p.team)
            };
            format!(
                r#"<div data-player-row="1"{team} data-value="{value}" data-rank="{rank}">
                    <a class="player-name" href="/dynasty-rankings/players/{slug}">{name}</a>
                    <span class="position">{pos}</span>
                </div>"#,
                rank = p.rank,
                slug = p.slug,
                name = p.name,
                pos = p.position,
                value = with_separators(p.value),
            )
        })
        .collect();
    format!(r#"<html><body><section class="rankings">{rows}</section></body></html>"#)
}

/// Same rows as [`fallback_page`], with every attribute list written in a different order.
pub fn reordered_fallback_page(players: &[Player]) -> String {
    let rows: String = players
        .iter()
        .map(|p| {
            let team = if p.team.is_empty() {
                String::new()
            } else {
                format!(r#"data-team="{}" "#, p.team)
            };
            format!(
                r#"<div data-rank="{rank}" data-value="{value}" {team}data-player-row="1">
                    <a href="/dynasty-rankings/players/{slug}" class="player-name">{name}</a>
                    <span class="position">{pos}</span>
                </div>"#,
                rank = p.rank,
                slug = p.slug,
                name = p.name,
                pos = p.position,
                value = with_separators(p.value),
            )
        })
        .collect();
    format!(r#"<html><body><section class="rankings">{rows}</section></body></html>"#)
}

pub fn empty_page() -> String {
    r#"<html><body><div id="rankings-page-rankings"></div></body></html>"#.to_string()
}

fn with_separators(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
