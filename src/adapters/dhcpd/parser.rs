use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Lease, LeaseSnapshot};

/// Layout of `starts`/`ends`/`cltt` values after the weekday digit
const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// A statement the grammar could not apply. Never fatal: the statement is
/// skipped and the scan continues.
#[derive(Debug, Error)]
pub enum ParseWarning {
    #[error("`{keyword}` statement is missing a value")]
    MissingToken { keyword: String },

    #[error("invalid `{field}` timestamp `{value}`: {source}")]
    InvalidTimestamp {
        field: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("`{keyword}` statement outside of a lease block")]
    NoCurrentLease { keyword: String },

    #[error("unrecognized statement `{0}`")]
    UnknownKeyword(String),

    #[error("unrecognized variable `{0}`")]
    UnknownVariable(String),
}

impl ParseWarning {
    /// Warnings that are only interesting when tracing the grammar
    pub fn is_verbose(&self) -> bool {
        matches!(self, Self::UnknownKeyword(_) | Self::UnknownVariable(_))
    }
}

pub type ParseResult<T> = Result<T, ParseWarning>;

/// Split one physical line into statements.
///
/// Statements end at `;`, and `{`/`}` delimit blocks, except inside quoted
/// strings. A `#` at the start of a statement comments out the rest of the
/// line. One-statement-per-line files (what dhcpd writes) come out as one
/// statement per line; compact one-line blocks are split apart.
pub fn split_statements(line: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if in_quotes {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quotes = false;
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            '#' if line[start..i].trim().is_empty() => {
                statements.push(&line[i..]);
                start = line.len();
                break;
            }
            ';' => {
                statements.push(&line[start..i]);
                start = i + 1;
            }
            '{' => {
                statements.push(&line[start..=i]);
                start = i + 1;
            }
            '}' => {
                statements.push(&line[start..i]);
                statements.push(&line[i..=i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if start < line.len() {
        statements.push(&line[start..]);
    }

    statements
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn token<'a>(tokens: &[&'a str], index: usize, keyword: &str) -> ParseResult<&'a str> {
    tokens
        .get(index)
        .copied()
        .filter(|t| *t != "{")
        .ok_or_else(|| ParseWarning::MissingToken {
            keyword: keyword.to_string(),
        })
}

fn unquote(value: &str) -> String {
    value.trim_matches(|c| c == '"' || c == ' ').to_string()
}

/// Parse `<keyword> <weekday> YYYY/MM/DD HH:MM:SS`, or `<keyword> never`
pub fn parse_timestamp(tokens: &[&str]) -> ParseResult<NaiveDateTime> {
    let keyword = tokens.first().copied().unwrap_or_default();

    if tokens.get(1) == Some(&"never") {
        return Ok(NaiveDateTime::MAX);
    }

    let date = token(tokens, 2, keyword)?;
    let time = token(tokens, 3, keyword)?;
    let value = format!("{} {}", date, time);

    NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT).map_err(|source| {
        ParseWarning::InvalidTimestamp {
            field: keyword.to_string(),
            value,
            source,
        }
    })
}

/// The state word of `binding state X`, `next binding state X` or
/// `rewind binding state X`
fn binding_state<'a>(tokens: &[&'a str]) -> ParseResult<&'a str> {
    let keyword = tokens.first().copied().unwrap_or_default();
    match tokens.iter().position(|t| *t == "state") {
        Some(i) => token(tokens, i + 1, keyword),
        None => token(tokens, 2, keyword),
    }
}

/// Parse `set <name> = "<value>"` into its name and unquoted value
pub fn parse_set<'a>(statement: &'a str, tokens: &[&'a str]) -> ParseResult<(&'a str, String)> {
    let name = token(tokens, 1, "set")?;
    let (_, value) = statement
        .split_once('=')
        .ok_or_else(|| ParseWarning::MissingToken {
            keyword: "set".to_string(),
        })?;
    Ok((name, unquote(value)))
}

/// Scratch state for one parse pass.
///
/// Leases are inserted into the mapping as soon as their block opens; the
/// cursor is the key of the block currently being filled and is cleared
/// when that block closes. Blocks other than `lease` (`host`, `failover
/// peer`, ...) are skipped whole.
#[derive(Debug, Default)]
pub struct LeaseParser {
    debug: bool,
    leases: HashMap<String, Lease>,
    current: Option<String>,
    skip_depth: usize,
    warnings: usize,
}

impl LeaseParser {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Default::default()
        }
    }

    /// Feed one raw line of the leases file. Warnings are logged and
    /// counted, never propagated.
    pub fn feed(&mut self, line: &str) {
        if self.debug {
            debug!("read: {}", line);
        }

        for statement in split_statements(line) {
            if let Err(warning) = self.apply(statement) {
                self.warnings += 1;
                if !warning.is_verbose() {
                    warn!("Skipping `{}`: {}", statement, warning);
                } else if self.debug {
                    debug!("Skipping `{}`: {}", statement, warning);
                }
            }
        }
    }

    /// Apply a single statement to the scratch state
    pub fn apply(&mut self, statement: &str) -> ParseResult<()> {
        let statement = statement.trim().trim_end_matches(';').trim_end();
        let tokens: Vec<&str> = statement.split_whitespace().collect();
        let Some(&keyword) = tokens.first() else {
            return Ok(());
        };
        let debug = self.debug;

        if self.skip_depth > 0 {
            if statement.ends_with('{') {
                self.skip_depth += 1;
            } else if keyword == "}" {
                self.skip_depth -= 1;
            }
            return Ok(());
        }

        match keyword {
            "lease" => {
                self.current = None;
                let client = token(&tokens, 1, keyword)?;
                if debug {
                    debug!("Lease block begins for `{}`", client);
                }
                self.leases.insert(client.to_string(), Lease::new());
                self.current = Some(client.to_string());
            }

            "client-hostname" => {
                let lease = self.current_lease(keyword)?;
                token(&tokens, 1, keyword)?;
                let name = unquote(&tokens[1..].join(" "));
                if debug {
                    debug!("  hostname: `{}`", name);
                }
                lease.hostname = Some(name);
            }

            "starts" | "ends" | "cltt" => {
                let lease = self.current_lease(keyword)?;
                let time = parse_timestamp(&tokens)?;
                if debug {
                    debug!("  {}: `{}`", keyword, time);
                }
                match keyword {
                    "starts" => lease.starts = Some(time),
                    "ends" => lease.ends = Some(time),
                    _ => lease.cltt = Some(time),
                }
            }

            "binding" | "next" | "rewind" => {
                let lease = self.current_lease(keyword)?;
                let state = binding_state(&tokens)?.to_string();
                if debug {
                    debug!("  {} state: `{}`", keyword, state);
                }
                match keyword {
                    "binding" => lease.binding_state = Some(state),
                    "next" => lease.next_binding_state = Some(state),
                    _ => lease.rewind_binding_state = Some(state),
                }
            }

            "hardware" => {
                let lease = self.current_lease(keyword)?;
                let kind = token(&tokens, 1, keyword)?;
                let address = token(&tokens, 2, keyword)?;
                if debug {
                    debug!("  hardware: `{}`/`{}`", kind, address);
                }
                lease.hardware_type = Some(kind.to_string());
                lease.hardware_address = Some(address.to_string());
            }

            "uid" => {
                let lease = self.current_lease(keyword)?;
                let uid = token(&tokens, 1, keyword)?;
                if debug {
                    debug!("  uid: `{}`", uid);
                }
                lease.uid = Some(uid.to_string());
            }

            "set" => {
                let lease = self.current_lease(keyword)?;
                let (name, value) = parse_set(statement, &tokens)?;
                if debug {
                    debug!("  {}: `{}`", name, value);
                }
                match name {
                    "ddns-fwd-name" => lease.ddns_fwd_name = Some(value),
                    "ddns-rev-name" => lease.ddns_rev_name = Some(value),
                    "ddns-dhcid" => lease.ddns_dhcid = Some(value),
                    "vendor-class-identifier" => lease.vendor_class_identifier = Some(value),
                    other => return Err(ParseWarning::UnknownVariable(other.to_string())),
                }
            }

            "}" => self.current = None,

            "authoring-byte-order" | "server-duid" => {}

            // Failover protocol bookkeeping
            "tstp" | "tsfp" | "atsfp" => {}

            comment if comment.starts_with('#') => {}

            other => {
                if statement.ends_with('{') {
                    self.skip_depth = 1;
                }
                return Err(ParseWarning::UnknownKeyword(other.to_string()));
            }
        }

        Ok(())
    }

    fn current_lease(&mut self, keyword: &str) -> ParseResult<&mut Lease> {
        let lease = match self.current.as_deref() {
            Some(client) => self.leases.get_mut(client),
            None => None,
        };

        lease.ok_or_else(|| ParseWarning::NoCurrentLease {
            keyword: keyword.to_string(),
        })
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    /// Classify the scratch mapping against `now` and hand it over as a
    /// snapshot
    pub fn finish(self, now: NaiveDateTime, modified: Option<DateTime<Utc>>) -> LeaseSnapshot {
        LeaseSnapshot::classify(self.leases, now, modified, self.warnings)
    }
}
