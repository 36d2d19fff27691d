//! Turning a results message into points in the spreadsheet.

use crate::{
    column::Column,
    prelude::*,
    scoring::{
        RaceKind,
        format_points,
    },
    sheets::{
        self,
        Lookup,
        NameIndex,
        RosterEntry,
        Spreadsheet,
    },
};

/// One `<position> <name>` line of a results message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResultLine {
    pub(crate) position: u32,
    pub(crate) name: String,
}

/// Parses a line of the form `<position> <name>`. Anything else, including position 0, yields `None`.
///
/// Positions too large for `u32` saturate, so they still score 0 instead of being dropped.
pub(crate) fn parse_line(line: &str) -> Option<ResultLine> {
    let (_, position, name) = regex_captures!(r"^\s*([0-9]+)\s+(.+)$", line)?;
    let position = match position.parse::<u32>() {
        Ok(0) => return None,
        Ok(position) => position,
        Err(_) => u32::MAX,
    };
    let name = name.trim();
    if name.is_empty() { return None }
    Some(ResultLine { position, name: name.to_owned() })
}

pub(crate) fn parse_message(body: &str) -> Vec<ResultLine> {
    body.lines().filter_map(|line| {
        let result = parse_line(line);
        if result.is_none() && !line.trim().is_empty() {
            log::debug!("skipping non-result line {line:?}");
        }
        result
    }).collect()
}

/// Where the points of the active race are written.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target<'a> {
    pub(crate) kind: RaceKind,
    pub(crate) pilots_tab: &'a str,
    pub(crate) pilots_column: Column,
    /// Teams tab and column receiving per-team sums, if the race has a team column.
    pub(crate) teams: Option<(&'a str, Column)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineStatus {
    Written { row: u32 },
    NotFound,
    /// More than one roster row carries this name, so nothing was written.
    Ambiguous { rows: Vec<u32> },
    WriteFailed { row: u32, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineOutcome {
    pub(crate) position: u32,
    pub(crate) name: String,
    pub(crate) points: u32,
    pub(crate) status: LineStatus,
}

/// Scores every result line of `body` and writes the points of each pilot found in the roster.
///
/// Failing to read the roster aborts the whole message. A failed cell write only affects its own line.
pub(crate) async fn record(sheet: &(impl Spreadsheet + ?Sized), target: Target<'_>, body: &str) -> Result<Vec<LineOutcome>, sheets::Error> {
    let lines = parse_message(body);
    let roster = sheets::fetch_roster(sheet, target.pilots_tab).await?;
    let index = NameIndex::roster(&roster);
    let mut outcomes = Vec::with_capacity(lines.len());
    for ResultLine { position, name } in lines {
        let points = target.kind.points(position);
        let status = match index.lookup(&name) {
            Lookup::Found(row) => match sheets::write_cell(sheet, target.pilots_tab, target.pilots_column, row, points).await {
                Ok(()) => {
                    log::info!("{name} (row {row}) scored {points} points");
                    LineStatus::Written { row }
                }
                Err(e) => {
                    log::error!("failed to write {points} points for {name} to row {row}: {e}");
                    LineStatus::WriteFailed { row, error: e.summary() }
                }
            },
            Lookup::NotFound => LineStatus::NotFound,
            Lookup::Ambiguous(rows) => LineStatus::Ambiguous { rows: rows.to_vec() },
        };
        outcomes.push(LineOutcome { position, name, points, status });
    }
    if let Some((teams_tab, teams_column)) = target.teams {
        if outcomes.iter().any(|outcome| matches!(outcome.status, LineStatus::Written { .. })) {
            if let Err(e) = record_team_points(sheet, target.pilots_tab, target.pilots_column, teams_tab, teams_column, &roster).await {
                log::error!("failed to update team points in '{teams_tab}'!{teams_column}: {e}");
            }
        }
    }
    Ok(outcomes)
}

/// Sums the race column of the pilots tab per team and writes each sum to the team's row.
///
/// The sum is taken over the whole column, so results split across several messages add up.
async fn record_team_points(sheet: &(impl Spreadsheet + ?Sized), pilots_tab: &str, pilots_column: Column, teams_tab: &str, teams_column: Column, roster: &[RosterEntry]) -> Result<(), sheets::Error> {
    let race_points = sheets::fetch_column(sheet, pilots_tab, pilots_column, roster.len()).await?;
    let mut totals = Vec::<(&str, f64)>::default();
    for (entry, points) in roster.iter().zip(race_points) {
        let team = entry.team.trim();
        let Some(points) = points else { continue };
        if team.is_empty() { continue }
        if let Some((_, total)) = totals.iter_mut().find(|(name, _)| sheets::name_key(name) == sheets::name_key(team)) {
            *total += points;
        } else {
            totals.push((team, points));
        }
    }
    let team_rows = sheets::fetch_team_standings(sheet, teams_tab).await?;
    let index = NameIndex::new(team_rows.iter().map(|row| (&*row.name, row.row)));
    for (team, total) in totals {
        match index.lookup(team) {
            Lookup::Found(row) => sheets::write_cell(sheet, teams_tab, teams_column, row, format_points(total)).await?,
            Lookup::NotFound => log::warn!("team {team:?} not found in '{teams_tab}'"),
            Lookup::Ambiguous(rows) => log::warn!("team {team:?} appears in several rows of '{teams_tab}': {rows:?}"),
        }
    }
    Ok(())
}

/// Discord's limit on the length of a message.
const MESSAGE_LIMIT: usize = 2000;

/// The replies confirming what was recorded, split on line boundaries to fit into Discord messages.
/// Empty if the message had no result lines.
pub(crate) fn acknowledgment(outcomes: &[LineOutcome]) -> Vec<String> {
    if outcomes.is_empty() { return Vec::default() }
    let mut chunks = Vec::default();
    let mut chunk = format!("Results recorded:");
    for LineOutcome { position, name, points, status } in outcomes {
        let status = match status {
            LineStatus::Written { row } => format!("row {row}"),
            LineStatus::NotFound => format!("NOT FOUND"),
            LineStatus::Ambiguous { rows } => format!("AMBIGUOUS: rows {}", rows.iter().join(", ")),
            LineStatus::WriteFailed { row, error } => format!("WRITE FAILED for row {row}: {error}"),
        };
        let mut line = format!("{position}) {name} -> {points} pt ({status})");
        if line.chars().count() > MESSAGE_LIMIT {
            line = line.chars().take(MESSAGE_LIMIT - 1).chain(iter::once('…')).collect();
        }
        if chunk.chars().count() + 1 + line.chars().count() > MESSAGE_LIMIT {
            chunks.push(std::mem::replace(&mut chunk, line));
        } else {
            chunk.push('\n');
            chunk.push_str(&line);
        }
    }
    chunks.push(chunk);
    chunks
}
