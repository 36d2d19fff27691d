//! The two state transitions driven from Discord: choosing the active race and recording its results.

use crate::{
    column::Column,
    config::{
        ColumnLayout,
        Layout,
    },
    context::App,
    results::{
        self,
        LineOutcome,
        Target,
    },
    scoring::RaceKind,
    sheets,
    state::{
        self,
        ActiveRace,
        RaceState,
    },
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Sheets(#[from] sheets::Error),
    #[error(transparent)] State(#[from] state::Error),
    #[error("race name is empty")]
    EmptyName,
    #[error("unknown race {0:?}")]
    UnknownRace(String),
}

impl Error {
    /// The reply for errors caused by what the user entered, as opposed to failures of the bot itself.
    pub(crate) fn validation_message(&self) -> Option<String> {
        match self {
            Self::EmptyName => Some(format!("Please enter the name of the race.")),
            Self::UnknownRace(name) => Some(format!("Race '{name}' not recognized.")),
            Self::Sheets(_) | Self::State(_) => None,
        }
    }
}

/// Makes `name` the active race, replacing whatever was active before.
///
/// With a fixed column layout the race must be listed in it. With a dynamic layout the race gets the first
/// free header column of both the pilots and the teams tab, and its name is written into both headers.
/// If the race can't be fully set up, headers written so far are cleared again.
pub(crate) async fn set_active_race(app: &App, name: &str, kind: RaceKind) -> Result<ActiveRace, Error> {
    let name = name.trim().to_uppercase();
    if name.is_empty() { return Err(Error::EmptyName) }
    let race = match app.layout.columns {
        ColumnLayout::Fixed(_) => {
            let Some(pilots_column) = app.layout.columns.fixed_column(&name) else { return Err(Error::UnknownRace(name)) };
            ActiveRace { name, kind, pilots_column: Some(pilots_column), teams_column: None }
        }
        ColumnLayout::Dynamic { header_row, pilots_start, pilots_end, teams_start, teams_end } => {
            let sheet = &*app.sheet;
            let pilots_column = sheets::find_first_empty_column(sheet, &app.layout.pilots_tab, header_row, pilots_start, pilots_end).await?;
            let teams_column = sheets::find_first_empty_column(sheet, &app.layout.teams_tab, header_row, teams_start, teams_end).await?;
            sheets::write_cell(sheet, &app.layout.pilots_tab, pilots_column, header_row, &name).await?;
            if let Err(e) = sheets::write_cell(sheet, &app.layout.teams_tab, teams_column, header_row, &name).await {
                clear_header(app, &app.layout.pilots_tab, pilots_column, header_row).await;
                return Err(e.into())
            }
            ActiveRace { name, kind, pilots_column: Some(pilots_column), teams_column: Some(teams_column) }
        }
    };
    if let Err(e) = app.state.save(&RaceState { current: Some(race.clone()) }).await {
        if let ColumnLayout::Dynamic { header_row, .. } = app.layout.columns {
            if let (Some(pilots_column), Some(teams_column)) = (race.pilots_column, race.teams_column) {
                clear_header(app, &app.layout.pilots_tab, pilots_column, header_row).await;
                clear_header(app, &app.layout.teams_tab, teams_column, header_row).await;
            }
        }
        return Err(e.into())
    }
    log::info!("current race is now {} ({})", race.name, race.kind);
    Ok(race)
}

/// Releases a header cell claimed by a race that could not be set.
async fn clear_header(app: &App, tab: &str, column: Column, row: u32) {
    if let Err(e) = sheets::write_cell(&*app.sheet, tab, column, row, "").await {
        log::error!("failed to clear header '{tab}'!{column}{row} of a race that could not be set: {e}");
    }
}

/// Where the points of `race` go, or `None` if it has no pilots column.
fn target<'a>(layout: &'a Layout, race: &ActiveRace) -> Option<Target<'a>> {
    let pilots_column = race.pilots_column.or_else(|| layout.columns.fixed_column(&race.name))?;
    Some(Target {
        kind: race.kind,
        pilots_tab: &layout.pilots_tab,
        pilots_column,
        teams: race.teams_column.map(|column| (&*layout.teams_tab, column)),
    })
}

pub(crate) enum ResultsOutcome {
    /// No race has been set, so nothing was read or written.
    NoActiveRace,
    Recorded(Vec<LineOutcome>),
}

/// Records the result lines of a message for the active race.
pub(crate) async fn record_results(app: &App, body: &str) -> Result<ResultsOutcome, Error> {
    let state = app.state.load().await?;
    let Some(target) = state.current.as_ref().and_then(|race| target(&app.layout, race)) else { return Ok(ResultsOutcome::NoActiveRace) };
    Ok(ResultsOutcome::Recorded(results::record(&*app.sheet, target, body).await?))
}
