//! The persisted record of which race is currently active.

use {
    std::io::Write as _,
    tempfile::NamedTempFile,
    tokio::fs,
    crate::{
        column::Column,
        prelude::*,
        scoring::RaceKind,
    },
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: io::Error,
    },
    #[error("malformed race state file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)] Persist(#[from] tempfile::PersistError),
    #[error(transparent)] Serialize(#[from] serde_json::Error),
    #[error(transparent)] Task(#[from] tokio::task::JoinError),
}

trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T, Error>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T, Error> {
        self.map_err(|source| Error::Io { path: path.to_owned(), source })
    }
}

/// The race results are currently being recorded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ActiveRace {
    pub(crate) name: String,
    pub(crate) kind: RaceKind,
    /// Column of this race in the pilots tab, if it was allocated when the race was set.
    pub(crate) pilots_column: Option<Column>,
    /// Column of this race in the teams tab, if it was allocated when the race was set.
    pub(crate) teams_column: Option<Column>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "StateFile", into = "StateFile")]
pub(crate) struct RaceState {
    pub(crate) current: Option<ActiveRace>,
}

#[derive(Deserialize, Serialize)]
struct RaceRecord {
    nome: String,
    tipo: RaceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    col_piloti: Option<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    col_team: Option<Column>,
}

/// On-disk layouts. Files are always written nested; flat files from older deployments are still read.
#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum StateFile {
    Nested {
        current_race: Option<RaceRecord>,
    },
    Flat {
        current_race: Option<String>,
        #[serde(default)]
        current_type: RaceKind,
    },
}

impl From<StateFile> for RaceState {
    fn from(file: StateFile) -> Self {
        Self {
            current: match file {
                StateFile::Nested { current_race } => current_race.map(|RaceRecord { nome, tipo, col_piloti, col_team }| ActiveRace {
                    name: nome,
                    kind: tipo,
                    pilots_column: col_piloti,
                    teams_column: col_team,
                }),
                StateFile::Flat { current_race, current_type } => current_race.map(|name| ActiveRace {
                    name,
                    kind: current_type,
                    pilots_column: None,
                    teams_column: None,
                }),
            },
        }
    }
}

impl From<RaceState> for StateFile {
    fn from(state: RaceState) -> Self {
        Self::Nested {
            current_race: state.current.map(|ActiveRace { name, kind, pilots_column, teams_column }| RaceRecord {
                nome: name,
                tipo: kind,
                col_piloti: pilots_column,
                col_team: teams_column,
            }),
        }
    }
}

/// A JSON file holding the [`RaceState`].
#[derive(Debug, Clone)]
pub(crate) struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the state file. A missing file means no race has been set yet.
    pub(crate) async fn load(&self) -> Result<RaceState, Error> {
        match fs::read(&self.path).await {
            Ok(buf) => serde_json::from_slice(&buf).map_err(|source| Error::Json { path: self.path.clone(), source }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RaceState::default()),
            Err(e) => Err(e).at(&self.path),
        }
    }

    /// Replaces the state file. Readers see either the old or the new record, never a partial one.
    pub(crate) async fn save(&self, state: &RaceState) -> Result<(), Error> {
        let buf = serde_json::to_vec_pretty(state)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), Error> {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let mut file = NamedTempFile::new_in(dir).at(dir)?;
            file.write_all(&buf).at(file.path())?;
            file.as_file().sync_all().at(file.path())?;
            file.persist(&path)?;
            Ok(())
        }).await?
    }
}
