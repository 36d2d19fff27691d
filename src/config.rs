#[cfg(unix)] use xdg::BaseDirectories;
use {
    std::env,
    serenity::model::id::ChannelId,
    tokio::fs,
    yup_oauth2::ServiceAccountKey,
    crate::{
        column::Column,
        prelude::*,
    },
};

const CONFIG_FILE_NAME: &str = "race-results-bot.json";

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("missing environment variable {0}")]
    Env(&'static str),
    #[error("malformed config file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: io::Error,
    },
    #[error("no {CONFIG_FILE_NAME} found in the config directories and no --config given")]
    Missing,
    #[error("malformed GOOGLE_SERVICE_ACCOUNT_JSON: {0}")]
    ServiceAccountKey(io::Error),
}

/// Where in the spreadsheet each race's points go.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum ColumnLayout {
    /// Every race has a column assigned in advance. Races not listed here are rejected.
    Fixed(BTreeMap<String, Column>),
    /// Each new race takes the first free header column in both tabs.
    #[serde(rename_all = "camelCase")]
    Dynamic {
        #[serde(default = "default_header_row")]
        header_row: u32,
        pilots_start: Column,
        pilots_end: Column,
        teams_start: Column,
        teams_end: Column,
    },
}

impl ColumnLayout {
    /// The preassigned pilots column of a race, looked up by its upper-cased name.
    pub(crate) fn fixed_column(&self, race_name: &str) -> Option<Column> {
        match self {
            Self::Fixed(columns) => columns.iter()
                .find(|(name, _)| name.trim().to_uppercase() == race_name)
                .map(|(_, &column)| column),
            Self::Dynamic { .. } => None,
        }
    }
}

fn default_header_row() -> u32 { 1 }
fn default_pilots_tab() -> String { format!("RISULTATI LG F1") }
fn default_teams_tab() -> String { format!("Scuderie") }

/// The non-secret part of the configuration, read from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Layout {
    pub(crate) results_channel: ChannelId,
    pub(crate) standings_channel: ChannelId,
    #[serde(default = "default_pilots_tab")]
    pub(crate) pilots_tab: String,
    #[serde(default = "default_teams_tab")]
    pub(crate) teams_tab: String,
    pub(crate) columns: ColumnLayout,
}

impl Layout {
    pub(crate) async fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = match path {
            Some(path) => path.to_owned(),
            None => Self::default_path().ok_or(Error::Missing)?,
        };
        let buf = match fs::read(&path).await {
            Ok(buf) => buf,
            Err(source) => return Err(Error::Io { path, source }),
        };
        serde_json::from_slice(&buf).map_err(|source| Error::Json { path, source })
    }

    fn default_path() -> Option<PathBuf> {
        #[cfg(unix)] {
            BaseDirectories::new().find_config_file(CONFIG_FILE_NAME)
        }
        #[cfg(not(unix))] {
            Some(Path::new("cfg").join(CONFIG_FILE_NAME))
        }
    }
}

#[derive(Clone)]
pub(crate) struct Config {
    pub(crate) discord_token: String,
    pub(crate) spreadsheet_id: String,
    pub(crate) service_account_key: ServiceAccountKey,
    pub(crate) layout: Layout,
}

fn required_var(name: &'static str) -> Result<String, Error> {
    env::var(name).ok().filter(|value| !value.trim().is_empty()).ok_or(Error::Env(name))
}

impl Config {
    /// Reads secrets from the environment and the layout from `layout_path` or the default config location.
    pub(crate) async fn load(layout_path: Option<&Path>) -> Result<Self, Error> {
        let discord_token = required_var("DISCORD_TOKEN")?;
        let spreadsheet_id = required_var("SPREADSHEET_ID")?;
        let service_account_key = yup_oauth2::parse_service_account_key(required_var("GOOGLE_SERVICE_ACCOUNT_JSON")?)
            .map_err(Error::ServiceAccountKey)?;
        let layout = Layout::load(layout_path).await?;
        Ok(Self { discord_token, spreadsheet_id, service_account_key, layout })
    }
}
