//! Utilities for working with Google Sheets.

use {
    yup_oauth2::{
        ServiceAccountAuthenticator,
        ServiceAccountKey,
        authenticator::DefaultAuthenticator,
    },
    crate::{
        column::Column,
        prelude::*,
    },
};

const SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// Sheet row of the first roster entry. Row 1 holds the headers.
pub(crate) const FIRST_DATA_ROW: u32 = 2;
const ROSTER_COLUMNS: &str = "A2:Z100";
const PILOT_STANDINGS_COLUMNS: &str = "C2:E100";
const TEAM_STANDINGS_COLUMNS: &str = "A2:B50";

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] OAuth(#[from] yup_oauth2::Error),
    #[error(transparent)] Reqwest(#[from] reqwest::Error),
    #[error("empty token is not valid")]
    EmptyToken,
    #[error("OAuth token is expired")]
    TokenExpired,
    #[error("Google Sheets returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("no empty header cell in '{tab}'!{start}{row}:{end}{row}")]
    NoFreeColumn {
        tab: String,
        row: u32,
        start: Column,
        end: Column,
    },
}

impl Error {
    /// A one-line description for chat replies. Response bodies are left out.
    pub(crate) fn summary(&self) -> String {
        match self {
            Self::Status { status, .. } => format!("Google Sheets returned {status}"),
            _ => self.to_string(),
        }
    }
}

/// Raw access to the values of one spreadsheet.
#[async_trait]
pub(crate) trait Spreadsheet: Send + Sync {
    /// Reads a range in A1 notation. Trailing empty cells and rows are omitted, as the Sheets API does.
    async fn values(&self, range: &str) -> Result<Vec<Vec<String>>, Error>;

    /// Overwrites a range in A1 notation, interpreting the values as if typed in by a user.
    async fn update_values(&self, range: &str, values: Vec<Vec<String>>) -> Result<(), Error>;
}

/// A [`Spreadsheet`] backed by the Sheets v4 REST API, authenticated as a service account.
pub(crate) struct SheetsClient {
    http_client: reqwest::Client,
    spreadsheet_id: String,
    /// Keeps the access token between requests and refreshes it when it expires.
    auth: DefaultAuthenticator,
}

impl SheetsClient {
    pub(crate) async fn new(http_client: reqwest::Client, spreadsheet_id: String, service_account_key: ServiceAccountKey) -> io::Result<Self> {
        let auth = ServiceAccountAuthenticator::builder(service_account_key).build().await?;
        Ok(Self { http_client, spreadsheet_id, auth })
    }

    async fn auth_token(&self) -> Result<String, Error> {
        let token = self.auth.token(SCOPES).await?;
        if token.is_expired() { return Err(Error::TokenExpired) }
        let Some(token) = token.token() else { return Err(Error::EmptyToken) };
        if token.is_empty() { return Err(Error::EmptyToken) }
        Ok(token.to_owned())
    }

    fn values_url(&self, range: &str) -> String {
        format!("https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}", self.spreadsheet_id, urlencoding::encode(range))
    }
}

async fn detailed_error_for_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::Status { status, body: response.text().await? })
    }
}

#[async_trait]
impl Spreadsheet for SheetsClient {
    async fn values(&self, range: &str) -> Result<Vec<Vec<String>>, Error> {
        #[derive(Deserialize)]
        struct ValueRange {
            #[serde(default)]
            values: Vec<Vec<String>>,
        }

        let token = self.auth_token().await?;
        let response = self.http_client.get(&self.values_url(range))
            .bearer_auth(token)
            .query(&[
                ("valueRenderOption", "FORMATTED_VALUE"),
                ("dateTimeRenderOption", "FORMATTED_STRING"),
                ("majorDimension", "ROWS"),
            ])
            .send().await?;
        let ValueRange { values } = detailed_error_for_status(response).await?
            .json().await?;
        Ok(values)
    }

    async fn update_values(&self, range: &str, values: Vec<Vec<String>>) -> Result<(), Error> {
        #[derive(Serialize)]
        struct ValueRange<'a> {
            range: &'a str,
            values: Vec<Vec<String>>,
        }

        let token = self.auth_token().await?;
        let response = self.http_client.put(&self.values_url(range))
            .bearer_auth(token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&ValueRange { range, values })
            .send().await?;
        detailed_error_for_status(response).await?;
        Ok(())
    }
}

/// Quotes a tab name for use in A1 notation.
fn quote_tab(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}

pub(crate) fn cell_range(tab: &str, column: Column, row: u32) -> String {
    format!("{}!{column}{row}", quote_tab(tab))
}

fn block_range(tab: &str, columns: &str) -> String {
    format!("{}!{columns}", quote_tab(tab))
}

/// The lookup key for a roster name: trimmed and lower-cased.
pub(crate) fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// One row of the pilots tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RosterEntry {
    /// 1-based sheet row.
    pub(crate) row: u32,
    pub(crate) platform: String,
    pub(crate) team: String,
    pub(crate) name: String,
    pub(crate) role: String,
}

/// Maps lookup keys to every sheet row carrying that name.
#[derive(Debug, Default)]
pub(crate) struct NameIndex {
    rows: HashMap<String, Vec<u32>>,
}

pub(crate) enum Lookup<'a> {
    Found(u32),
    NotFound,
    Ambiguous(&'a [u32]),
}

impl NameIndex {
    /// Builds an index from `(name, row)` pairs. Blank names are not indexed.
    pub(crate) fn new<'a>(names: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let mut rows = HashMap::<_, Vec<_>>::default();
        for (name, row) in names {
            let key = name_key(name);
            if key.is_empty() { continue }
            rows.entry(key).or_default().push(row);
        }
        Self { rows }
    }

    pub(crate) fn roster(roster: &[RosterEntry]) -> Self {
        Self::new(roster.iter().map(|entry| (&*entry.name, entry.row)))
    }

    pub(crate) fn lookup(&self, name: &str) -> Lookup<'_> {
        match self.rows.get(&name_key(name)).map(Vec::as_slice) {
            None | Some([]) => Lookup::NotFound,
            Some([row]) => Lookup::Found(*row),
            Some(rows) => Lookup::Ambiguous(rows),
        }
    }
}

fn cell(row: &[String], idx: usize) -> String {
    row.get(idx).cloned().unwrap_or_default()
}

/// Reads the pilots tab. Rows with a blank name keep their position.
pub(crate) async fn fetch_roster(sheet: &(impl Spreadsheet + ?Sized), pilots_tab: &str) -> Result<Vec<RosterEntry>, Error> {
    let values = sheet.values(&block_range(pilots_tab, ROSTER_COLUMNS)).await?;
    Ok(values.into_iter().zip(FIRST_DATA_ROW..).map(|(row, row_idx)| RosterEntry {
        row: row_idx,
        platform: cell(&row, 0),
        team: cell(&row, 1),
        name: cell(&row, 2),
        role: cell(&row, 3),
    }).collect())
}

/// Overwrites a single cell. Numeric strings are stored as numbers.
pub(crate) async fn write_cell(sheet: &(impl Spreadsheet + ?Sized), tab: &str, column: Column, row: u32, value: impl ToString) -> Result<(), Error> {
    sheet.update_values(&cell_range(tab, column, row), vec![vec![value.to_string()]]).await
}

/// Returns the first column in `start..=end` whose cell in `header_row` is blank.
pub(crate) async fn find_first_empty_column(sheet: &(impl Spreadsheet + ?Sized), tab: &str, header_row: u32, start: Column, end: Column) -> Result<Column, Error> {
    let values = sheet.values(&format!("{}!{start}{header_row}:{end}{header_row}", quote_tab(tab))).await?;
    let header = values.into_iter().next().unwrap_or_default();
    start.through(end)
        .zip(header.into_iter().map(Some).chain(iter::repeat(None)))
        .find(|(_, value)| value.as_deref().is_none_or(|value| value.trim().is_empty()))
        .map(|(column, _)| column)
        .ok_or_else(|| Error::NoFreeColumn { tab: tab.to_owned(), row: header_row, start, end })
}

/// Reads `rows` cells of one column starting at [`FIRST_DATA_ROW`]. Blank cells are `None`.
pub(crate) async fn fetch_column(sheet: &(impl Spreadsheet + ?Sized), tab: &str, column: Column, rows: usize) -> Result<Vec<Option<f64>>, Error> {
    let Some(last_row) = u32::try_from(rows).ok().filter(|&rows| rows > 0).map(|rows| FIRST_DATA_ROW + rows - 1) else { return Ok(Vec::default()) };
    let values = sheet.values(&format!("{}!{column}{FIRST_DATA_ROW}:{column}{last_row}", quote_tab(tab))).await?;
    Ok(values.into_iter()
        .map(|row| row.first().map(|value| value.trim()).filter(|value| !value.is_empty()).map(parse_total))
        .chain(iter::repeat(None))
        .take(rows)
        .collect())
}

/// A name with its formula-computed point total.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StandingsRow {
    pub(crate) row: u32,
    pub(crate) name: String,
    pub(crate) total: f64,
}

/// Parses a formatted total. Anything unparseable counts as zero.
fn parse_total(total: &str) -> f64 {
    let total = total.trim();
    total.parse::<f64>().ok()
        .or_else(|| if total.matches(',').count() == 1 && !total.contains('.') { total.replace(',', ".").parse().ok() } else { None })
        .filter(|total| total.is_finite())
        .unwrap_or(0.0)
}

fn standings_rows(values: Vec<Vec<String>>, total_idx: usize) -> Vec<StandingsRow> {
    values.into_iter().zip(FIRST_DATA_ROW..).filter_map(|(row, row_idx)| {
        let name = row.first()?.trim();
        if name.is_empty() { return None }
        Some(StandingsRow {
            row: row_idx,
            name: name.to_owned(),
            total: row.get(total_idx).map_or(0.0, |total| parse_total(total)),
        })
    }).collect()
}

/// Reads the team names and totals from the teams tab, in sheet order.
pub(crate) async fn fetch_team_standings(sheet: &(impl Spreadsheet + ?Sized), teams_tab: &str) -> Result<Vec<StandingsRow>, Error> {
    Ok(standings_rows(sheet.values(&block_range(teams_tab, TEAM_STANDINGS_COLUMNS)).await?, 1))
}

/// Reads pilot and team standings, in sheet order.
pub(crate) async fn fetch_standings(sheet: &(impl Spreadsheet + ?Sized), pilots_tab: &str, teams_tab: &str) -> Result<(Vec<StandingsRow>, Vec<StandingsRow>), Error> {
    let pilots = standings_rows(sheet.values(&block_range(pilots_tab, PILOT_STANDINGS_COLUMNS)).await?, 2);
    let teams = fetch_team_standings(sheet, teams_tab).await?;
    Ok((pilots, teams))
}

/// An in-memory spreadsheet for tests.
#[cfg(test)]
pub(crate) mod fake {
    use {
        std::sync::Mutex,
        super::*,
    };

    #[derive(Default)]
    struct Inner {
        tabs: HashMap<String, Vec<Vec<String>>>,
        writes: Vec<(String, String)>,
        reads: usize,
    }

    #[derive(Default)]
    pub(crate) struct FakeSheet {
        inner: Mutex<Inner>,
        failing_ranges: Vec<String>,
    }

    /// Parses `'Tab'!A1` or `'Tab'!A1:B2` into the tab name and zero-based corners.
    fn parse_range(range: &str) -> (String, (usize, usize), (usize, usize)) {
        let (tab, cells) = range.rsplit_once('!').expect("range without tab");
        let tab = tab.trim_matches('\'').replace("''", "'");
        let parse_cell = |cell: &str| {
            let split = cell.find(|c: char| c.is_ascii_digit()).expect("cell without row");
            let column = cell[..split].parse::<Column>().expect("bad column");
            let row = cell[split..].parse::<usize>().expect("bad row");
            (row - 1, column.index() as usize)
        };
        let (start, end) = cells.split_once(':').unwrap_or((cells, cells));
        (tab, parse_cell(start), parse_cell(end))
    }

    impl FakeSheet {
        /// Sets a tab's contents starting at cell A1.
        pub(crate) fn with_tab(self, tab: &str, rows: &[&[&str]]) -> Self {
            self.inner.lock().unwrap().tabs.insert(tab.to_owned(), rows.iter().map(|row| row.iter().map(|cell| (*cell).to_owned()).collect()).collect());
            self
        }

        /// Makes writes to this exact range fail.
        pub(crate) fn failing_on(mut self, range: &str) -> Self {
            self.failing_ranges.push(range.to_owned());
            self
        }

        /// Every successful single-cell write as `(range, value)`, in order.
        pub(crate) fn writes(&self) -> Vec<(String, String)> {
            self.inner.lock().unwrap().writes.clone()
        }

        pub(crate) fn reads(&self) -> usize {
            self.inner.lock().unwrap().reads
        }

        pub(crate) fn cell(&self, tab: &str, column: &str, row: usize) -> String {
            let column = column.parse::<Column>().unwrap().index() as usize;
            self.inner.lock().unwrap().tabs.get(tab)
                .and_then(|rows| rows.get(row - 1))
                .and_then(|cells| cells.get(column))
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl Spreadsheet for FakeSheet {
        async fn values(&self, range: &str) -> Result<Vec<Vec<String>>, Error> {
            let (tab, (top, left), (bottom, right)) = parse_range(range);
            let mut inner = self.inner.lock().unwrap();
            inner.reads += 1;
            let rows = inner.tabs.get(&tab).map(Vec::as_slice).unwrap_or_default();
            let mut values = (top..=bottom).map(|row_idx| {
                let mut row = (left..=right).map(|col_idx| rows.get(row_idx).and_then(|row| row.get(col_idx)).cloned().unwrap_or_default()).collect::<Vec<_>>();
                while row.last().is_some_and(String::is_empty) { row.pop(); }
                row
            }).collect::<Vec<_>>();
            while values.last().is_some_and(Vec::is_empty) { values.pop(); }
            Ok(values)
        }

        async fn update_values(&self, range: &str, values: Vec<Vec<String>>) -> Result<(), Error> {
            if self.failing_ranges.iter().any(|failing| failing == range) {
                return Err(Error::Status { status: reqwest::StatusCode::TOO_MANY_REQUESTS, body: format!("quota exceeded writing {range}") })
            }
            let (tab, (top, left), _) = parse_range(range);
            let mut inner = self.inner.lock().unwrap();
            let rows = inner.tabs.entry(tab).or_default();
            for (row_offset, row_values) in values.iter().enumerate() {
                for (col_offset, value) in row_values.iter().enumerate() {
                    let (row_idx, col_idx) = (top + row_offset, left + col_offset);
                    if rows.len() <= row_idx { rows.resize(row_idx + 1, Vec::default()); }
                    let row = &mut rows[row_idx];
                    if row.len() <= col_idx { row.resize(col_idx + 1, String::default()); }
                    row[col_idx] = value.clone();
                }
            }
            if let [row] = &*values {
                if let [value] = &**row {
                    inner.writes.push((range.to_owned(), value.clone()));
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{
            *,
            fake::FakeSheet,
        },
    };

    const PILOTS: &str = "RISULTATI LG F1";

    fn col(s: &str) -> Column {
        s.parse().unwrap()
    }

    fn roster_sheet() -> FakeSheet {
        FakeSheet::default().with_tab(PILOTS, &[
            &["Platform", "Team", "Pilot", "Role", "TOT"],
            &["PS5", "Red Bull", "Max Verstappen", "Driver", "43"],
            &[],
            &["PC", "Ferrari", "Ana", "Reserve"],
        ])
    }

    #[tokio::test]
    async fn roster_keeps_positions_of_blank_rows() {
        let roster = fetch_roster(&roster_sheet(), PILOTS).await.unwrap();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster[0].row, 2);
        assert_eq!(roster[0].team, "Red Bull");
        assert_eq!(roster[1].name, "");
        assert_eq!(roster[1].row, 3);
        assert_eq!(roster[2].row, 4);
        assert_eq!(roster[2].role, "Reserve");
    }

    #[tokio::test]
    async fn lookup_ignores_case_and_surrounding_whitespace() {
        let roster = fetch_roster(&roster_sheet(), PILOTS).await.unwrap();
        let index = NameIndex::roster(&roster);
        for name in [" Max Verstappen ", "max verstappen", "MAX VERSTAPPEN"] {
            assert!(matches!(index.lookup(name), Lookup::Found(2)), "{name:?}");
        }
        assert!(matches!(index.lookup(""), Lookup::NotFound));
        assert!(matches!(index.lookup("Lewis"), Lookup::NotFound));
    }

    #[test]
    fn duplicate_names_are_ambiguous() {
        let index = NameIndex::new([("Ana", 2), ("ana ", 5)]);
        assert!(matches!(index.lookup("ANA"), Lookup::Ambiguous([2, 5])));
    }

    #[tokio::test]
    async fn write_cell_targets_a_single_cell() {
        let sheet = roster_sheet();
        write_cell(&sheet, PILOTS, col("H"), 4, 18).await.unwrap();
        assert_eq!(sheet.writes(), [("'RISULTATI LG F1'!H4".to_owned(), "18".to_owned())]);
        assert_eq!(sheet.cell(PILOTS, "H", 4), "18");
    }

    #[tokio::test]
    async fn first_empty_column_is_first_blank_not_after_last_filled() {
        let sheet = FakeSheet::default().with_tab("T", &[&["X", "Y", "", "Z"]]);
        assert_eq!(find_first_empty_column(&sheet, "T", 1, col("A"), col("Z")).await.unwrap(), col("C"));
    }

    #[tokio::test]
    async fn first_empty_column_past_trailing_cells() {
        let sheet = FakeSheet::default().with_tab("T", &[&["X", "Y"]]);
        assert_eq!(find_first_empty_column(&sheet, "T", 1, col("B"), col("Z")).await.unwrap(), col("C"));
        let empty = FakeSheet::default();
        assert_eq!(find_first_empty_column(&empty, "T", 1, col("F"), col("Z")).await.unwrap(), col("F"));
    }

    #[tokio::test]
    async fn full_header_row_is_an_error() {
        let sheet = FakeSheet::default().with_tab("T", &[&["X", "Y", "Z"]]);
        assert!(matches!(
            find_first_empty_column(&sheet, "T", 1, col("A"), col("C")).await,
            Err(Error::NoFreeColumn { .. }),
        ));
    }

    #[tokio::test]
    async fn standings_coerce_bad_totals_to_zero() {
        let sheet = FakeSheet::default()
            .with_tab(PILOTS, &[
                &["", "", "Pilot", "", "TOT"],
                &["", "", "Max", "", "43"],
                &["", "", "Ana", "", "n/a"],
                &["", "", "Lee"],
                &["", "", "Kim", "", "12,5"],
            ])
            .with_tab("Scuderie", &[
                &["Team", "TOT"],
                &["Ferrari", "30"],
                &[],
                &["Red Bull", ""],
            ]);
        let (pilots, teams) = fetch_standings(&sheet, PILOTS, "Scuderie").await.unwrap();
        let pilots = pilots.iter().map(|row| (&*row.name, row.total)).collect::<Vec<_>>();
        assert_eq!(pilots, [("Max", 43.0), ("Ana", 0.0), ("Lee", 0.0), ("Kim", 12.5)]);
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[1].row, 4);
        assert_eq!(teams[1].total, 0.0);
    }

    #[test]
    fn summary_leaves_out_response_body() {
        let error = Error::Status { status: reqwest::StatusCode::TOO_MANY_REQUESTS, body: "x".repeat(5000) };
        assert_eq!(error.summary(), "Google Sheets returned 429 Too Many Requests");
        assert!(error.to_string().len() > 5000);
    }

    #[test]
    fn tab_names_are_quoted() {
        assert_eq!(cell_range("Bob's tab", col("A"), 1), "'Bob''s tab'!A1");
    }
}
