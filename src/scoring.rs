use crate::prelude::*;

pub(crate) const RACE_POINTS: [u32; 10] = [25, 18, 15, 12, 10, 8, 6, 4, 2, 1];
pub(crate) const SPRINT_POINTS: [u32; 8] = [8, 7, 6, 5, 4, 3, 2, 1];

/// The scoring mode of a race.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) enum RaceKind {
    #[default]
    #[serde(rename = "GARA", alias = "RACE")]
    Race,
    #[serde(rename = "SPRINT")]
    Sprint,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown race type {0:?}")]
pub(crate) struct UnknownRaceKind(String);

impl RaceKind {
    pub(crate) fn points_table(self) -> &'static [u32] {
        match self {
            Self::Race => &RACE_POINTS,
            Self::Sprint => &SPRINT_POINTS,
        }
    }

    /// Points for a 1-based finishing position. Positions outside the table score nothing.
    pub(crate) fn points(self, position: u32) -> u32 {
        points(self.points_table(), position)
    }
}

pub(crate) fn points(table: &[u32], position: u32) -> u32 {
    position.checked_sub(1)
        .and_then(|idx| table.get(usize::try_from(idx).ok()?))
        .copied()
        .unwrap_or(0)
}

/// Formats a point total, without a fractional part when it has none.
pub(crate) fn format_points(points: f64) -> String {
    if points.fract() == 0.0 && points.abs() < 1e15 {
        format!("{}", points as i64)
    } else {
        points.to_string()
    }
}

impl FromStr for RaceKind {
    type Err = UnknownRaceKind;

    fn from_str(s: &str) -> Result<Self, UnknownRaceKind> {
        match &*s.trim().to_lowercase() {
            "race" | "gara" => Ok(Self::Race),
            "sprint" => Ok(Self::Sprint),
            _ => Err(UnknownRaceKind(s.to_owned())),
        }
    }
}

impl fmt::Display for RaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Race => write!(f, "Race"),
            Self::Sprint => write!(f, "Sprint"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_in_table_score_table_value() {
        for (idx, &expected) in RACE_POINTS.iter().enumerate() {
            assert_eq!(RaceKind::Race.points(idx as u32 + 1), expected);
        }
        for (idx, &expected) in SPRINT_POINTS.iter().enumerate() {
            assert_eq!(RaceKind::Sprint.points(idx as u32 + 1), expected);
        }
    }

    #[test]
    fn positions_outside_table_score_zero() {
        assert_eq!(RaceKind::Race.points(11), 0);
        assert_eq!(RaceKind::Sprint.points(9), 0);
        assert_eq!(RaceKind::Race.points(u32::MAX), 0);
        assert_eq!(RaceKind::Race.points(0), 0);
    }

    #[test]
    fn points_format_without_trailing_zero() {
        assert_eq!(format_points(43.0), "43");
        assert_eq!(format_points(12.5), "12.5");
        assert_eq!(format_points(0.0), "0");
    }

    #[test]
    fn command_choices_parse() {
        assert_eq!("race".parse::<RaceKind>().unwrap(), RaceKind::Race);
        assert_eq!("GARA".parse::<RaceKind>().unwrap(), RaceKind::Race);
        assert_eq!(" Sprint ".parse::<RaceKind>().unwrap(), RaceKind::Sprint);
        assert!("feature".parse::<RaceKind>().is_err());
    }
}
