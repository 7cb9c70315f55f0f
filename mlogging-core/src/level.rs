use std::{fmt, str::FromStr};

use colored::{ColoredString, Colorize};

use crate::error::MloggingError;

/// Severity of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    pub fn colored(self) -> ColoredString {
        match self {
            Level::Debug => self.as_str().blue(),
            Level::Info => self.as_str().green(),
            Level::Warning => self.as_str().yellow(),
            Level::Error => self.as_str().red(),
            Level::Critical => self.as_str().red().bold(),
        }
    }

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = MloggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" | "fatal" => Ok(Level::Critical),
            _ => Err(MloggingError::InvalidLevelName(s.into())),
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warning,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }
}

/// Allow-list of levels a logger emits.
///
/// This is not a threshold: a set holding `Warning` and `Debug` drops
/// `Info`, `Error` and `Critical` records.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LevelSet(u8);

/// Every level, like an empty level list.
impl Default for LevelSet {
    fn default() -> Self {
        Self::all()
    }
}

impl LevelSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self(Level::ALL.into_iter().fold(0, |bits, level| bits | level.bit()))
    }

    /// An empty iterator means every level.
    pub fn from_levels<I: IntoIterator<Item = Level>>(levels: I) -> Self {
        match levels.into_iter().fold(0, |bits, level| bits | level.bit()) {
            0 => Self::all(),
            bits => Self(bits),
        }
    }

    /// Builds a set from level names.
    ///
    /// `all` expands to every level right here. Unknown names are dropped.
    /// An empty list means `all`, but a list made only of unknown names
    /// accepts nothing.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen_any = false;
        let mut set = Self::empty();
        for name in names {
            seen_any = true;
            let name = name.as_ref();
            if name.trim().eq_ignore_ascii_case("all") {
                return Self::all();
            }
            if let Ok(level) = name.parse::<Level>() {
                set.insert(level);
            }
        }
        if seen_any { set } else { Self::all() }
    }

    pub fn insert(&mut self, level: Level) {
        self.0 |= level.bit();
    }

    pub fn accepts(&self, level: Level) -> bool {
        self.0 & level.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Level> + '_ {
        Level::ALL.into_iter().filter(|level| self.accepts(*level))
    }
}

impl FromIterator<Level> for LevelSet {
    fn from_iter<I: IntoIterator<Item = Level>>(iter: I) -> Self {
        Self::from_levels(iter)
    }
}

impl fmt::Debug for LevelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_expands_to_every_level() {
        let set = LevelSet::from_names(["all"]);
        assert_eq!(set.iter().collect::<Vec<_>>(), Level::ALL.to_vec());
        assert_eq!(set, LevelSet::all());
    }

    #[test]
    fn test_membership_not_threshold() {
        let set = LevelSet::from_names(["warning", "debug"]);
        for level in Level::ALL {
            let expected = matches!(level, Level::Warning | Level::Debug);
            assert_eq!(set.accepts(level), expected, "{level}");
        }
    }

    #[test]
    fn test_accepts_matches_membership_for_every_subset() {
        for bits in 1u8..32 {
            let members: Vec<Level> = Level::ALL
                .into_iter()
                .filter(|level| bits & (1 << *level as u8) != 0)
                .collect();
            let set = LevelSet::from_levels(members.iter().copied());
            for level in Level::ALL {
                assert_eq!(set.accepts(level), members.contains(&level));
            }
        }
    }

    #[test]
    fn test_invalid_names_are_dropped() {
        let set = LevelSet::from_names(["INFO", "verbose", "Error"]);
        assert_eq!(set, LevelSet::from_levels([Level::Info, Level::Error]));
    }

    #[test]
    fn test_empty_list_means_all() {
        assert_eq!(LevelSet::from_names(Vec::<&str>::new()), LevelSet::all());
        assert_eq!(LevelSet::from_levels(Vec::new()), LevelSet::all());
        assert!(LevelSet::from_names(["nope"]).is_empty());
    }

    #[test]
    fn test_default_accepts_everything() {
        assert_eq!(LevelSet::default(), LevelSet::all());
        assert!(Level::ALL.into_iter().all(|level| LevelSet::default().accepts(level)));
        assert!(LevelSet::empty().is_empty());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!(" CRITICAL ".parse::<Level>().unwrap(), Level::Critical);
        assert!(matches!(
            "loud".parse::<Level>(),
            Err(MloggingError::InvalidLevelName(name)) if name == "loud"
        ));
    }

    #[test]
    fn test_from_log_level() {
        assert_eq!(Level::from(log::Level::Warn), Level::Warning);
        assert_eq!(Level::from(log::Level::Trace), Level::Debug);
    }
}
