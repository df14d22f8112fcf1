use clap::{Arg, ArgAction, Command, builder::ValueParser};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Log levels indexed by verbosity count, quietest first.
pub const LEVELS: [Level; 5] = [
    Level::ERROR,
    Level::WARN,
    Level::INFO,
    Level::DEBUG,
    Level::TRACE,
];

/// Map a `-v` count onto a level; counts past the table stay at `TRACE`.
#[must_use]
pub fn verbosity_level(count: u8) -> Level {
    LEVELS[usize::from(count).min(LEVELS.len() - 1)]
}

/// Accept either a level name (`info`) or its index (`2`).
///
/// # Errors
/// Returns a message listing the accepted names.
pub fn parse_log_level(value: &str) -> Result<u8, String> {
    let value = value.trim();

    let index = match value.parse::<usize>() {
        Ok(index) if index < LEVELS.len() => Some(index),
        Ok(_) => None,
        Err(_) => LEVELS
            .iter()
            .position(|level| level.as_str().eq_ignore_ascii_case(value)),
    };

    index.and_then(|index| u8::try_from(index).ok()).ok_or_else(|| {
        format!("invalid log level `{value}`, expected one of: error, warn, info, debug, trace")
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("APPRAISAL_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::new(parse_log_level)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_level_accepts_names_and_indexes() {
        assert_eq!(parse_log_level("error"), Ok(0));
        assert_eq!(parse_log_level(" INFO "), Ok(2));
        assert_eq!(parse_log_level("Trace"), Ok(4));
        assert_eq!(parse_log_level("3"), Ok(3));
    }

    #[test]
    fn parse_log_level_rejects_unknown_values() {
        assert!(parse_log_level("verbose").is_err());
        assert!(parse_log_level("5").is_err());
        assert!(parse_log_level("").is_err());
    }

    #[test]
    fn verbosity_level_clamps_to_trace() {
        assert_eq!(verbosity_level(0), Level::ERROR);
        assert_eq!(verbosity_level(2), Level::INFO);
        assert_eq!(verbosity_level(4), Level::TRACE);
        assert_eq!(verbosity_level(9), Level::TRACE);
    }
}
