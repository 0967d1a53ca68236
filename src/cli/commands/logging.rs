use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accepts a count (`0..=5`) or a level name, as given through `GATEHOUSE_LOG_LEVEL`.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(|level: &str| -> Result<u8, String> {
        match level.parse::<u8>() {
            Ok(count) if count <= 5 => return Ok(count),
            Ok(_) => return Err(format!("log level out of range: {level}")),
            Err(_) => {}
        }
        LEVEL_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(level))
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| format!("invalid log level: {level}"))
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("GATEHOUSE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: &str) -> Result<u8, clap::Error> {
        let command = Command::new("gatehouse").arg(
            Arg::new("level")
                .long("level")
                .value_parser(validator_log_level()),
        );
        let matches = command.try_get_matches_from(["gatehouse", "--level", value])?;
        Ok(matches.get_one::<u8>("level").copied().unwrap_or_default())
    }

    #[test]
    fn names_and_counts_are_accepted() -> Result<(), clap::Error> {
        assert_eq!(parse("DEBUG")?, 3);
        assert_eq!(parse("warn")?, 1);
        assert_eq!(parse("5")?, 5);
        Ok(())
    }

    #[test]
    fn unknown_levels_are_rejected() {
        assert!(parse("verbose").is_err());
        assert!(parse("6").is_err());
    }
}
