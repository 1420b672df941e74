//! Line grammar of the query session.
//!
//! The first whitespace-separated token picks a command verb. Lines whose
//! first token is not a verb are query expressions.

use chrono::DateTime;

use super::state::QueryMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Mode(QueryMode),
    /// Lookback delta in seconds.
    Lookback(u64),
    /// Unix milliseconds.
    IntervalStart(i64),
    /// Unix milliseconds.
    IntervalEnd(i64),
    /// Range step in seconds.
    Interval(u64),
    /// Metric names containing the filter, or all of them.
    Metrics(Option<String>),
}

/// Rejected command. The Display strings are what the session prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("invalid number of arguments")]
    InvalidNumberOfArguments,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("failed to parse number")]
    FailedToParseNumber,
    #[error("invalid arguments")]
    InvalidArguments,
}

/// Classified input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Blank,
    Command(Command),
    Invalid(CommandError),
    Query(String),
}

/// Classifies one input line.
pub fn parse_input(line: &str) -> Input {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = parts.split_first() else {
        return Input::Blank;
    };

    let parsed = match verb {
        "exit" => parse_exit(args),
        "mode" => parse_mode(args),
        "lookback" => parse_lookback(args),
        "interval" => parse_interval(args),
        "metrics" => parse_metrics(args),
        _ => return Input::Query(line.trim().to_string()),
    };

    match parsed {
        Ok(command) => Input::Command(command),
        Err(e) => Input::Invalid(e),
    }
}

fn parse_exit(args: &[&str]) -> Result<Command, CommandError> {
    if !args.is_empty() {
        return Err(CommandError::InvalidNumberOfArguments);
    }
    Ok(Command::Exit)
}

fn parse_mode(args: &[&str]) -> Result<Command, CommandError> {
    let [mode] = args else {
        return Err(CommandError::InvalidNumberOfArguments);
    };
    QueryMode::parse(mode)
        .map(Command::Mode)
        .ok_or(CommandError::InvalidArgument)
}

fn parse_lookback(args: &[&str]) -> Result<Command, CommandError> {
    let [secs] = args else {
        return Err(CommandError::InvalidNumberOfArguments);
    };
    secs.parse()
        .map(Command::Lookback)
        .map_err(|_| CommandError::FailedToParseNumber)
}

fn parse_interval(args: &[&str]) -> Result<Command, CommandError> {
    match args {
        [which @ ("start" | "end"), ms] => {
            let ms: i64 = ms
                .parse()
                .ok()
                .filter(|ms| DateTime::from_timestamp_millis(*ms).is_some())
                .ok_or(CommandError::InvalidNumberOfArguments)?;
            Ok(if *which == "start" {
                Command::IntervalStart(ms)
            } else {
                Command::IntervalEnd(ms)
            })
        }
        [secs] => secs
            .parse()
            .map(Command::Interval)
            .map_err(|_| CommandError::InvalidNumberOfArguments),
        _ => Err(CommandError::InvalidArguments),
    }
}

fn parse_metrics(args: &[&str]) -> Result<Command, CommandError> {
    match args {
        [] => Ok(Command::Metrics(None)),
        [filter] => Ok(Command::Metrics(Some(filter.to_string()))),
        _ => Err(CommandError::InvalidNumberOfArguments),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(line: &str) -> Command {
        match parse_input(line) {
            Input::Command(c) => c,
            other => panic!("{line:?} parsed as {other:?}"),
        }
    }

    fn invalid(line: &str) -> String {
        match parse_input(line) {
            Input::Invalid(e) => e.to_string(),
            other => panic!("{line:?} parsed as {other:?}"),
        }
    }

    #[test]
    fn test_blank_lines() {
        assert_eq!(parse_input(""), Input::Blank);
        assert_eq!(parse_input("   \t "), Input::Blank);
    }

    #[test]
    fn test_exit() {
        assert_eq!(command("exit"), Command::Exit);
        assert_eq!(command("  exit  "), Command::Exit);
        assert_eq!(invalid("exit now"), "invalid number of arguments");
    }

    #[test]
    fn test_mode() {
        assert_eq!(command("mode range"), Command::Mode(QueryMode::Range));
        assert_eq!(invalid("mode bogus"), "invalid argument");
        assert_eq!(invalid("mode"), "invalid number of arguments");
        assert_eq!(invalid("mode range instant"), "invalid number of arguments");
    }

    #[test]
    fn test_lookback() {
        assert_eq!(command("lookback 60"), Command::Lookback(60));
        assert_eq!(invalid("lookback abc"), "failed to parse number");
        assert_eq!(invalid("lookback -5"), "failed to parse number");
        assert_eq!(invalid("lookback"), "invalid number of arguments");
    }

    #[test]
    fn test_interval_bounds() {
        assert_eq!(
            command("interval start 1700000000000"),
            Command::IntervalStart(1_700_000_000_000)
        );
        assert_eq!(command("interval end 5"), Command::IntervalEnd(5));
        assert_eq!(invalid("interval start soon"), "invalid number of arguments");
        assert_eq!(
            invalid(&format!("interval end {}", i64::MAX)),
            "invalid number of arguments"
        );
    }

    #[test]
    fn test_interval_step() {
        assert_eq!(command("interval 120"), Command::Interval(120));
        assert_eq!(invalid("interval often"), "invalid number of arguments");
        assert_eq!(invalid("interval"), "invalid arguments");
        assert_eq!(invalid("interval middle 5"), "invalid arguments");
        assert_eq!(invalid("interval start 1 2"), "invalid arguments");
    }

    #[test]
    fn test_metrics() {
        assert_eq!(command("metrics"), Command::Metrics(None));
        assert_eq!(
            command("metrics node"),
            Command::Metrics(Some("node".to_string()))
        );
        assert_eq!(invalid("metrics a b"), "invalid number of arguments");
    }

    #[test]
    fn test_other_input_is_query() {
        assert_eq!(
            parse_input(r#"foo{bar="baz"}"#),
            Input::Query(r#"foo{bar="baz"}"#.to_string())
        );
        assert_eq!(
            parse_input("  sum(rate(x[5m])) "),
            Input::Query("sum(rate(x[5m]))".to_string())
        );
        // Verbs only count as the first token.
        assert_eq!(
            parse_input("up exit"),
            Input::Query("up exit".to_string())
        );
    }
}
