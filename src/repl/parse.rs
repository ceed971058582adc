use std::path::PathBuf;

use chumsky::{
    error::SimpleReason,
    prelude::*,
    text::{self, whitespace},
};
use itertools::Itertools;

use super::*;
use crate::model::PageTime;

#[derive(Debug, Snafu)]
#[snafu(display("cannot parse '{input}' - {}", self.combine_errors("\n")))]
pub struct ParseError {
    input: String,
    errors: Vec<Simple<char>>,
}

impl ParseError {
    fn combine_errors(&self, separator: &str) -> String {
        self.errors
            .iter()
            .map(|err| {
                format!(
                    "{}:\n   {}",
                    err,
                    match err.reason() {
                        SimpleReason::Custom(msg) => format!("error {}", msg),
                        SimpleReason::Unexpected => "unexpected input".to_string(),
                        SimpleReason::Unclosed { span, delimiter } => {
                            format!(
                                "unclosed delimiter ({}..{}) in {}",
                                span.start, span.end, delimiter
                            )
                        }
                    }
                )
            })
            .join(separator)
    }
}

pub fn parse(input: &str) -> Result<Action, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Action::None);
    }

    program().parse(input).map_err(|errors| ParseError {
        input: input.to_string(),
        errors,
    })
}

/// Every command owns the whole line, so a shorter word never shadows a longer one.
fn program() -> impl Parser<char, Action, Error = Simple<char>> {
    choice((
        with_argument("goto", slide_number()).map(|slide| Action::Goto { slide }),
        with_argument("type", rest()).map(|text| Action::Type { text }),
        with_argument("goal", page_time()).map(|time| Action::Goal { time }),
        with_argument("preview", slide_number()).map(|index| Action::Preview {
            index: index as usize,
        }),
        with_argument("restore", slide_number()).map(|index| Action::Restore {
            index: index as usize,
        }),
        with_argument("export", rest()).map(|path| Action::Export {
            path: PathBuf::from(path),
        }),
        bare("next", Action::Next),
        bare("previous", Action::Previous),
        bare("prev", Action::Previous),
        bare("start", Action::Start),
        bare("stop", Action::Stop),
        bare("undo", Action::Undo),
        bare("reset", Action::Reset),
        bare("history", Action::History),
        bare("generate", Action::Generate),
        bare("regenerate", Action::Regenerate),
        bare("status", Action::Status),
        bare("exit", Action::Exit),
        bare("quit", Action::Exit),
    ))
}

fn bare(word: &'static str, action: Action) -> impl Parser<char, Action, Error = Simple<char>> {
    just(word).then_ignore(end()).to(action)
}

fn with_argument<T>(
    word: &'static str, argument: impl Parser<char, T, Error = Simple<char>>,
) -> impl Parser<char, T, Error = Simple<char>> {
    just(word)
        .then_ignore(whitespace().at_least(1))
        .ignore_then(argument)
        .then_ignore(end())
}

fn slide_number() -> impl Parser<char, u32, Error = Simple<char>> {
    text::int(10).try_map(|digits: String, span| {
        digits
            .parse()
            .map_err(|_| Simple::custom(span, "number is too large"))
    })
}

fn rest() -> impl Parser<char, String, Error = Simple<char>> {
    take_until(end()).map(|(chars, _)| chars.into_iter().collect::<String>())
}

fn page_time() -> impl Parser<char, PageTime, Error = Simple<char>> {
    rest().try_map(|text, span| {
        text.parse()
            .map_err(|error: crate::model::ValidationError| Simple::custom(span, error.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_commands() {
        assert_eq!(parse("next").unwrap(), Action::Next);
        assert_eq!(parse("  prev ").unwrap(), Action::Previous);
        assert_eq!(parse("quit").unwrap(), Action::Exit);
        assert_eq!(parse("regenerate").unwrap(), Action::Regenerate);
        assert_eq!(parse("").unwrap(), Action::None);
    }

    #[test]
    fn longer_words_are_not_shadowed() {
        assert_eq!(parse("preview 2").unwrap(), Action::Preview { index: 2 });
        assert_eq!(parse("previous").unwrap(), Action::Previous);
        assert_eq!(parse("restore 1").unwrap(), Action::Restore { index: 1 });
        assert_eq!(parse("reset").unwrap(), Action::Reset);
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(parse("goto 12").unwrap(), Action::Goto { slide: 12 });
        assert_eq!(
            parse("type Good morning,  everyone").unwrap(),
            Action::Type {
                text: "Good morning,  everyone".to_string()
            }
        );
        assert_eq!(
            parse("goal 05:30").unwrap(),
            Action::Goal {
                time: PageTime::new(5, 30).unwrap()
            }
        );
        assert_eq!(
            parse("export notes/script.txt").unwrap(),
            Action::Export {
                path: PathBuf::from("notes/script.txt")
            }
        );
    }

    #[test]
    fn invalid_input() {
        assert!(parse("goto two").is_err());
        assert!(parse("goal 1:75").is_err());
        assert!(parse("goal 400000000000000000:00").is_err());
        assert!(parse("nextslide").is_err());
        assert!(parse("dance").is_err());
    }
}
