use std::path::PathBuf;
use std::sync::Arc;

use rustyline::{history::MemHistory, Editor};
use snafu::{ResultExt, Snafu};

use crate::config::Config;
use crate::model::{PageTime, RevisionSnapshot, SaveStatus, SlideNumber};
use crate::service::backend::{wait_until_ready, BackendError, PollError, ScriptBackend};
use crate::service::practice::{PracticeSession, SessionError, SessionState};
use crate::service::revision::PreviewOutcome;

mod parse;

pub struct Repl {
    inner: Editor<(), MemHistory>,
    message: Option<String>,
}

impl Repl {
    pub fn new() -> Result<Self, ReplError> {
        let config = rustyline::Config::default();
        let inner =
            rustyline::Editor::with_history(config, MemHistory::new()).context(RustylineSnafu)?;

        let repl = Self {
            inner,
            message: None,
        };
        Ok(repl)
    }

    /// Reads one line. The terminal is blocking, so the runtime gets to keep the timer ticking elsewhere.
    pub async fn prompt(&mut self, header: &str) -> Action {
        let message = self
            .message
            .as_ref()
            .map(|msg| format!("  {msg}\n"))
            .unwrap_or_default();
        let prompt = format!("{message}{header}> ");

        let inner = &mut self.inner;
        let Ok(input) = tokio::task::block_in_place(|| inner.readline(&prompt)) else {
            return Action::Exit;
        };

        self.message = None;

        self.inner.add_history_entry(input.clone()).ok();

        match parse::parse(&input) {
            Ok(action) => action,
            Err(err) => {
                self.reply(err.to_string());
                Action::None
            }
        }
    }

    pub fn reply(&mut self, message: String) {
        if let Some(msg) = self.message.as_mut() {
            msg.push('\n');
            msg.push_str(&message);
        } else {
            self.message = Some(message);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Action {
    Next,
    Previous,
    Goto { slide: SlideNumber },
    Start,
    Stop,
    Type { text: String },
    Undo,
    Goal { time: PageTime },
    Reset,
    History,
    /// 1-based position in the last `history` listing
    Preview { index: usize },
    Restore { index: usize },
    Generate,
    Regenerate,
    Export { path: PathBuf },
    Status,
    Exit,
    None,
}

#[derive(Debug, Snafu)]
pub enum ReplError {
    #[snafu(transparent)]
    Session { source: SessionError },

    #[snafu(transparent)]
    Poll { source: PollError },

    #[snafu(transparent)]
    Backend { source: BackendError },

    #[snafu(display("failed to initialize REPL: {}", source))]
    Rustyline {
        source: rustyline::error::ReadlineError,
    },

    #[snafu(display("could not export the script to `{}`: {source}", path.display()))]
    Export {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("there is no revision #{index}, run `history` first"))]
    UnknownRevision { index: usize },
}

pub async fn start<B>(repl: &mut Repl, config: &Config, backend: B) -> Result<(), ReplError>
where
    B: ScriptBackend + 'static,
{
    tracing::info!("starting REPL");

    let backend = Arc::new(backend);
    let info = wait_until_ready(&*backend, config.file_id, config.polling()).await?;
    repl.reply(format!("opened `{}`", info.original_name));

    let cache = Arc::new(config.cache().await);
    let mut session = PracticeSession::open(
        config.file_id,
        config.page_count,
        backend,
        cache,
        config.autosave(),
    )
    .await?;

    if session.state() == SessionState::GoalTimeUnset {
        repl.reply("set a goal time with `goal MM:SS` to begin".to_string());
    }
    show_slide(repl, &session).await;

    let mut revisions: Vec<RevisionSnapshot> = Vec::new();
    let mut save_status = session.subscribe_status();

    loop {
        // debounced saves finish in the background
        if save_status.has_changed().unwrap_or(false)
            && *save_status.borrow_and_update() == SaveStatus::Error
        {
            repl.reply("the last save failed, the next edit will try again".to_string());
        }

        let header = header(&session).await;

        match repl.prompt(&header).await {
            Action::Exit => {
                if let Some(report) = capture_error(repl, session.exit().await) {
                    println!("{report}");
                }
                break;
            }
            Action::Next => {
                if let Some(moved) = capture_error(repl, session.next().await) {
                    if !moved {
                        repl.reply("already on the last slide".to_string());
                    }
                    show_slide(repl, &session).await;
                }
            }
            Action::Previous => {
                if let Some(moved) = capture_error(repl, session.previous().await) {
                    if !moved {
                        repl.reply("already on the first slide".to_string());
                    }
                    show_slide(repl, &session).await;
                }
            }
            Action::Goto { slide } => {
                if capture_error(repl, session.navigate(slide).await).is_some() {
                    show_slide(repl, &session).await;
                }
            }
            action @ (Action::Start | Action::Stop) => {
                let running = matches!(
                    session.state(),
                    SessionState::Ready {
                        timer_running: true
                    }
                );
                if running == (action == Action::Start) {
                    repl.reply(format!(
                        "the timer is already {}",
                        if running { "running" } else { "stopped" }
                    ));
                    continue;
                }

                match capture_error(repl, session.toggle_timer().await) {
                    Some(true) => repl.reply("timer started".to_string()),
                    Some(false) => repl.reply(format!(
                        "timer stopped at {}",
                        session.elapsed(session.current_slide()).await
                    )),
                    None => {}
                }
            }
            Action::Type { text } => {
                capture_error(repl, session.edit(text).await);
            }
            Action::Undo => match capture_error(repl, session.undo().await) {
                Some(true) => show_slide(repl, &session).await,
                Some(false) => repl.reply("nothing to undo".to_string()),
                None => {}
            },
            Action::Goal { time } => {
                if capture_error(repl, session.set_goal_time(time).await).is_some() {
                    repl.reply(format!("goal time is {time}"));
                    if session.guide_visible() {
                        repl.reply("`start` runs the timer, `next`/`prev` move between slides".to_string());
                    }
                }
            }
            Action::Reset => {
                if capture_error(repl, session.reset_timer().await).is_some() {
                    repl.reply("all slide times are back to 00:00".to_string());
                }
            }
            Action::History => {
                if let Some(listed) = capture_error(repl, session.history().await) {
                    let now = chrono::Local::now().naive_local();
                    let lines = listed
                        .iter()
                        .enumerate()
                        .map(|(index, revision)| {
                            format!("  #{} {} ({})", index + 1, revision.date_label, revision.age(now))
                        })
                        .collect::<Vec<_>>();

                    repl.reply(if lines.is_empty() {
                        "no revisions yet".to_string()
                    } else {
                        lines.join("\n")
                    });
                    revisions = listed;
                }
            }
            Action::Preview { index } => {
                let Some(filename) = revision_name(repl, &revisions, index) else {
                    continue;
                };

                match capture_error(repl, session.preview(&filename).await) {
                    Some(PreviewOutcome::Showing(_)) => {
                        repl.reply(format!("previewing #{index}, read-only"));
                        repl.reply(session.displayed_content().await);
                    }
                    Some(PreviewOutcome::Cancelled) => {
                        repl.reply("back to the live script".to_string());
                    }
                    None => {}
                }
            }
            Action::Restore { index } => {
                let Some(filename) = revision_name(repl, &revisions, index) else {
                    continue;
                };

                if capture_error(repl, session.restore(&filename).await).is_some() {
                    repl.reply(format!("restored #{index}"));
                    show_slide(repl, &session).await;
                }
            }
            Action::Generate => {
                if capture_error(repl, session.generate_all().await).is_some() {
                    show_slide(repl, &session).await;
                }
            }
            Action::Regenerate => {
                if capture_error(repl, session.regenerate_current().await).is_some() {
                    show_slide(repl, &session).await;
                }
            }
            Action::Export { path } => {
                let text = session.export_text().await;
                let result = tokio::fs::write(&path, text)
                    .await
                    .context(ExportSnafu { path: &path });

                if capture_error(repl, result).is_some() {
                    repl.reply(format!("script written to `{}`", path.display()));
                }
            }
            Action::Status => {
                let slide = session.current_slide();
                repl.reply(format!(
                    "slide {slide}/{}: {} on this slide, {} total, goal {}, {}",
                    session.page_count(),
                    session.elapsed(slide).await,
                    session.total_time().await,
                    session.goal_time().await,
                    session.save_status(),
                ));
            }
            _ => continue,
        }
    }

    session.close().await;

    Ok(())
}

async fn header(session: &PracticeSession) -> String {
    let slide = session.current_slide();
    let clock = session.elapsed(slide).await;
    let running = matches!(
        session.state(),
        SessionState::Ready {
            timer_running: true
        }
    );

    format!(
        "[{slide}/{} {clock}{}]",
        session.page_count(),
        if running { " ▶" } else { "" }
    )
}

async fn show_slide(repl: &mut Repl, session: &PracticeSession) {
    let content = session.displayed_content().await;
    let content = if content.is_empty() {
        "(empty)".to_string()
    } else {
        content
    };

    repl.reply(format!("slide {}: {content}", session.current_slide()));
}

fn revision_name(repl: &mut Repl, revisions: &[RevisionSnapshot], index: usize) -> Option<String> {
    let found = index
        .checked_sub(1)
        .and_then(|position| revisions.get(position))
        .map(|revision| revision.filename.clone());

    if found.is_none() {
        capture_error::<(), _>(repl, UnknownRevisionSnafu { index }.fail());
    }
    found
}

fn capture_error<T, E>(repl: &mut Repl, result: Result<T, E>) -> Option<T>
where
    E: Into<ReplError>,
{
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            let error: ReplError = error.into();
            tracing::warn!(%error, "command failed");
            repl.reply(error.to_string());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshots(names: &[&str]) -> Vec<RevisionSnapshot> {
        names
            .iter()
            .map(|name| RevisionSnapshot::from_filename(*name))
            .collect()
    }

    fn repl() -> Repl {
        Repl::new().unwrap()
    }

    #[test]
    fn revision_indices_are_one_based() {
        let mut repl = repl();
        let revisions = snapshots(&["script_250102090000.json", "script_250101090000.json"]);

        assert_eq!(
            revision_name(&mut repl, &revisions, 2).as_deref(),
            Some("script_250101090000.json")
        );
        assert!(repl.message.is_none());

        assert_eq!(revision_name(&mut repl, &revisions, 0), None);
        assert_eq!(revision_name(&mut repl, &revisions, 3), None);
        assert_eq!(
            repl.message.as_deref(),
            Some("there is no revision #0, run `history` first\nthere is no revision #3, run `history` first")
        );
    }

    #[test]
    fn session_errors_are_replied() {
        let mut repl = repl();

        let result: Result<(), SessionError> = Err(SessionError::GoalTimeUnset);
        assert_eq!(capture_error(&mut repl, result), None);
        assert_eq!(repl.message.as_deref(), Some("set a goal time first"));
    }
}
