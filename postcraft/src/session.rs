//! Line-oriented interactive driver for `postcraft run`.
//!
//! Each loop iteration renders the current step, reads one command line and
//! dispatches it to the controller. Controller errors are not fatal here:
//! they land in the error slot and show up in the next rendered view.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::controller::WorkflowController;
use crate::core::step::Step;
use crate::core::types::{FormInput, PublishReceipt, Side};
use crate::error::WorkflowError;
use crate::io::render::ViewEngine;

/// How an interactive session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Published(PublishReceipt),
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Date,
    Url,
    Decided,
    Anniversary,
    Remarks,
}

impl FormField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "date" => Some(FormField::Date),
            "url" => Some(FormField::Url),
            "decided" => Some(FormField::Decided),
            "anniversary" => Some(FormField::Anniversary),
            "remarks" => Some(FormField::Remarks),
            _ => None,
        }
    }
}

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set(FormField, String),
    Retry,
    Continue,
    Select(Side),
    Refine,
    Finalize,
    RefineText(String),
    Skip,
    Publish,
    Edit,
    Back,
    Restart,
    Quit,
}

/// Interpret a line in the context of the current step.
///
/// On the refinement step free text is the request itself, so navigation
/// there uses `:`-prefixed commands.
pub fn parse_command(step: Step, line: &str) -> Result<Command, String> {
    let line = line.trim();
    if step == Step::Refine {
        return match line {
            ":skip" => Ok(Command::Skip),
            ":back" => Ok(Command::Back),
            ":restart" => Ok(Command::Restart),
            ":quit" => Ok(Command::Quit),
            "" => Err("describe the change, or :skip / :back".to_string()),
            text => Ok(Command::RefineText(text.to_string())),
        };
    }

    let lowered = line.to_lowercase();
    match (step, lowered.as_str()) {
        (_, "quit" | "q") => return Ok(Command::Quit),
        (_, "restart") => return Ok(Command::Restart),
        (Step::ReviewContext | Step::CompareCandidates | Step::Confirm, "back") => {
            return Ok(Command::Back);
        }
        _ => {}
    }

    match step {
        Step::EnterInfo => {
            if matches!(lowered.as_str(), "retry" | "r") {
                return Ok(Command::Retry);
            }
            let (name, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let field = FormField::parse(&name.to_lowercase())
                .ok_or_else(|| format!("unknown command '{line}'"))?;
            Ok(Command::Set(field, value.trim().to_string()))
        }
        Step::ReviewContext => match lowered.as_str() {
            "" | "continue" | "c" => Ok(Command::Continue),
            other => Err(format!("unknown command '{other}'")),
        },
        Step::CompareCandidates => match lowered.as_str() {
            "refine" => Ok(Command::Refine),
            "finalize" | "f" => Ok(Command::Finalize),
            other => other
                .parse::<Side>()
                .map(Command::Select)
                .map_err(|_| format!("unknown command '{other}'")),
        },
        Step::Confirm => match lowered.as_str() {
            "publish" | "p" => Ok(Command::Publish),
            "edit" | "e" => Ok(Command::Edit),
            other => Err(format!("unknown command '{other}'")),
        },
        Step::LoadingContext | Step::LoadingGeneration | Step::Refine | Step::Done => {
            Err(format!("no commands are accepted on step '{step}'"))
        }
    }
}

/// Drive `controller` from `input` until the post is published or the user quits.
///
/// `form` is submitted immediately; on the entry step it can be edited field
/// by field and resubmitted with `retry`. End of input abandons the session.
pub async fn run_session<R, W>(
    controller: &mut WorkflowController,
    mut form: FormInput,
    input: R,
    output: &mut W,
) -> Result<SessionOutcome>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let views = ViewEngine::new()?;
    let mut lines = input.lines();
    report(controller.fetch_context(form.clone()).await);

    loop {
        let screen = views.render(&controller.snapshot())?;
        writeln!(output, "{screen}").context("write view")?;
        if controller.step() == Step::Done {
            let receipt = controller.receipt().cloned().unwrap_or_default();
            return Ok(SessionOutcome::Published(receipt));
        }
        write!(output, "> ").context("write prompt")?;
        output.flush().context("flush output")?;

        let Some(line) = lines.next_line().await.context("read input")? else {
            debug!(step = %controller.step(), "input closed");
            return Ok(SessionOutcome::Abandoned);
        };
        let command = match parse_command(controller.step(), &line) {
            Ok(command) => command,
            Err(message) => {
                writeln!(output, "? {message}").context("write message")?;
                continue;
            }
        };
        debug!(?command, step = %controller.step(), "dispatching command");

        let outcome = match command {
            Command::Quit => return Ok(SessionOutcome::Abandoned),
            Command::Set(field, value) => {
                if let Err(message) = set_field(&mut form, field, value) {
                    writeln!(output, "? {message}").context("write message")?;
                }
                Ok(())
            }
            Command::Retry => controller.fetch_context(form.clone()).await,
            Command::Continue => controller.proceed_to_generation().await,
            Command::Select(side) => controller.select_candidate(side),
            Command::Refine => controller.proceed_to_refinement(),
            Command::Finalize => controller.finalize_selection(),
            Command::RefineText(text) => controller.refine_post(text).await,
            Command::Skip => controller.skip_refinement(),
            Command::Publish => controller.confirm_and_publish().await,
            Command::Edit => controller.edit_post(),
            Command::Back => {
                controller.go_back();
                Ok(())
            }
            Command::Restart => {
                controller.restart();
                Ok(())
            }
        };
        report(outcome);
    }
}

fn set_field(form: &mut FormInput, field: FormField, value: String) -> Result<(), String> {
    match field {
        FormField::Date if value.is_empty() => form.date = None,
        FormField::Date => {
            let date = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map_err(|err| format!("invalid date '{value}': {err}"))?;
            form.date = Some(date);
        }
        FormField::Url => form.url = value,
        FormField::Decided => form.decided = value,
        FormField::Anniversary => form.anniversary = value,
        FormField::Remarks => form.remarks = value,
    }
    Ok(())
}

/// The controller already recorded the error for the next view.
fn report(outcome: Result<(), WorkflowError>) {
    if let Err(err) = outcome {
        debug!(error = %err, "action failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refine_step_treats_text_as_request() {
        assert_eq!(
            parse_command(Step::Refine, "  make it shorter "),
            Ok(Command::RefineText("make it shorter".to_string()))
        );
        assert_eq!(parse_command(Step::Refine, ":skip"), Ok(Command::Skip));
        assert_eq!(parse_command(Step::Refine, "back"), Ok(Command::RefineText("back".into())));
        assert!(parse_command(Step::Refine, "   ").is_err());
    }

    #[test]
    fn compare_step_accepts_sides_and_actions() {
        assert_eq!(parse_command(Step::CompareCandidates, "A"), Ok(Command::Select(Side::A)));
        assert_eq!(parse_command(Step::CompareCandidates, "b"), Ok(Command::Select(Side::B)));
        assert_eq!(parse_command(Step::CompareCandidates, "f"), Ok(Command::Finalize));
        assert_eq!(parse_command(Step::CompareCandidates, "back"), Ok(Command::Back));
        assert!(parse_command(Step::CompareCandidates, "c").is_err());
    }

    #[test]
    fn entry_step_sets_fields() {
        assert_eq!(
            parse_command(Step::EnterInfo, "url http://x/item 1"),
            Ok(Command::Set(FormField::Url, "http://x/item 1".to_string()))
        );
        assert_eq!(
            parse_command(Step::EnterInfo, "remarks"),
            Ok(Command::Set(FormField::Remarks, String::new()))
        );
        assert_eq!(parse_command(Step::EnterInfo, "retry"), Ok(Command::Retry));
        assert!(parse_command(Step::EnterInfo, "back").is_err());
    }

    #[test]
    fn loading_and_done_steps_reject_input() {
        for step in [Step::LoadingContext, Step::LoadingGeneration, Step::Done] {
            assert!(parse_command(step, "continue").is_err());
        }
        assert_eq!(parse_command(Step::Done, "quit"), Ok(Command::Quit));
        assert_eq!(parse_command(Step::Done, "restart"), Ok(Command::Restart));
        assert_eq!(parse_command(Step::Refine, ":restart"), Ok(Command::Restart));
    }

    #[test]
    fn set_field_parses_dates() {
        let mut form = FormInput::default();
        set_field(&mut form, FormField::Date, "2024-02-29".to_string()).expect("date");
        assert_eq!(form.date, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert!(set_field(&mut form, FormField::Date, "tomorrow".to_string()).is_err());
        set_field(&mut form, FormField::Date, String::new()).expect("clear");
        assert_eq!(form.date, None);
    }
}
