//! Interactive menu
//!
//! Each entry prompts for its inputs, calls one core operation and prints a
//! single colored result line. Prompts go through [`Prompter`] so the menu
//! can be driven by a script in tests.

use colored::Colorize;
use statusbook_common::{Status, User};
use statusbook_ingest::shard::ShardKind;
use statusbook_ingest::{RecordService, WriteOutcome};
use std::fmt;
use std::path::PathBuf;
use tracing::error;

use crate::commands::load;
use crate::context::Context;
use crate::error::Result;
use crate::Strategy;

/// One menu entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    LoadUsers,
    LoadStatuses,
    AddUser,
    UpdateUser,
    SearchUser,
    DeleteUser,
    AddStatus,
    UpdateStatus,
    SearchStatus,
    DeleteStatus,
    Quit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 11] = [
        MenuAction::LoadUsers,
        MenuAction::LoadStatuses,
        MenuAction::AddUser,
        MenuAction::UpdateUser,
        MenuAction::SearchUser,
        MenuAction::DeleteUser,
        MenuAction::AddStatus,
        MenuAction::UpdateStatus,
        MenuAction::SearchStatus,
        MenuAction::DeleteStatus,
        MenuAction::Quit,
    ];

    pub fn key(&self) -> char {
        match self {
            MenuAction::LoadUsers => 'A',
            MenuAction::LoadStatuses => 'B',
            MenuAction::AddUser => 'C',
            MenuAction::UpdateUser => 'D',
            MenuAction::SearchUser => 'E',
            MenuAction::DeleteUser => 'F',
            MenuAction::AddStatus => 'G',
            MenuAction::UpdateStatus => 'H',
            MenuAction::SearchStatus => 'I',
            MenuAction::DeleteStatus => 'J',
            MenuAction::Quit => 'Q',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::LoadUsers => "Load user database",
            MenuAction::LoadStatuses => "Load status database",
            MenuAction::AddUser => "Add user",
            MenuAction::UpdateUser => "Update user",
            MenuAction::SearchUser => "Search user",
            MenuAction::DeleteUser => "Delete user",
            MenuAction::AddStatus => "Add status",
            MenuAction::UpdateStatus => "Update status",
            MenuAction::SearchStatus => "Search status",
            MenuAction::DeleteStatus => "Delete status",
            MenuAction::Quit => "Quit",
        }
    }
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key(), self.label())
    }
}

/// Source of menu choices and free-text answers
pub trait Prompter {
    fn choose(&mut self) -> Result<MenuAction>;
    fn ask(&mut self, message: &str) -> Result<String>;
}

/// Terminal prompts
#[derive(Debug, Default)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn choose(&mut self) -> Result<MenuAction> {
        let choice = inquire::Select::new("Please choose from the following options", MenuAction::ALL.to_vec())
            .with_page_size(MenuAction::ALL.len())
            .prompt()?;
        Ok(choice)
    }

    fn ask(&mut self, message: &str) -> Result<String> {
        Ok(inquire::Text::new(message).prompt()?)
    }
}

/// What a menu action reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    Success(String),
    Failure(String),
    /// A found record, as labelled fields
    Record(Vec<(&'static str, String)>),
}

impl Feedback {
    fn from_outcome(outcome: WriteOutcome, success: &str, failure: &str) -> Self {
        if outcome.is_applied() {
            Feedback::Success(success.to_string())
        } else {
            Feedback::Failure(format!("{} ({})", failure, outcome))
        }
    }

    pub fn print(&self) {
        match self {
            Feedback::Success(msg) => println!("{} {}", "✓".green(), msg),
            Feedback::Failure(msg) => println!("{} {}", "✗".red(), msg),
            Feedback::Record(fields) => {
                for (label, value) in fields {
                    println!("  {:<12} {}", format!("{}:", label).cyan(), value);
                }
            }
        }
    }
}

/// The interactive menu loop
pub struct Menu<'a, P: Prompter> {
    ctx: &'a Context,
    records: RecordService,
    prompter: P,
}

impl<'a, P: Prompter> Menu<'a, P> {
    pub fn new(ctx: &'a Context, prompter: P) -> Self {
        Self {
            ctx,
            records: ctx.records(),
            prompter,
        }
    }

    /// Show the menu until the user quits or cancels
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let action = match self.prompter.choose() {
                Ok(MenuAction::Quit) => return Ok(()),
                Ok(action) => action,
                Err(e) if e.is_cancelled() => return Ok(()),
                Err(e) => return Err(e),
            };

            match self.perform(action).await {
                Ok(feedback) => feedback.print(),
                // Esc inside an action returns to the menu
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    error!(action = action.label(), error = %e, "Menu action failed");
                    Feedback::Failure(e.to_string()).print();
                }
            }
        }
    }

    /// Prompt for the inputs of `action` and run it
    pub async fn perform(&mut self, action: MenuAction) -> Result<Feedback> {
        match action {
            MenuAction::LoadUsers => self.load(ShardKind::Users, "Enter filename of user file:").await,
            MenuAction::LoadStatuses => self.load(ShardKind::Statuses, "Enter filename for status file:").await,
            MenuAction::AddUser => {
                let user = self.ask_user()?;
                let outcome = self.records.add_user(&user).await?;
                Ok(Feedback::from_outcome(
                    outcome,
                    "User was successfully added",
                    "This user already exists",
                ))
            }
            MenuAction::UpdateUser => {
                let user = self.ask_user()?;
                let outcome = self.records.update_user(&user).await?;
                Ok(Feedback::from_outcome(
                    outcome,
                    "User was successfully updated",
                    "Could not update user; check the user id",
                ))
            }
            MenuAction::SearchUser => {
                let user_id = self.prompter.ask("Enter user ID to search:")?;
                Ok(match self.records.search_user(&user_id).await? {
                    Some(user) => Feedback::Record(vec![
                        ("User ID", user.user_id),
                        ("Email", user.user_email),
                        ("Name", user.user_name),
                        ("Last name", user.user_last_name),
                    ]),
                    None => Feedback::Failure("User does not exist".to_string()),
                })
            }
            MenuAction::DeleteUser => {
                let user_id = self.prompter.ask("User ID:")?;
                let outcome = self.records.delete_user(&user_id).await?;
                Ok(Feedback::from_outcome(
                    outcome,
                    "User and associated statuses were successfully deleted",
                    "User does not exist",
                ))
            }
            MenuAction::AddStatus => {
                let user_id = self.prompter.ask("User ID:")?;
                let status_id = self.prompter.ask("Status ID:")?;
                let text = self.prompter.ask("Status text:")?;
                let outcome = self.records.add_status(&Status::new(status_id, user_id, text)).await?;
                Ok(Feedback::from_outcome(
                    outcome,
                    "New status was successfully added",
                    "Could not add status; check that the user exists and the status id is new",
                ))
            }
            MenuAction::UpdateStatus => {
                let status_id = self.prompter.ask("Status ID:")?;
                let user_id = self.prompter.ask("User ID:")?;
                let text = self.prompter.ask("Status text:")?;
                let outcome = self.records.update_status(&Status::new(status_id, user_id, text)).await?;
                Ok(Feedback::from_outcome(
                    outcome,
                    "Status was successfully updated",
                    "Could not update status; check the status and user ids",
                ))
            }
            MenuAction::SearchStatus => {
                let status_id = self.prompter.ask("Enter status ID to search:")?;
                Ok(match self.records.search_status(&status_id).await? {
                    Some(status) => Feedback::Record(vec![
                        ("Status ID", status.status_id),
                        ("User ID", status.user_id),
                        ("Status text", status.status_text),
                    ]),
                    None => Feedback::Failure("Status does not exist".to_string()),
                })
            }
            MenuAction::DeleteStatus => {
                let status_id = self.prompter.ask("Status ID:")?;
                let outcome = self.records.delete_status(&status_id).await?;
                Ok(Feedback::from_outcome(
                    outcome,
                    "Status was successfully deleted",
                    "That status id does not exist",
                ))
            }
            MenuAction::Quit => Ok(Feedback::Success("Goodbye".to_string())),
        }
    }

    async fn load(&mut self, kind: ShardKind, message: &str) -> Result<Feedback> {
        let file = PathBuf::from(self.prompter.ask(message)?.trim());
        let report = load::load(self.ctx, kind, &file, Strategy::Concurrent, None, None).await?;

        Ok(if report.is_success() {
            Feedback::Success(format!(
                "Loaded {} {} ({} already present, {} rows rejected)",
                report.inserted,
                kind.as_str(),
                report.duplicates,
                report.rows_rejected
            ))
        } else {
            Feedback::Failure(format!(
                "An error occurred while loading {}: {} of {} batches failed",
                kind.as_str(),
                report.batches_failed,
                report.batches_total
            ))
        })
    }

    fn ask_user(&mut self) -> Result<User> {
        let user_id = self.prompter.ask("User ID:")?;
        let email = self.prompter.ask("User email:")?;
        let name = self.prompter.ask("User name:")?;
        let last_name = self.prompter.ask("User last name:")?;
        Ok(User::new(user_id, email, name, last_name))
    }
}
