//! The login and onboarding state machine.
//!
//! The machine is a pure stepper: given the current phase, the line the
//! client typed and read-only views of the rest of the server, it
//! returns the next phase plus either a prompt or an "enter the world"
//! order for the gateway to carry out. It never touches the world or
//! the sockets itself.

use embermud_world::{ORIGINS, RACES, Race, find_race};
use tracing::debug;

use crate::credentials::Credentials;

/// Where a connection is in the login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPhase {
    AwaitingName,
    /// New account: choose a password.
    AwaitingNewPassword { name: String },
    /// Known account: prove it.
    AwaitingPasswordVerify { name: String },
    /// Name is bound to a live session; password first, then the
    /// takeover question.
    ReconnectPrompt { name: String },
    AwaitingReconnectConfirm { name: String },
    AwaitingRace { name: String },
    AwaitingOrigin { name: String, race: &'static Race },
    /// Logged in; lines go to command dispatch instead.
    Playing,
}

/// What the gateway should do after a login step.
#[derive(Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Show this text and wait for the next line.
    Prompt(String),
    /// Login finished; bind a character.
    Enter(EnterWorld),
}

/// Instructions for binding a session to a character.
#[derive(Debug, PartialEq, Eq)]
pub struct EnterWorld {
    pub name: String,
    /// Fresh character: create from race/origin, show the MOTD.
    pub new_character: bool,
    pub race: Option<&'static Race>,
    pub origin: Option<&'static str>,
    /// Force-disconnect the prior session holding this name.
    pub takeover: bool,
}

/// Read-only questions the machine asks about the rest of the server.
pub trait LoginLookup {
    /// Is this name currently bound to a live session?
    fn is_online(&self, name: &str) -> bool;

    /// Does a saved character exist for this name?
    fn has_saved(&self, name: &str) -> bool;
}

pub const NAME_PROMPT: &str = "By what name do you wish to be known? ";

/// Advances the machine by one typed line.
pub fn advance(
    phase: LoginPhase,
    line: &str,
    lookup: &dyn LoginLookup,
    credentials: &mut dyn Credentials,
) -> (LoginPhase, LoginOutcome) {
    let line = line.trim();
    match phase {
        LoginPhase::AwaitingName => {
            let Some(name) = normalize_name(line) else {
                return prompt(
                    LoginPhase::AwaitingName,
                    format!("Illegal name, try another.\r\n{NAME_PROMPT}"),
                );
            };
            if lookup.is_online(&name) {
                debug!(name, "login for a name already online");
                return prompt(
                    LoginPhase::ReconnectPrompt { name },
                    "That character is already playing.\r\nPassword: ".into(),
                );
            }
            if credentials.exists(&name) {
                prompt(LoginPhase::AwaitingPasswordVerify { name }, "Password: ".into())
            } else {
                prompt(
                    LoginPhase::AwaitingNewPassword { name: name.clone() },
                    format!("New character.\r\nGive me a password for {name}: "),
                )
            }
        }

        LoginPhase::AwaitingNewPassword { name } => {
            if line.is_empty() {
                return prompt(
                    LoginPhase::AwaitingNewPassword { name },
                    "Password: ".into(),
                );
            }
            if let Err(err) = credentials.save(&name, line) {
                tracing::error!(name, %err, "saving credentials failed");
                return prompt(
                    LoginPhase::AwaitingNewPassword { name },
                    "Something went wrong; try that password again: ".into(),
                );
            }
            prompt(LoginPhase::AwaitingRace { name }, race_menu())
        }

        LoginPhase::AwaitingPasswordVerify { name } => {
            if !credentials.verify(&name, line) {
                return prompt(
                    LoginPhase::AwaitingName,
                    format!("Wrong password.\r\n{NAME_PROMPT}"),
                );
            }
            if lookup.has_saved(&name) {
                enter(EnterWorld {
                    name,
                    new_character: false,
                    race: None,
                    origin: None,
                    takeover: false,
                })
            } else {
                // Account exists but onboarding never finished.
                prompt(LoginPhase::AwaitingRace { name }, race_menu())
            }
        }

        LoginPhase::ReconnectPrompt { name } => {
            if credentials.verify(&name, line) {
                prompt(
                    LoginPhase::AwaitingReconnectConfirm { name },
                    "Take over that connection? (Y/N) ".into(),
                )
            } else {
                prompt(
                    LoginPhase::AwaitingName,
                    format!("Wrong password.\r\n{NAME_PROMPT}"),
                )
            }
        }

        LoginPhase::AwaitingReconnectConfirm { name } => {
            match line.chars().next().map(|c| c.to_ascii_lowercase()) {
                Some('y') => enter(EnterWorld {
                    name,
                    new_character: false,
                    race: None,
                    origin: None,
                    takeover: true,
                }),
                Some('n') => prompt(LoginPhase::AwaitingName, NAME_PROMPT.into()),
                _ => prompt(
                    LoginPhase::AwaitingReconnectConfirm { name },
                    "Please answer Y or N: ".into(),
                ),
            }
        }

        LoginPhase::AwaitingRace { name } => match find_race(line) {
            Some(race) => prompt(LoginPhase::AwaitingOrigin { name, race }, origin_menu()),
            None => prompt(
                LoginPhase::AwaitingRace { name },
                format!("That is not a race.\r\n{}", race_menu()),
            ),
        },

        LoginPhase::AwaitingOrigin { name, race } => {
            let choice = line.parse::<usize>().ok().filter(|n| (1..=ORIGINS.len()).contains(n));
            match choice {
                Some(n) => enter(EnterWorld {
                    name,
                    new_character: true,
                    race: Some(race),
                    origin: Some(ORIGINS[n - 1]),
                    takeover: false,
                }),
                None => prompt(
                    LoginPhase::AwaitingOrigin { name, race },
                    format!("Pick a number from the list.\r\n{}", origin_menu()),
                ),
            }
        }

        // Lines in Playing belong to command dispatch; reaching here is
        // a gateway routing mistake, answered with silence.
        LoginPhase::Playing => (LoginPhase::Playing, LoginOutcome::Prompt(String::new())),
    }
}

fn prompt(phase: LoginPhase, text: String) -> (LoginPhase, LoginOutcome) {
    (phase, LoginOutcome::Prompt(text))
}

fn enter(order: EnterWorld) -> (LoginPhase, LoginOutcome) {
    (LoginPhase::Playing, LoginOutcome::Enter(order))
}

/// Alphabetic, at least three characters; returned title-cased.
fn normalize_name(input: &str) -> Option<String> {
    if input.len() < 3 || !input.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut name = input.to_ascii_lowercase();
    name[..1].make_ascii_uppercase();
    Some(name)
}

fn race_menu() -> String {
    let names: Vec<&str> = RACES.iter().map(|r| r.name).collect();
    format!(
        "The following races are available:\r\n  {}\r\nWhat is your race? ",
        names.join(", ")
    )
}

fn origin_menu() -> String {
    let mut menu = String::from("Choose your origin:\r\n");
    for (i, origin) in ORIGINS.iter().enumerate() {
        menu.push_str(&format!("  {}) {}\r\n", i + 1, origin));
    }
    menu.push_str("Origin: ");
    menu
}
