//! Command parsing: one typed line to one [`Command`].
//!
//! Commands match by prefix ("kil troll" works), except `quit`, which
//! must be spelled out. Parsing is pure; execution lives in the
//! gateway, which owns the world.

use embermud_world::Direction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Kill(String),
    Flee,
    Get(String),
    Drop(String),
    Give { item: String, target: String },
    Rest,
    Sleep,
    Stand,
    Say(String),
    Save,
    Quit,
}

/// Parses one line. `Err` carries the denial text to show the player.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(String::new());
    };
    let verb = verb.to_ascii_lowercase();

    if let Some(direction) = Direction::parse(&verb) {
        return Ok(Command::Move(direction));
    }

    let args: Vec<&str> = words.collect();
    let rest = args.join(" ");
    let arg = |prompt: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(prompt.to_owned())
        } else {
            Ok(rest.clone())
        }
    };

    // First match wins, so "s" is south (above) and "sa" is say.
    if "kill".starts_with(&verb) {
        return Ok(Command::Kill(arg("Kill whom?")?));
    }
    if "flee".starts_with(&verb) {
        return Ok(Command::Flee);
    }
    if "get".starts_with(&verb) || "take".starts_with(&verb) {
        return Ok(Command::Get(arg("Get what?")?));
    }
    if "drop".starts_with(&verb) {
        return Ok(Command::Drop(arg("Drop what?")?));
    }
    if "give".starts_with(&verb) {
        match args.as_slice() {
            [item, target, ..] => {
                return Ok(Command::Give {
                    item: (*item).to_owned(),
                    target: (*target).to_owned(),
                });
            }
            _ => return Err("Give what to whom?".to_owned()),
        }
    }
    if "rest".starts_with(&verb) {
        return Ok(Command::Rest);
    }
    if "sleep".starts_with(&verb) {
        return Ok(Command::Sleep);
    }
    if "stand".starts_with(&verb) || "wake".starts_with(&verb) {
        return Ok(Command::Stand);
    }
    if "say".starts_with(&verb) {
        return Ok(Command::Say(arg("Say what?")?));
    }
    if "save".starts_with(&verb) {
        return Ok(Command::Save);
    }
    if verb == "quit" {
        return Ok(Command::Quit);
    }
    if "quit".starts_with(&verb) {
        return Err("If you want to QUIT, you have to spell it out.".to_owned());
    }

    Err("Huh?".to_owned())
}
