//! Line-oriented command interpreter over the file store.
//!
//! # Responsibility
//! - Parse one command per line and dispatch it to `FileStorage`.
//! - Own every user-facing message; the store only reports conditions.
//!
//! # Invariants
//! - Kind names are validated against the store's registry before dispatch.
//! - Store I/O failures are returned to the caller, never printed and skipped.

use anyhow::Result;
use hbnb_core::{FileStorage, Record, ReloadOutcome};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt::Write as _;
use std::io::{BufRead, Write};

pub const PROMPT: &str = "(hbnb) ";

const MSG_CLASS_MISSING: &str = "** class name missing **";
const MSG_CLASS_UNKNOWN: &str = "** class doesn't exist **";
const MSG_ID_MISSING: &str = "** class name or ID missing **";
const MSG_UPDATE_ARGS_MISSING: &str = "** class name, ID, attribute name, or value missing **";
const MSG_NOT_FOUND: &str = "** no instance found **";
const MSG_DELETED: &str = "** instance deleted **";
const MSG_UPDATED: &str = "** instance updated **";
const MSG_LOAD_FAILED: &str = "** Error loading the JSON file **";

const COMMANDS: &[(&str, &str)] = &[
    ("create", "create <Kind>: create a record, save it, and print its id"),
    ("show", "show <Kind> <id>: print one record"),
    ("destroy", "destroy <Kind> <id>: delete one record"),
    ("all", "all [<Kind>]: print every record, or every record of one kind"),
    (
        "update",
        "update <Kind> <id> <attribute> \"<value>\": set one attribute and save; \
         quote values with spaces, words past the value are ignored",
    ),
    ("help", "help [<command>]: list commands or describe one"),
    ("quit", "quit: exit the interpreter"),
    ("EOF", "EOF: exit the interpreter"),
];

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]*)"|(\S+)"#).expect("valid token regex"));

/// Whether the loop keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console<W: Write> {
    storage: FileStorage,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(storage: FileStorage, out: W) -> Self {
        Self { storage, out }
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    /// Loads the backing file into the store.
    pub fn startup(&mut self) -> Result<()> {
        match self.storage.reload()? {
            ReloadOutcome::Malformed { .. } => writeln!(self.out, "{MSG_LOAD_FAILED}")?,
            ReloadOutcome::Loaded { loaded, skipped } => {
                info!("event=console_start module=console status=ok loaded={loaded} skipped={skipped}");
            }
            ReloadOutcome::MissingFile => {
                info!("event=console_start module=console status=ok loaded=0");
            }
        }
        Ok(())
    }

    /// Reads commands until `quit`, `EOF`, or end of input.
    pub fn run<R: BufRead>(&mut self, mut input: R, show_prompt: bool) -> Result<()> {
        let mut line = String::new();
        loop {
            if show_prompt {
                write!(self.out, "{PROMPT}")?;
                self.out.flush()?;
            }
            line.clear();
            if input.read_line(&mut line)? == 0 {
                if show_prompt {
                    writeln!(self.out)?;
                }
                return Ok(());
            }
            if self.execute(&line)? == Flow::Quit {
                return Ok(());
            }
        }
    }

    /// Executes one command line.
    pub fn execute(&mut self, line: &str) -> Result<Flow> {
        let line = line.trim();
        let tokens = tokenize(line);
        let Some((command, args)) = tokens.split_first() else {
            return Ok(Flow::Continue);
        };
        debug!("event=command module=console name={command} args={}", args.len());

        match command.as_str() {
            "create" => self.create(args)?,
            "show" => self.show(args)?,
            "destroy" => self.destroy(args)?,
            "all" => self.all(args)?,
            "update" => self.update(args)?,
            "help" => self.help(args)?,
            "quit" | "EOF" => return Ok(Flow::Quit),
            _ => writeln!(self.out, "*** Unknown syntax: {line}")?,
        }
        self.out.flush()?;
        Ok(Flow::Continue)
    }

    fn create(&mut self, args: &[String]) -> Result<()> {
        let Some(kind) = args.first() else {
            return self.say(MSG_CLASS_MISSING);
        };
        if !self.storage.kinds().contains(kind) {
            return self.say(MSG_CLASS_UNKNOWN);
        }

        let id = self.storage.create(kind)?.id().to_string();
        self.storage.save_object(kind, &id)?;
        self.say(&id)
    }

    fn show(&mut self, args: &[String]) -> Result<()> {
        let Some((kind, id)) = self.kind_and_id(args)? else {
            return Ok(());
        };
        match self.storage.get(kind, id) {
            Some(record) => {
                writeln!(self.out, "{record}")?;
                Ok(())
            }
            None => self.say(MSG_NOT_FOUND),
        }
    }

    fn destroy(&mut self, args: &[String]) -> Result<()> {
        let Some((kind, id)) = self.kind_and_id(args)? else {
            return Ok(());
        };
        if self.storage.delete(kind, id)? {
            self.say(MSG_DELETED)
        } else {
            self.say(MSG_NOT_FOUND)
        }
    }

    fn all(&mut self, args: &[String]) -> Result<()> {
        let prefix = match args.first() {
            Some(kind) if !self.storage.kinds().contains(kind) => {
                return self.say(MSG_CLASS_UNKNOWN);
            }
            Some(kind) => Some(format!("{kind}.")),
            None => None,
        };

        let mut rendered = Vec::new();
        for (key, record) in self.storage.all() {
            if prefix.as_deref().map_or(true, |prefix| key.starts_with(prefix)) {
                let mut text = String::new();
                write!(text, "{record}")?;
                rendered.push(text);
            }
        }
        let listing = render_list(&rendered);
        self.say(&listing)
    }

    fn update(&mut self, args: &[String]) -> Result<()> {
        let [kind, id, attribute, value, ignored @ ..] = args else {
            return self.say(MSG_UPDATE_ARGS_MISSING);
        };
        if !ignored.is_empty() {
            debug!(
                "event=command_update module=cli status=ignored_args count={}",
                ignored.len()
            );
        }
        if !self.storage.kinds().contains(kind) {
            return self.say(MSG_CLASS_UNKNOWN);
        }

        let assigned = match self.storage.get_mut(kind, id) {
            Some(record) => record.set_attribute(attribute, Value::String(value.clone())),
            None => return self.say(MSG_NOT_FOUND),
        };
        if let Err(err) = assigned {
            return self.say(&format!("** {err} **"));
        }
        self.storage.save_object(kind, id)?;
        self.say(MSG_UPDATED)
    }

    fn help(&mut self, args: &[String]) -> Result<()> {
        match args.first() {
            Some(topic) => match COMMANDS.iter().find(|(name, _)| *name == topic.as_str()) {
                Some((_, usage)) => self.say(usage),
                None => self.say(&format!("*** No help on {topic}")),
            },
            None => {
                let names = COMMANDS
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join("  ");
                let kinds = self.storage.kinds().names().collect::<Vec<_>>().join(", ");
                self.say(&format!(
                    "Documented commands (type help <topic>):\n{names}\nKinds: {kinds}"
                ))
            }
        }
    }

    /// Validates `<Kind> <id>` arguments, printing the failure message when invalid.
    fn kind_and_id<'a>(&mut self, args: &'a [String]) -> Result<Option<(&'a str, &'a str)>> {
        let [kind, id, ..] = args else {
            self.say(MSG_ID_MISSING)?;
            return Ok(None);
        };
        if !self.storage.kinds().contains(kind) {
            self.say(MSG_CLASS_UNKNOWN)?;
            return Ok(None);
        }
        Ok(Some((kind.as_str(), id.as_str())))
    }

    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.out, "{message}")?;
        Ok(())
    }
}

/// Splits a line on whitespace; double-quoted spans form one token without quotes.
pub fn tokenize(line: &str) -> Vec<String> {
    TOKEN_RE
        .captures_iter(line)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|token| token.as_str().to_string())
        .collect()
}

/// Rebuilds a command line from already-split arguments.
pub fn join_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("\"{arg}\"")
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_list(items: &[String]) -> String {
    let quoted = items
        .iter()
        .map(|item| format!("\"{}\"", item.replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{quoted}]")
}
