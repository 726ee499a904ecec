//! Console command parsing.
//!
//! One command per line, space-separated tokens. Parsing never touches
//! fleet state: a line either becomes a [`Command`] or a [`CommandError`]
//! that is reported back to the console.

use std::str::FromStr;
use std::time::Duration;

use crate::error::CommandError;
use crate::fleet::Selector;
use crate::geometry::{BlockPos, Region};

/// Most agents a single `start` may spawn.
pub const MAX_START_COUNT: u32 = 1000;

pub const CLICKER_USAGE: &str = "clicker <start|stop|speed> <username|*> [interval]";

/// What a `clicker` line asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickerAction {
    Start,
    Stop,
    Speed(Duration),
}

/// A parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Spawn `count` agents named `username0..`, `delay` apart.
    Start {
        version: String,
        username: String,
        host: String,
        port: u16,
        count: u32,
        delay: Duration,
    },
    /// Disconnect and deregister.
    Stop(Selector),
    Goto { selector: Selector, x: i32, z: i32 },
    GotoStop(Selector),
    Follow { selector: Selector, player: String },
    FollowStop(Selector),
    Mine { selector: Selector, region: Region },
    MineStop(Selector),
    Find { selector: Selector, material: String },
    FindStop(Selector),
    Clicker {
        action: ClickerAction,
        selector: Selector,
    },
    Circle {
        selector: Selector,
        player: String,
        radius: f64,
    },
    CircleStop(Selector),
    Send { selector: Selector, message: String },
    List,
    Help,
}

/// Help text printed by the `help` command.
pub const HELP: &str = "\
start <version> <username> <host> <port> <count> <delay>
stop <username|*>
goto <username|*> <x> <z>         goto stop <username|*>
follow <username|*> <player>      follow stop <username|*>
mine <username|*> <minx> <miny> <minz> <maxx> <maxy> <maxz>
mine stop <username|*>
find <username|*> <material>      find stop <username|*>
clicker <start|stop|speed> <username|*> [interval]
circle <username|*> <player> <radius>
circle stop <username|*>
send <username|*> <message>
list
help";

struct Tokens<'a> {
    parts: Vec<&'a str>,
    next: usize,
}

impl<'a> Tokens<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            parts: line.split_whitespace().collect(),
            next: 0,
        }
    }

    fn peek(&self) -> Option<&'a str> {
        self.parts.get(self.next).copied()
    }

    fn word(&mut self, name: &'static str) -> Result<&'a str, CommandError> {
        let token = self.peek().ok_or(CommandError::MissingArgument(name))?;
        self.next += 1;
        Ok(token)
    }

    fn selector(&mut self) -> Result<Selector, CommandError> {
        self.word("username").map(Selector::parse)
    }

    fn number<T: FromStr>(&mut self, name: &'static str) -> Result<T, CommandError> {
        let token = self.word(name)?;
        token.parse().map_err(|_| CommandError::InvalidNumber {
            field: name,
            value: token.to_string(),
        })
    }

    fn out_of_range(&self, field: &'static str, reason: impl Into<String>) -> CommandError {
        CommandError::OutOfRange {
            field,
            value: self.parts[self.next - 1].to_string(),
            reason: reason.into(),
        }
    }

    /// A timer period in milliseconds. Zero is rejected.
    fn period(&mut self, name: &'static str) -> Result<Duration, CommandError> {
        let millis: u64 = self.number(name)?;
        if millis == 0 {
            return Err(self.out_of_range(name, "must be at least 1ms"));
        }
        Ok(Duration::from_millis(millis))
    }

    /// A finite, non-negative distance.
    fn distance(&mut self, name: &'static str) -> Result<f64, CommandError> {
        let value: f64 = self.number(name)?;
        if !value.is_finite() {
            return Err(CommandError::InvalidNumber {
                field: name,
                value: self.parts[self.next - 1].to_string(),
            });
        }
        if value < 0.0 {
            return Err(self.out_of_range(name, "must not be negative"));
        }
        Ok(value)
    }

    fn count(&mut self, name: &'static str) -> Result<u32, CommandError> {
        let count: u32 = self.number(name)?;
        if count > MAX_START_COUNT {
            return Err(self.out_of_range(name, format!("must be at most {}", MAX_START_COUNT)));
        }
        Ok(count)
    }

    /// Consume `stop` if it is the next token.
    fn stop(&mut self) -> bool {
        if self.peek() == Some("stop") {
            self.next += 1;
            true
        } else {
            false
        }
    }

    fn rest(&mut self) -> String {
        let rest = self.parts[self.next..].join(" ");
        self.next = self.parts.len();
        rest
    }
}

impl Command {
    /// Parse a console line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let mut tokens = Tokens::new(line);
        let Some(head) = tokens.peek() else {
            return Ok(None);
        };
        tokens.next += 1;

        let command = match head {
            "start" => Command::Start {
                version: tokens.word("version")?.to_string(),
                username: tokens.word("username")?.to_string(),
                host: tokens.word("host")?.to_string(),
                port: tokens.number("port")?,
                count: tokens.count("count")?,
                delay: Duration::from_millis(tokens.number("delay")?),
            },
            "stop" => Command::Stop(tokens.selector()?),
            "goto" if tokens.stop() => Command::GotoStop(tokens.selector()?),
            "goto" => Command::Goto {
                selector: tokens.selector()?,
                x: tokens.number("x")?,
                z: tokens.number("z")?,
            },
            "follow" if tokens.stop() => Command::FollowStop(tokens.selector()?),
            "follow" => Command::Follow {
                selector: tokens.selector()?,
                player: tokens.word("player")?.to_string(),
            },
            "mine" if tokens.stop() => Command::MineStop(tokens.selector()?),
            "mine" => {
                let selector = tokens.selector()?;
                let min = BlockPos::new(
                    tokens.number("minx")?,
                    tokens.number("miny")?,
                    tokens.number("minz")?,
                );
                let max = BlockPos::new(
                    tokens.number("maxx")?,
                    tokens.number("maxy")?,
                    tokens.number("maxz")?,
                );
                Command::Mine {
                    selector,
                    region: Region::new(min, max),
                }
            }
            "find" if tokens.stop() => Command::FindStop(tokens.selector()?),
            "find" => Command::Find {
                selector: tokens.selector()?,
                material: tokens.word("material")?.to_string(),
            },
            "clicker" => {
                let action = tokens.word("action").map_err(|_| CommandError::Usage(CLICKER_USAGE))?;
                let selector = tokens.selector()?;
                let action = match action {
                    "start" => ClickerAction::Start,
                    "stop" => ClickerAction::Stop,
                    "speed" => ClickerAction::Speed(tokens.period("interval")?),
                    _ => return Err(CommandError::Usage(CLICKER_USAGE)),
                };
                Command::Clicker { action, selector }
            }
            "circle" if tokens.stop() => Command::CircleStop(tokens.selector()?),
            "circle" => Command::Circle {
                selector: tokens.selector()?,
                player: tokens.word("player")?.to_string(),
                radius: tokens.distance("radius")?,
            },
            "send" => {
                let selector = tokens.selector()?;
                let message = tokens.rest();
                if message.is_empty() {
                    return Err(CommandError::MissingArgument("message"));
                }
                Command::Send { selector, message }
            }
            "list" => Command::List,
            "help" => Command::Help,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(Some(command))
    }
}
