//! Operator console commands.
//!
//! One command per line, verbs are case-insensitive:
//!
//! | command          | effect                                  |
//! |------------------|-----------------------------------------|
//! | `xy <x> <y>`     | planar stick (vx, vy)                   |
//! | `z <v>`          | vertical slider (vz)                    |
//! | `py <x> <y>`     | attitude stick (yaw from x, pitch from y) |
//! | `roll <v>`       | roll slider                             |
//! | `center`, `c`    | release every stick                     |
//! | `record`, `r`    | start recording a take                  |
//! | `send`, `s`      | stop recording and upload the take      |
//! | `status`         | print link, control and audio state     |
//! | `quit`, `q`, `exit` | stop everything and exit             |
//!
//! Stick values are raw deflections, nominally in [-1, 1].

use crate::error::{Result, SarathiError};

/// Short usage text printed on `help` or a parse error.
pub const USAGE: &str = "commands: xy <x> <y> | z <v> | py <x> <y> | roll <v> | center | record | send | status | quit";

/// A parsed console line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OperatorCommand {
    Planar { x: f32, y: f32 },
    Vertical { v: f32 },
    PitchYaw { x: f32, y: f32 },
    Roll { v: f32 },
    Center,
    Record,
    Send,
    Status,
    Help,
    Quit,
}

impl OperatorCommand {
    /// Parse one line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let cmd = match verb.to_ascii_lowercase().as_str() {
            "xy" => {
                let [x, y] = floats::<2>(verb, &args)?;
                OperatorCommand::Planar { x, y }
            }
            "z" => {
                let [v] = floats::<1>(verb, &args)?;
                OperatorCommand::Vertical { v }
            }
            "py" => {
                let [x, y] = floats::<2>(verb, &args)?;
                OperatorCommand::PitchYaw { x, y }
            }
            "roll" => {
                let [v] = floats::<1>(verb, &args)?;
                OperatorCommand::Roll { v }
            }
            "center" | "c" => no_args(verb, &args, OperatorCommand::Center)?,
            "record" | "r" => no_args(verb, &args, OperatorCommand::Record)?,
            "send" | "s" => no_args(verb, &args, OperatorCommand::Send)?,
            "status" => no_args(verb, &args, OperatorCommand::Status)?,
            "help" | "?" => OperatorCommand::Help,
            "quit" | "q" | "exit" => OperatorCommand::Quit,
            other => return Err(SarathiError::Parse(format!("unknown command '{}'", other))),
        };
        Ok(Some(cmd))
    }
}

fn floats<const N: usize>(verb: &str, args: &[&str]) -> Result<[f32; N]> {
    if args.len() != N {
        return Err(SarathiError::Parse(format!(
            "'{}' takes {} value(s), got {}",
            verb,
            N,
            args.len()
        )));
    }
    let mut out = [0.0f32; N];
    for (slot, raw) in out.iter_mut().zip(args) {
        let value: f32 = raw
            .parse()
            .map_err(|_| SarathiError::Parse(format!("'{}' is not a number", raw)))?;
        if !value.is_finite() {
            return Err(SarathiError::Parse(format!("'{}' is not finite", raw)));
        }
        *slot = value;
    }
    Ok(out)
}

fn no_args(verb: &str, args: &[&str], cmd: OperatorCommand) -> Result<OperatorCommand> {
    if args.is_empty() {
        Ok(cmd)
    } else {
        Err(SarathiError::Parse(format!("'{}' takes no arguments", verb)))
    }
}
