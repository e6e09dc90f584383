//! Interactive commands read from stdin

use cadence_playback::LoopMode;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    Jump(usize),
    Seek(Duration),
    Volume(f32),
    Loop(LoopMode),
    Shuffle(bool),
    /// Append a file path or URL to the queue
    Add(String),
    Clear,
    Queue,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play | pause | stop | next | prev
  jump <n>          play the n-th song of the flattened queue
  seek <seconds>    move within the current song
  vol <0.0-1.0>     set the volume
  loop off|single|all
  shuffle on|off
  add <path|url>    append a song to the queue
  clear             empty the queue
  queue             print the queue
  status            print what is playing
  help | quit";

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "play" | "p" => Self::Play,
            "pause" => Self::Pause,
            "stop" => Self::Stop,
            "next" | "n" => Self::Next,
            "prev" | "previous" => Self::Previous,
            "jump" | "j" => Self::Jump(parse_arg(rest, "jump <n>")?),
            "seek" => {
                let seconds: f64 = parse_arg(rest, "seek <seconds>")?;
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(format!("invalid position: {rest}"));
                }
                Self::Seek(Duration::from_secs_f64(seconds))
            }
            "vol" | "volume" => Self::Volume(parse_arg(rest, "vol <0.0-1.0>")?),
            "loop" => Self::Loop(match rest {
                "off" => LoopMode::Off,
                "single" | "one" => LoopMode::Single,
                "all" => LoopMode::All,
                _ => return Err("usage: loop off|single|all".to_string()),
            }),
            "shuffle" => Self::Shuffle(match rest {
                "on" | "true" => true,
                "off" | "false" => false,
                _ => return Err("usage: shuffle on|off".to_string()),
            }),
            "add" if !rest.is_empty() => Self::Add(rest.to_string()),
            "add" => return Err("usage: add <path|url>".to_string()),
            "clear" => Self::Clear,
            "queue" | "ls" => Self::Queue,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            "" => return Err(String::new()),
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(command)
    }
}

fn parse_arg<T: FromStr>(arg: &str, usage: &str) -> Result<T, String> {
    arg.parse().map_err(|_| format!("usage: {usage}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!("play".parse::<Command>(), Ok(Command::Play));
        assert_eq!("  NEXT ".parse::<Command>(), Ok(Command::Next));
        assert_eq!("prev".parse::<Command>(), Ok(Command::Previous));
        assert_eq!("q".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn parses_arguments() {
        assert_eq!("jump 3".parse::<Command>(), Ok(Command::Jump(3)));
        assert_eq!("vol 0.5".parse::<Command>(), Ok(Command::Volume(0.5)));
        assert_eq!(
            "seek 1.5".parse::<Command>(),
            Ok(Command::Seek(Duration::from_millis(1500)))
        );
        assert_eq!(
            "loop single".parse::<Command>(),
            Ok(Command::Loop(LoopMode::Single))
        );
        assert_eq!("shuffle on".parse::<Command>(), Ok(Command::Shuffle(true)));
    }

    #[test]
    fn add_keeps_spaces_in_paths() {
        assert_eq!(
            "add /music/Some Album/01 Intro.flac".parse::<Command>(),
            Ok(Command::Add("/music/Some Album/01 Intro.flac".to_string()))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!("jump".parse::<Command>().is_err());
        assert!("jump -1".parse::<Command>().is_err());
        assert!("seek -2".parse::<Command>().is_err());
        assert!("loop sometimes".parse::<Command>().is_err());
        assert!("add".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().unwrap_err().contains("unknown command"));
        assert_eq!("".parse::<Command>(), Err(String::new()));
    }
}
