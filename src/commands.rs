//! Stdin commands accepted by the terminal runner

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Connect to the given serial, or prompt when none is given
    Connect(Option<String>),
    /// Connect to the first authorized device
    AutoConnect,
    Disconnect,
    Status,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "\
commands:
  connect [SERIAL]  connect to SERIAL, or choose from attached devices
  auto              connect to the first authorized device
  disconnect        end the current session
  status            print the current session
  quit              release the device and exit";

/// Parse one stdin line; blank lines yield `None`
pub fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let verb = words.next()?;

    let command = match verb {
        "c" | "connect" => Command::Connect(words.next().map(str::to_string)),
        "a" | "auto" => Command::AutoConnect,
        "d" | "disconnect" => Command::Disconnect,
        "s" | "status" => Command::Status,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect() {
        assert_eq!(parse_command("connect"), Some(Command::Connect(None)));
        assert_eq!(
            parse_command("  c  0123ABC "),
            Some(Command::Connect(Some("0123ABC".to_string())))
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("auto"), Some(Command::AutoConnect));
        assert_eq!(parse_command("d"), Some(Command::Disconnect));
        assert_eq!(parse_command("status"), Some(Command::Status));
        assert_eq!(parse_command("?"), Some(Command::Help));
        assert_eq!(parse_command("exit"), Some(Command::Quit));
    }

    #[test]
    fn test_parse_blank_and_unknown() {
        assert_eq!(parse_command("   "), None);
        assert_eq!(
            parse_command("reboot now"),
            Some(Command::Unknown("reboot".to_string()))
        );
    }
}
