//! Shell command grammar.
//!
//! Four bare keywords and a modal id entry; `winnow` insists on full-line
//! matches so trailing garbage reads as an unknown command instead of a
//! silent prefix match.

use winnow::ModalResult;
use winnow::Parser;
use winnow::ascii::dec_uint;
use winnow::combinator::alt;
use winnow::error::ContextError;

use crate::node::NodeId;

/// Console prompt.
pub const PROMPT: &str = "$ ";

/// Reply to `help`.
pub const HELP_TEXT: &str = "Commands:\n\
\tchange_id - change station ID\n\
\tget_id    - get station ID\n\
\thelp      - print this information\n\
\tstatus    - print node status";

/// Reply to anything that is not a command.
pub const UNKNOWN_TEXT: &str = "No such command, try 'help' to list available commands.";

/// Modal prompt printed by `change_id`.
pub const ID_PROMPT_TEXT: &str = "Please enter new ID (0..65535):";

/// Reply when the modal id entry does not parse.
pub const BAD_ID_TEXT: &str = "Not a valid ID, keeping the current one.";

/// Notice printed when a console line outgrows the editor.
pub const LINE_TOO_LONG_TEXT: &str = "Line too long, discarded.";

/// Parsed operator commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    GetId,
    ChangeId,
    Status,
}

fn command(input: &mut &str) -> ModalResult<ShellCommand> {
    alt((
        "change_id".value(ShellCommand::ChangeId),
        "get_id".value(ShellCommand::GetId),
        "help".value(ShellCommand::Help),
        "status".value(ShellCommand::Status),
    ))
    .parse_next(input)
}

/// Parses one command line. `None` means "no such command".
#[must_use]
pub fn parse_command(line: &str) -> Option<ShellCommand> {
    command.parse(line.trim()).ok()
}

/// Parses the modal id entry line as a full decimal `u16`.
#[must_use]
pub fn parse_id_entry(line: &str) -> Option<NodeId> {
    dec_uint::<_, u16, ContextError>
        .parse(line.trim())
        .ok()
        .map(NodeId::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_parse_to_their_commands() {
        assert_eq!(parse_command("help"), Some(ShellCommand::Help));
        assert_eq!(parse_command("get_id"), Some(ShellCommand::GetId));
        assert_eq!(parse_command("change_id"), Some(ShellCommand::ChangeId));
        assert_eq!(parse_command("status"), Some(ShellCommand::Status));
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        assert_eq!(parse_command("  help  "), Some(ShellCommand::Help));
        assert_eq!(parse_command("\tget_id"), Some(ShellCommand::GetId));
    }

    #[test]
    fn near_misses_are_unknown() {
        assert_eq!(parse_command("helpme"), None);
        assert_eq!(parse_command("get_idx"), None);
        assert_eq!(parse_command("change_id 5"), None);
        assert_eq!(parse_command("HELP"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn id_entry_accepts_the_full_u16_range() {
        assert_eq!(parse_id_entry("0"), Some(NodeId::new(0)));
        assert_eq!(parse_id_entry("65535"), Some(NodeId::new(u16::MAX)));
        assert_eq!(parse_id_entry(" 42 "), Some(NodeId::new(42)));
        assert_eq!(parse_id_entry("65536"), None);
        assert_eq!(parse_id_entry("seven"), None);
        assert_eq!(parse_id_entry(""), None);
    }
}
