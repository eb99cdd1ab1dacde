//! Command/Status Surface: the single-byte-opcode control protocol the peer
//! writes to the Record Control characteristic, plus the status codes and
//! record layouts returned on the Status characteristic.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("command buffer is empty")]
    Empty,
    #[error("unrecognized opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("wrong length for this opcode")]
    BadLength,
    #[error("start-named command has an empty or non-UTF-8 filename")]
    InvalidFilename,
}

/// One decoded command from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Start,
    Pause,
    Resume,
    SelectFile(u8),
    ListFiles,
    Stop,
    StartNamed(String),
}

const OPCODE_START: u8 = 0x01;
const OPCODE_PAUSE: u8 = 0x02;
const OPCODE_RESUME: u8 = 0x03;
const OPCODE_SELECT_FILE: u8 = 0x04;
const OPCODE_LIST_FILES: u8 = 0x05;
const OPCODE_STOP: u8 = 0x06;
const OPCODE_START_WITH_FILENAME: u8 = 0x07;

/// Parses one write to the Record Control characteristic into a command,
/// enforcing the strict per-opcode length rule.
pub fn parse_command(bytes: &[u8]) -> Result<ParsedCommand, CommandError> {
    let (opcode, rest) = bytes.split_first().ok_or(CommandError::Empty)?;
    match *opcode {
        OPCODE_START if rest.is_empty() => Ok(ParsedCommand::Start),
        OPCODE_PAUSE if rest.is_empty() => Ok(ParsedCommand::Pause),
        OPCODE_RESUME if rest.is_empty() => Ok(ParsedCommand::Resume),
        OPCODE_LIST_FILES if rest.is_empty() => Ok(ParsedCommand::ListFiles),
        OPCODE_STOP if rest.is_empty() => Ok(ParsedCommand::Stop),
        OPCODE_SELECT_FILE if rest.len() == 1 => Ok(ParsedCommand::SelectFile(rest[0])),
        OPCODE_START_WITH_FILENAME if !rest.is_empty() => {
            let name = std::str::from_utf8(rest).map_err(|_| CommandError::InvalidFilename)?;
            Ok(ParsedCommand::StartNamed(name.to_string()))
        }
        OPCODE_START | OPCODE_PAUSE | OPCODE_RESUME | OPCODE_LIST_FILES | OPCODE_STOP
        | OPCODE_SELECT_FILE | OPCODE_START_WITH_FILENAME => Err(CommandError::BadLength),
        other => Err(CommandError::UnknownOpcode(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zero_argument_opcodes() {
        assert_eq!(parse_command(&[0x01]), Ok(ParsedCommand::Start));
        assert_eq!(parse_command(&[0x02]), Ok(ParsedCommand::Pause));
        assert_eq!(parse_command(&[0x03]), Ok(ParsedCommand::Resume));
        assert_eq!(parse_command(&[0x05]), Ok(ParsedCommand::ListFiles));
        assert_eq!(parse_command(&[0x06]), Ok(ParsedCommand::Stop));
    }

    #[test]
    fn parses_select_file_index() {
        assert_eq!(parse_command(&[0x04, 3]), Ok(ParsedCommand::SelectFile(3)));
        assert_eq!(parse_command(&[0x04]), Err(CommandError::BadLength));
        assert_eq!(parse_command(&[0x04, 1, 2]), Err(CommandError::BadLength));
    }

    #[test]
    fn parses_start_named_filename() {
        assert_eq!(
            parse_command(&[0x07, b'a', b'.', b'r', b'a', b'w']),
            Ok(ParsedCommand::StartNamed("a.raw".to_string()))
        );
        assert_eq!(parse_command(&[0x07]), Err(CommandError::BadLength));
    }

    #[test]
    fn rejects_wrong_length_zero_argument_opcodes() {
        assert_eq!(parse_command(&[0x01, 0]), Err(CommandError::BadLength));
        assert_eq!(parse_command(&[0x06, 9]), Err(CommandError::BadLength));
    }

    #[test]
    fn rejects_empty_and_unknown_opcodes() {
        assert_eq!(parse_command(&[]), Err(CommandError::Empty));
        assert_eq!(
            parse_command(&[0xEE]),
            Err(CommandError::UnknownOpcode(0xEE))
        );
    }
}
