//! Command-line parsing.
//!
//! Takes the bytes of one CRLF-stripped control line and splits it into a
//! verb plus a verbatim argument slice, so path arguments reach the
//! filesystem backend exactly as the client sent them.

/// The verbs the engine recognises. Everything else parses as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    User,
    Pass,
    Quit,
    Noop,
    Syst,
    Type,
    Feat,
    Pasv,
    List,
    Retr,
    Stor,
    Pwd,
    Cwd,
    Cdup,
    Dele,
    Rnfr,
    Rnto,
    Mkd,
    Rmd,
    Size,
    Mdtm,
    Unknown,
}

/// One parsed command. `arg` borrows the input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    pub verb: Verb,
    pub arg: &'a [u8],
}

fn trim_spaces(mut bytes: &[u8]) -> &[u8] {
    while let [b' ', rest @ ..] = bytes {
        bytes = rest;
    }
    while let [rest @ .., b' '] = bytes {
        bytes = rest;
    }
    bytes
}

fn verb_of(word: &[u8]) -> Verb {
    const TABLE: &[(&[u8], Verb)] = &[
        (b"USER", Verb::User),
        (b"PASS", Verb::Pass),
        (b"QUIT", Verb::Quit),
        (b"NOOP", Verb::Noop),
        (b"SYST", Verb::Syst),
        (b"TYPE", Verb::Type),
        (b"FEAT", Verb::Feat),
        (b"PASV", Verb::Pasv),
        (b"LIST", Verb::List),
        (b"RETR", Verb::Retr),
        (b"STOR", Verb::Stor),
        (b"PWD", Verb::Pwd),
        (b"CWD", Verb::Cwd),
        (b"CDUP", Verb::Cdup),
        (b"DELE", Verb::Dele),
        (b"RNFR", Verb::Rnfr),
        (b"RNTO", Verb::Rnto),
        (b"MKD", Verb::Mkd),
        (b"RMD", Verb::Rmd),
        (b"SIZE", Verb::Size),
        (b"MDTM", Verb::Mdtm),
    ];
    for (name, verb) in TABLE {
        if word.eq_ignore_ascii_case(name) {
            return *verb;
        }
    }
    Verb::Unknown
}

/// Parses one CRLF-stripped control line.
///
/// Leading and trailing ASCII spaces are trimmed; the verb is matched
/// case-insensitively; the argument is everything after the first space,
/// trimmed but otherwise byte-for-byte intact.
pub fn parse(line: &[u8]) -> Command<'_> {
    let line = trim_spaces(line);
    if line.is_empty() {
        return Command {
            verb: Verb::Unknown,
            arg: b"",
        };
    }
    match line.iter().position(|&b| b == b' ') {
        Some(split) => Command {
            verb: verb_of(&line[..split]),
            arg: trim_spaces(&line[split + 1..]),
        },
        None => Command {
            verb: verb_of(line),
            arg: b"",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_verbs() {
        assert_eq!(parse(b"QUIT").verb, Verb::Quit);
        assert_eq!(parse(b"PASV").verb, Verb::Pasv);
        assert_eq!(parse(b"FEAT").verb, Verb::Feat);
        assert_eq!(parse(b"PWD").verb, Verb::Pwd);
        assert_eq!(parse(b"CDUP").verb, Verb::Cdup);
    }

    #[test]
    fn parses_verbs_with_args() {
        let cmd = parse(b"USER alice");
        assert_eq!(cmd.verb, Verb::User);
        assert_eq!(cmd.arg, b"alice");

        let cmd = parse(b"RETR readme.txt");
        assert_eq!(cmd.verb, Verb::Retr);
        assert_eq!(cmd.arg, b"readme.txt");
    }

    #[test]
    fn verb_match_is_case_insensitive() {
        assert_eq!(parse(b"user alice").verb, Verb::User);
        assert_eq!(parse(b"StOr f").verb, Verb::Stor);
    }

    #[test]
    fn argument_bytes_are_preserved() {
        let cmd = parse(b"CWD Pub/My Files");
        assert_eq!(cmd.verb, Verb::Cwd);
        assert_eq!(cmd.arg, b"Pub/My Files");

        // Non-UTF-8 path bytes pass through untouched.
        let cmd = parse(b"DELE \xffname");
        assert_eq!(cmd.verb, Verb::Dele);
        assert_eq!(cmd.arg, b"\xffname");
    }

    #[test]
    fn trims_surrounding_spaces() {
        let cmd = parse(b"  LIST   pub  ");
        assert_eq!(cmd.verb, Verb::List);
        assert_eq!(cmd.arg, b"pub");
    }

    #[test]
    fn empty_and_unknown_lines() {
        assert_eq!(parse(b"").verb, Verb::Unknown);
        assert_eq!(parse(b"   ").verb, Verb::Unknown);
        assert_eq!(parse(b"EPSV").verb, Verb::Unknown);
        assert_eq!(parse(b"PORT 1,2,3,4,5,6").verb, Verb::Unknown);
        assert_eq!(parse(b"ABOR").verb, Verb::Unknown);
    }
}
