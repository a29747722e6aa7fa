//! G-code line tokenizer

use super::GcodeCommand;

/// Tokenize one line of G-code.
///
/// Tokenizing never fails: anything that is not a recognisable word is
/// ignored, and the raw text is always preserved.
pub fn parse_line(line: &str) -> GcodeCommand {
    let raw = line.trim_end_matches(['\r', '\n']);
    let (code, comment) = match raw.find(';') {
        Some(pos) => (&raw[..pos], Some(raw[pos + 1..].to_string())),
        None => (raw, None),
    };

    let mut command = GcodeCommand {
        raw: raw.to_string(),
        comment,
        ..GcodeCommand::default()
    };

    let chars: Vec<char> = code.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if !ch.is_ascii_alphabetic() {
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < chars.len() && is_number_char(chars[end]) {
            end += 1;
        }
        let number: String = chars[start..end].iter().collect();
        i = end;

        let letter = ch.to_ascii_uppercase();
        if command.mnemonic.is_empty()
            && command.params.is_empty()
            && command.flags.is_empty()
            && matches!(letter, 'G' | 'M' | 'T')
            && !number.is_empty()
        {
            command.mnemonic = normalize_mnemonic(letter, &number);
            continue;
        }

        let key = letter.to_ascii_lowercase();
        match number.parse::<f32>() {
            Ok(value) if !number.is_empty() => {
                command.params.insert(key, value);
            }
            _ => {
                command.flags.insert(key);
            }
        }
    }

    command
}

fn is_number_char(ch: char) -> bool {
    ch.is_ascii_digit() || ch == '.' || ch == '-' || ch == '+'
}

/// "G01" becomes "G1"; "G29.1" stays as written
fn normalize_mnemonic(letter: char, number: &str) -> String {
    match number.parse::<u32>() {
        Ok(code) => format!("{}{}", letter, code),
        Err(_) => format!("{}{}", letter, number),
    }
}
