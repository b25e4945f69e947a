//! PGN export for finished or in-progress games.

use crate::game_data::GameData;

/// Render a game as PGN: the seven-tag roster plus optional extras, then movetext
/// wrapped at 80 columns and terminated by the result token.
pub fn write_pgn(game: &GameData) -> String {
    let meta = &game.metadata;
    let mut out = String::new();

    push_tag(&mut out, "Event", &meta.event);
    push_tag(&mut out, "Site", &meta.site);
    push_tag(&mut out, "Date", &meta.date);
    push_tag(&mut out, "Round", "-");
    push_tag(&mut out, "White", &meta.white);
    push_tag(&mut out, "Black", &meta.black);
    push_tag(&mut out, "Result", &meta.result);
    if let Some(ref tc) = meta.time_control {
        push_tag(&mut out, "TimeControl", tc);
    }
    if let Some(ref termination) = meta.termination {
        push_tag(&mut out, "Termination", termination);
    }
    out.push('\n');

    let mut tokens: Vec<String> = Vec::with_capacity(game.moves.len() * 3 / 2 + 1);
    for (i, san) in game.moves.iter().enumerate() {
        if i % 2 == 0 {
            tokens.push(format!("{}.", i / 2 + 1));
        }
        tokens.push(san.clone());
    }
    tokens.push(meta.result.clone());

    let mut line_len = 0;
    for token in tokens {
        if line_len > 0 && line_len + 1 + token.len() > 80 {
            out.push('\n');
            line_len = 0;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        line_len += token.len();
        out.push_str(&token);
    }
    out.push('\n');

    out
}

fn push_tag(out: &mut String, key: &str, value: &str) {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    out.push_str(&format!("[{key} \"{escaped}\"]\n"));
}
