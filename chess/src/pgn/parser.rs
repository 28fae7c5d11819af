use std::collections::HashMap;

/// A parsed PGN game
#[derive(Debug, Clone, Default)]
pub struct PgnGame {
    pub tags: HashMap<String, String>,
    pub moves: Vec<PgnMove>,
    pub result: Option<GameResult>,
}

/// A single move in PGN with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct PgnMove {
    /// SAN as written, with move-quality glyphs removed
    pub san: String,
    pub comment: Option<String>,
    pub nags: Vec<u8>, // Numeric Annotation Glyphs (!!, ?, etc.)
    /// Alternatives to this move, each starting from the position before it
    pub variations: Vec<Vec<PgnMove>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    Ongoing,
}

impl PgnGame {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    /// Custom starting position from the `FEN` tag, if present.
    pub fn starting_fen(&self) -> Option<&str> {
        self.tag("FEN")
    }

    /// Total number of moves including every nested variation.
    pub fn ply_count(&self) -> usize {
        fn count(line: &[PgnMove]) -> usize {
            line.iter()
                .map(|m| 1 + m.variations.iter().map(|v| count(v)).sum::<usize>())
                .sum()
        }
        count(&self.moves)
    }
}

impl PgnMove {
    fn new(san: String) -> Self {
        Self {
            san,
            comment: None,
            nags: Vec::new(),
            variations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Tag(String, String),
    Move(String, Option<u8>),
    Nag(u8),
    Comment(String),
    Open,
    Close,
    Result(GameResult),
}

/// Parse a PGN document containing one or more games.
///
/// Games may omit tag pairs and results. Fails only when no move at all
/// could be recovered from the text.
pub fn parse_pgn(input: &str) -> Result<Vec<PgnGame>, PgnError> {
    let tokens = tokenize(input);
    let mut builder = GameBuilder::default();

    for token in tokens {
        match token {
            Token::Tag(name, value) => {
                if builder.has_moves() {
                    builder.finish();
                }
                builder.game.tags.insert(name, value);
            }
            Token::Move(san, glyph) => {
                let mut mv = PgnMove::new(san);
                mv.nags.extend(glyph);
                builder.current_line().push(mv);
            }
            Token::Nag(nag) => {
                if let Some(last) = builder.current_line().last_mut() {
                    last.nags.push(nag);
                }
            }
            Token::Comment(text) => {
                if let Some(last) = builder.current_line().last_mut() {
                    last.comment = Some(text);
                }
            }
            Token::Open => builder.open_variation(),
            Token::Close => builder.close_variation(),
            Token::Result(result) => {
                builder.game.result = Some(result);
                builder.finish();
            }
        }
    }
    builder.finish();

    let games = builder.games;
    if games.iter().all(|g| g.moves.is_empty()) {
        return Err(PgnError::NoMoves);
    }
    tracing::debug!(games = games.len(), "Parsed PGN document");
    Ok(games)
}

#[derive(Default)]
struct GameBuilder {
    games: Vec<PgnGame>,
    game: PgnGame,
    /// Open variations, innermost last. Empty while on the main line.
    variations: Vec<Vec<PgnMove>>,
}

impl GameBuilder {
    fn has_moves(&self) -> bool {
        !self.game.moves.is_empty() || !self.variations.is_empty()
    }

    fn current_line(&mut self) -> &mut Vec<PgnMove> {
        match self.variations.last_mut() {
            Some(line) => line,
            None => &mut self.game.moves,
        }
    }

    fn open_variation(&mut self) {
        self.variations.push(Vec::new());
    }

    fn close_variation(&mut self) {
        let Some(variation) = self.variations.pop() else {
            tracing::debug!("Ignoring unmatched ')' in PGN");
            return;
        };
        if variation.is_empty() {
            return;
        }
        match self.current_line().last_mut() {
            Some(parent) => parent.variations.push(variation),
            None => tracing::debug!("Dropping variation with no preceding move"),
        }
    }

    fn finish(&mut self) {
        while !self.variations.is_empty() {
            self.close_variation();
        }
        let game = std::mem::take(&mut self.game);
        if !game.moves.is_empty() || !game.tags.is_empty() {
            self.games.push(game);
        }
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut at_line_start = true;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                chars.next();
                at_line_start = true;
                continue;
            }
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '%' if at_line_start => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                at_line_start = true;
                continue;
            }
            '[' => {
                chars.next();
                let raw: String = chars.by_ref().take_while(|&c| c != ']').collect();
                match parse_tag(&raw) {
                    Some((name, value)) => tokens.push(Token::Tag(name, value)),
                    None => tracing::debug!("Skipping malformed PGN tag: [{}]", raw),
                }
            }
            '{' => {
                chars.next();
                let text: String = chars.by_ref().take_while(|&c| c != '}').collect();
                tokens.push(Token::Comment(text.trim().to_string()));
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '$' => {
                chars.next();
                let digits: String = std::iter::from_fn(|| chars.next_if(|c| c.is_ascii_digit())).collect();
                if let Ok(nag) = digits.parse() {
                    tokens.push(Token::Nag(nag));
                }
            }
            _ => {
                let symbol: String = std::iter::from_fn(|| {
                    chars.next_if(|&c| !c.is_whitespace() && !"(){}[];$".contains(c))
                })
                .collect();
                if symbol.is_empty() {
                    // Stray '}' or ']'
                    chars.next();
                    continue;
                }
                if let Some(token) = classify_symbol(&symbol) {
                    tokens.push(token);
                }
            }
        }
        at_line_start = false;
    }

    tokens
}

fn parse_tag(raw: &str) -> Option<(String, String)> {
    let raw = raw.trim();
    let (name, rest) = raw.split_once(char::is_whitespace)?;
    let value = rest.trim().strip_prefix('"')?.strip_suffix('"')?;
    Some((name.to_string(), value.replace("\\\"", "\"")))
}

fn classify_symbol(symbol: &str) -> Option<Token> {
    match symbol {
        "1-0" => return Some(Token::Result(GameResult::WhiteWins)),
        "0-1" => return Some(Token::Result(GameResult::BlackWins)),
        "1/2-1/2" => return Some(Token::Result(GameResult::Draw)),
        "*" => return Some(Token::Result(GameResult::Ongoing)),
        _ => {}
    }

    // Move numbers may be glued to the move ("12.e4", "3...Nf6").
    let without_number = symbol.trim_start_matches(|c: char| c.is_ascii_digit());
    let san = if without_number.len() != symbol.len() && without_number.starts_with('.') {
        without_number.trim_start_matches('.')
    } else {
        symbol
    };
    if san.is_empty() {
        return None;
    }

    let trimmed = san.trim_end_matches(['!', '?']);
    let glyph = match &san[trimmed.len()..] {
        "" => None,
        "!" => Some(1),
        "?" => Some(2),
        "!!" => Some(3),
        "??" => Some(4),
        "!?" => Some(5),
        "?!" => Some(6),
        _ => None,
    };
    if trimmed.is_empty() {
        return None;
    }
    Some(Token::Move(trimmed.to_string(), glyph))
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PgnError {
    #[error("PGN contains no moves")]
    NoMoves,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sans(line: &[PgnMove]) -> Vec<&str> {
        line.iter().map(|m| m.san.as_str()).collect()
    }

    #[test]
    fn test_parse_bare_movetext() {
        let games = parse_pgn("1. e4 e5 2. Nf3").unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(sans(&games[0].moves), vec!["e4", "e5", "Nf3"]);
        assert_eq!(games[0].result, None);
    }

    #[test]
    fn test_parse_nested_variations() {
        let pgn = "1. e4 e5 2. Nf3 Nc6 (2... Nf6 3. Nxe5 d5 4. exd5 (4. d4 dxe4 5. c4) (4. Nc3 d4) 4... Nxd5 ) 3. Bb5";
        let games = parse_pgn(pgn).unwrap();
        let main = &games[0].moves;
        assert_eq!(sans(main), vec!["e4", "e5", "Nf3", "Nc6", "Bb5"]);

        let petrov = &main[3].variations[0];
        assert_eq!(sans(petrov), vec!["Nf6", "Nxe5", "d5", "exd5", "Nxd5"]);
        assert_eq!(petrov[3].variations.len(), 2);
        assert_eq!(sans(&petrov[3].variations[0]), vec!["d4", "dxe4", "c4"]);
        assert_eq!(sans(&petrov[3].variations[1]), vec!["Nc3", "d4"]);
        assert_eq!(games[0].ply_count(), 15);
    }

    #[test]
    fn test_parse_multiple_games_with_tags() {
        let pgn = r#"[Event "One"]
[Result "1-0"]

1. e4 e5 1-0

[Event "Two"]
[FEN "8/8/8/8/8/8/k7/7K w - - 0 1"]

1. Kg2 Kb2 *
"#;
        let games = parse_pgn(pgn).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].tag("Event"), Some("One"));
        assert_eq!(games[0].result, Some(GameResult::WhiteWins));
        assert_eq!(games[1].starting_fen(), Some("8/8/8/8/8/8/k7/7K w - - 0 1"));
        assert_eq!(sans(&games[1].moves), vec!["Kg2", "Kb2"]);
    }

    #[test]
    fn test_parse_comments_and_nags() {
        let pgn = "1. e4! {best by test} e5 $2 ; rest of line ignored\n2. Nf3?! *";
        let games = parse_pgn(pgn).unwrap();
        let moves = &games[0].moves;
        assert_eq!(sans(moves), vec!["e4", "e5", "Nf3"]);
        assert_eq!(moves[0].comment.as_deref(), Some("best by test"));
        assert_eq!(moves[0].nags, vec![1]);
        assert_eq!(moves[1].nags, vec![2]);
        assert_eq!(moves[2].nags, vec![6]);
    }

    #[test]
    fn test_glued_move_numbers() {
        let games = parse_pgn("1.e4 e5 2.Nf3 2...Nc6").unwrap();
        assert_eq!(sans(&games[0].moves), vec!["e4", "e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn test_unbalanced_variation_is_closed() {
        let games = parse_pgn("1. e4 e5 (1... c5 2. Nf3").unwrap();
        assert_eq!(sans(&games[0].moves), vec!["e4", "e5"]);
        assert_eq!(sans(&games[0].moves[1].variations[0]), vec!["c5", "Nf3"]);
    }

    #[test]
    fn test_no_moves_is_error() {
        assert!(matches!(parse_pgn(""), Err(PgnError::NoMoves)));
        assert!(matches!(parse_pgn("[Event \"x\"]\n*"), Err(PgnError::NoMoves)));
        assert!(matches!(parse_pgn("{only a comment}"), Err(PgnError::NoMoves)));
    }
}
