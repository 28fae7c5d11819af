use chess_common::{char_to_file, char_to_rank, file_to_char, format_piece_upper, format_square, parse_piece, parse_square};
use cozy_chess::{Board, File, GameStatus, Move, Piece, Rank};

use crate::game::{is_castling, legal_moves};

/// Parse Standard Algebraic Notation (SAN) move
pub fn parse_san(board: &Board, san: &str) -> Result<Move, SanError> {
    let text = san
        .trim()
        .trim_end_matches(|c| matches!(c, '+' | '#' | '!' | '?'));
    if text.is_empty() {
        return Err(SanError::InvalidFormat(san.to_string()));
    }

    let legal = legal_moves(board);

    match text {
        "O-O" | "0-0" => return find_castle(board, &legal, CastleSide::Short, san),
        "O-O-O" | "0-0-0" => return find_castle(board, &legal, CastleSide::Long, san),
        _ => {}
    }

    let mut rest = text;
    let piece = match rest.chars().next() {
        Some(c @ ('N' | 'B' | 'R' | 'Q' | 'K')) => {
            rest = &rest[1..];
            parse_piece(c).ok_or_else(|| SanError::InvalidFormat(san.to_string()))?
        }
        _ => Piece::Pawn,
    };

    let mut promotion = None;
    if let Some(idx) = rest.find('=') {
        let promo = rest[idx + 1..].chars().next();
        promotion = Some(
            promo
                .and_then(parse_piece)
                .ok_or_else(|| SanError::InvalidPromotion(san.to_string()))?,
        );
        rest = &rest[..idx];
    } else if piece == Piece::Pawn {
        if let Some(c @ ('N' | 'B' | 'R' | 'Q')) = rest.chars().last() {
            promotion = parse_piece(c);
            rest = &rest[..rest.len() - 1];
        }
    }

    let body: String = rest.chars().filter(|&c| c != 'x' && c != ':').collect();
    if body.len() < 2 || !body.is_ascii() {
        return Err(SanError::InvalidFormat(san.to_string()));
    }
    let (disambiguation, dest) = body.split_at(body.len() - 2);
    let to = parse_square(dest).ok_or_else(|| SanError::InvalidSquare(dest.to_string()))?;

    let mut from_file: Option<File> = None;
    let mut from_rank: Option<Rank> = None;
    for c in disambiguation.chars() {
        if let Some(file) = char_to_file(c) {
            from_file = Some(file);
        } else if let Some(rank) = char_to_rank(c) {
            from_rank = Some(rank);
        } else {
            return Err(SanError::InvalidFormat(san.to_string()));
        }
    }

    let mut matches = legal.iter().filter(|mv| {
        mv.to == to
            && mv.promotion == promotion
            && board.piece_on(mv.from) == Some(piece)
            && !is_castling(board, **mv)
            && from_file.is_none_or(|f| mv.from.file() == f)
            && from_rank.is_none_or(|r| mv.from.rank() == r)
    });

    match (matches.next(), matches.next()) {
        (Some(mv), None) => Ok(*mv),
        (None, _) => Err(SanError::NoLegalMove(san.to_string())),
        (Some(_), Some(_)) => Err(SanError::AmbiguousMove(san.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CastleSide {
    Short,
    Long,
}

fn find_castle(board: &Board, legal: &[Move], side: CastleSide, san: &str) -> Result<Move, SanError> {
    legal
        .iter()
        .copied()
        .find(|mv| is_castling(board, *mv) && castle_side(*mv) == side)
        .ok_or_else(|| SanError::NoLegalMove(san.to_string()))
}

fn castle_side(mv: Move) -> CastleSide {
    if mv.to.file() as u8 > mv.from.file() as u8 {
        CastleSide::Short
    } else {
        CastleSide::Long
    }
}

/// Format a legal move as SAN, including check and mate suffixes.
pub fn format_san(board: &Board, mv: Move) -> String {
    let Some(piece) = board.piece_on(mv.from) else {
        return chess_common::format_uci_move(mv);
    };

    let mut san = String::new();
    if is_castling(board, mv) {
        san.push_str(match castle_side(mv) {
            CastleSide::Short => "O-O",
            CastleSide::Long => "O-O-O",
        });
    } else {
        let capture =
            board.piece_on(mv.to).is_some() || (piece == Piece::Pawn && mv.from.file() != mv.to.file());

        if piece == Piece::Pawn {
            if capture {
                san.push(file_to_char(mv.from.file()));
            }
        } else {
            san.push(format_piece_upper(piece));
            san.push_str(&disambiguation(board, mv, piece));
        }

        if capture {
            san.push('x');
        }
        san.push_str(&format_square(mv.to));

        if let Some(promo) = mv.promotion {
            san.push('=');
            san.push(format_piece_upper(promo));
        }
    }

    let mut after = board.clone();
    after.play_unchecked(mv);
    if !after.checkers().is_empty() {
        san.push(if after.status() == GameStatus::Won { '#' } else { '+' });
    }

    san
}

fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let rivals: Vec<Move> = legal_moves(board)
        .into_iter()
        .filter(|other| {
            other.to == mv.to
                && other.from != mv.from
                && board.piece_on(other.from) == Some(piece)
                && !is_castling(board, *other)
        })
        .collect();

    if rivals.is_empty() {
        return String::new();
    }
    if rivals.iter().all(|other| other.from.file() != mv.from.file()) {
        return file_to_char(mv.from.file()).to_string();
    }
    if rivals.iter().all(|other| other.from.rank() != mv.from.rank()) {
        return chess_common::rank_to_char(mv.from.rank()).to_string();
    }
    format_square(mv.from)
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SanError {
    #[error("No legal move found for: {0}")]
    NoLegalMove(String),
    #[error("Ambiguous move: {0}")]
    AmbiguousMove(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::parse_fen;
    use cozy_chess::Square;

    fn play(board: &mut Board, san: &str) -> Move {
        let mv = parse_san(board, san).unwrap();
        board.play(mv);
        mv
    }

    #[test]
    fn test_parse_pawn_and_piece_moves() {
        let mut board = Board::default();
        let e4 = play(&mut board, "e4");
        assert_eq!(e4.to, Square::new(File::E, Rank::Fourth));
        play(&mut board, "e5");
        let nf3 = play(&mut board, "Nf3");
        assert_eq!(nf3.from, Square::new(File::G, Rank::First));
    }

    #[test]
    fn test_parse_strips_annotations() {
        let board = Board::default();
        assert!(parse_san(&board, "e4!?").is_ok());
        assert!(parse_san(&board, "Nf3+").is_ok());
        assert!(parse_san(&board, "Nc3").is_ok());
    }

    #[test]
    fn test_parse_castling_both_spellings() {
        let board = parse_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let short = parse_san(&board, "O-O").unwrap();
        assert_eq!(short.to, Square::new(File::H, Rank::First));
        let long = parse_san(&board, "0-0-0").unwrap();
        assert_eq!(long.to, Square::new(File::A, Rank::First));
    }

    #[test]
    fn test_parse_disambiguation() {
        // Knights on b1 and f1 can both reach d2.
        let board = parse_fen("4k3/8/8/8/8/8/8/1N2KN2 w - - 0 1").unwrap();
        assert!(matches!(parse_san(&board, "Nd2"), Err(SanError::AmbiguousMove(_))));
        let mv = parse_san(&board, "Nbd2").unwrap();
        assert_eq!(mv.from, Square::new(File::B, Rank::First));
    }

    #[test]
    fn test_parse_promotion_forms() {
        let board = parse_fen("8/4P3/8/8/8/8/k7/7K w - - 0 1").unwrap();
        assert_eq!(parse_san(&board, "e8=Q").unwrap().promotion, Some(Piece::Queen));
        assert_eq!(parse_san(&board, "e8N").unwrap().promotion, Some(Piece::Knight));
        assert!(parse_san(&board, "e8").is_err());
    }

    #[test]
    fn test_format_san() {
        let board = Board::default();
        let mv = parse_san(&board, "Nf3").unwrap();
        assert_eq!(format_san(&board, mv), "Nf3");

        let board = parse_fen("4k3/8/8/8/8/8/8/1N2KN2 w - - 0 1").unwrap();
        let mv = parse_san(&board, "Nfd2").unwrap();
        assert_eq!(format_san(&board, mv), "Nfd2");
    }

    #[test]
    fn test_format_san_capture_and_mate() {
        let mut board = Board::default();
        for san in ["f3", "e5", "g4"] {
            play(&mut board, san);
        }
        let mv = parse_san(&board, "Qh4").unwrap();
        assert_eq!(format_san(&board, mv), "Qh4#");

        let mut board = Board::default();
        for san in ["e4", "d5"] {
            play(&mut board, san);
        }
        let mv = parse_san(&board, "exd5").unwrap();
        assert_eq!(format_san(&board, mv), "exd5");
    }
}
