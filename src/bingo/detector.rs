//! Winner detection for a single card.

use super::grid::{index_of, is_free_cell, CARD_CELLS, GRID_SIZE};
use super::types::Tier;

/// Highest tier the card currently satisfies against `drawn`.
///
/// A row with exactly four marked cells qualifies for quadra, a fully marked
/// row for quina, and a fully marked card for cheia. The free centre cell is
/// always marked. Pure: the same inputs always give the same answer.
pub fn detect_tier(numbers: &[u8; CARD_CELLS], drawn: &[u8]) -> Option<Tier> {
    let marked = |index: usize| is_free_cell(index) || drawn.contains(&numbers[index]);

    if (0..CARD_CELLS).all(marked) {
        return Some(Tier::Cheia);
    }

    let mut best = None;
    for row in 0..GRID_SIZE {
        let count = (0..GRID_SIZE).filter(|&col| marked(index_of(row, col))).count();
        match count {
            5 => return Some(Tier::Quina),
            4 => best = Some(Tier::Quadra),
            _ => {}
        }
    }

    best
}

/// True when the card has reached at least `tier`
pub fn reaches(numbers: &[u8; CARD_CELLS], drawn: &[u8], tier: Tier) -> bool {
    detect_tier(numbers, drawn).is_some_and(|found| found >= tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: [u8; 25] = [
        1, 16, 31, 46, 61, //
        2, 17, 32, 47, 62, //
        3, 18, 0, 48, 63, //
        4, 19, 34, 49, 64, //
        5, 20, 35, 50, 65,
    ];

    #[test]
    fn test_row_with_four_marked_is_quadra() {
        let drawn = [1, 16, 31, 46, 2, 17, 32, 47, 3, 18, 48];
        assert_eq!(detect_tier(&CARD, &drawn), Some(Tier::Quadra));
    }

    #[test]
    fn test_full_row_is_quina() {
        let drawn = [1, 16, 31, 46, 2, 17, 32, 47, 3, 18, 48, 63];
        assert_eq!(detect_tier(&CARD, &drawn), Some(Tier::Quina));
    }

    #[test]
    fn test_full_card_is_cheia() {
        let drawn: Vec<u8> = CARD.iter().copied().filter(|&n| n != 0).collect();
        assert_eq!(detect_tier(&CARD, &drawn), Some(Tier::Cheia));
    }

    #[test]
    fn test_full_card_in_one_step_reports_highest() {
        // Everything but one cell, then the last number lands: must be cheia, not quadra
        let mut drawn: Vec<u8> = CARD.iter().copied().filter(|&n| n != 0 && n != 65).collect();
        assert_eq!(detect_tier(&CARD, &drawn), Some(Tier::Quina));
        drawn.push(65);
        assert_eq!(detect_tier(&CARD, &drawn), Some(Tier::Cheia));
    }

    #[test]
    fn test_sparse_marks_detect_nothing() {
        // Three marks per row at most
        let drawn = [1, 16, 2, 17, 3, 4, 19, 5, 20, 61, 62];
        assert_eq!(detect_tier(&CARD, &drawn), None);
        assert_eq!(detect_tier(&CARD, &[]), None);
    }

    #[test]
    fn test_free_cell_counts_without_zero_drawn() {
        // Row 2: 3, 18, free, 48 -> four marked
        let drawn = [3, 18, 48];
        assert_eq!(detect_tier(&CARD, &drawn), Some(Tier::Quadra));
    }

    #[test]
    fn test_detection_is_repeatable() {
        let drawn = vec![1, 16, 31, 46, 2, 17, 32, 47, 3, 18, 48];
        let before = drawn.clone();
        let first = detect_tier(&CARD, &drawn);
        let second = detect_tier(&CARD, &drawn);
        assert_eq!(first, second);
        assert_eq!(drawn, before);
    }

    #[test]
    fn test_reaches_is_at_least() {
        let drawn = [1, 16, 31, 46, 2, 17, 32, 47, 3, 18, 48, 63];
        assert!(reaches(&CARD, &drawn, Tier::Quadra));
        assert!(reaches(&CARD, &drawn, Tier::Quina));
        assert!(!reaches(&CARD, &drawn, Tier::Cheia));
    }
}
