//! Card geometry: a 5x5 grid stored flat in row-major order with a free
//! centre cell. Also generates fresh card numbers at purchase time.

use rand::seq::SliceRandom;
use rand::Rng;

pub const GRID_SIZE: usize = 5;
pub const CARD_CELLS: usize = GRID_SIZE * GRID_SIZE;
pub const FREE_CELL: usize = 12;

/// Value stored in the free cell
pub const FREE_CELL_VALUE: u8 = 0;

/// Number ranges per column (B-I-N-G-O)
const COLUMN_RANGES: [(u8, u8); GRID_SIZE] = [(1, 15), (16, 30), (31, 45), (46, 60), (61, 75)];

/// (row, column) of a flat index
pub fn coordinates(index: usize) -> (usize, usize) {
    (index / GRID_SIZE, index % GRID_SIZE)
}

pub fn index_of(row: usize, col: usize) -> usize {
    row * GRID_SIZE + col
}

pub fn is_free_cell(index: usize) -> bool {
    coordinates(index) == (2, 2)
}

/// Generate card numbers: each column draws distinct values from its range,
/// centre cell left free.
pub fn generate_numbers<R: Rng + ?Sized>(rng: &mut R) -> [u8; CARD_CELLS] {
    let mut numbers = [FREE_CELL_VALUE; CARD_CELLS];

    for (col, &(low, high)) in COLUMN_RANGES.iter().enumerate() {
        let mut pool: Vec<u8> = (low..=high).collect();
        pool.shuffle(rng);

        for row in 0..GRID_SIZE {
            let index = index_of(row, col);
            if is_free_cell(index) {
                continue;
            }
            numbers[index] = pool[row];
        }
    }

    numbers
}
