//! Row-addressable float storage split into bounded blocks.
//!
//! A `vocab_size × vector_size` table can be far larger than anything we want
//! to hand to the allocator in one piece, so the rows are packed into blocks of
//! at most [`BLOCK_ELEMENTS`] floats. A row never straddles two blocks, which
//! keeps row access a slice into a single block.

use aligned_box::AlignedBox;

use crate::error::{Error, Result};
use crate::real;

/// Element budget of one block.
pub const BLOCK_ELEMENTS: usize = 200 * 1024;

/// Alignment of each block allocation, in bytes.
const BLOCK_ALIGNMENT: usize = 128;

pub struct ChunkedMatrix {
    rows: usize,
    columns: usize,
    rows_per_block: usize,
    blocks: Vec<AlignedBox<[real]>>,
}

fn allocate_block(len: usize) -> Result<AlignedBox<[real]>> {
    AlignedBox::slice_from_default(BLOCK_ALIGNMENT, len)
        .map_err(|err| Error::Allocation(err.to_string()))
}

impl ChunkedMatrix {
    /// Allocate a `rows × columns` matrix. `fill` is called once per element,
    /// in row-major order, so a stateful generator produces the same table
    /// regardless of how rows are split into blocks.
    pub fn new<F>(rows: usize, columns: usize, mut fill: F) -> Result<Self>
    where
        F: FnMut() -> real,
    {
        if columns == 0 {
            return Err(Error::Configuration(
                "matrix must have at least one column".to_string(),
            ));
        }
        let rows_per_block = (BLOCK_ELEMENTS / columns).max(1);
        let num_blocks = (rows + rows_per_block - 1) / rows_per_block;

        let mut blocks = Vec::with_capacity(num_blocks);
        for b in 0..num_blocks {
            let block_rows = rows_per_block.min(rows - b * rows_per_block);
            let mut block = allocate_block(block_rows * columns)?;
            for e in block.iter_mut() {
                *e = fill();
            }
            blocks.push(block);
        }

        Ok(ChunkedMatrix {
            rows,
            columns,
            rows_per_block,
            blocks,
        })
    }

    pub fn zeros(rows: usize, columns: usize) -> Result<Self> {
        ChunkedMatrix::new(rows, columns, || 0.0)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows_per_block(&self) -> usize {
        self.rows_per_block
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Translate a row index to `(block index, element offset within block)`.
    pub fn locate(&self, row: usize) -> Result<(usize, usize)> {
        if row >= self.rows {
            return Err(Error::IndexOutOfRange {
                index: row,
                rows: self.rows,
            });
        }
        Ok((
            row / self.rows_per_block,
            (row % self.rows_per_block) * self.columns,
        ))
    }

    /// Borrow row `i` without copying.
    pub fn row(&self, i: usize) -> Result<&[real]> {
        let (block, offset) = self.locate(i)?;
        Ok(&self.blocks[block][offset..][..self.columns])
    }

    pub fn row_mut(&mut self, i: usize) -> Result<&mut [real]> {
        let (block, offset) = self.locate(i)?;
        let columns = self.columns;
        Ok(&mut self.blocks[block][offset..][..columns])
    }

    pub fn copy_row(&self, i: usize) -> Result<Vec<real>> {
        Ok(self.row(i)?.to_vec())
    }

    /// Overwrite row `i` with `values`.
    pub fn write_row(&mut self, i: usize, values: &[real]) -> Result<()> {
        if values.len() != self.columns {
            return Err(Error::LengthMismatch {
                expected: self.columns,
                actual: values.len(),
            });
        }
        self.row_mut(i)?.copy_from_slice(values);
        Ok(())
    }

    /// Iterate over all rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[real]> + '_ {
        let columns = self.columns;
        self.blocks.iter().flat_map(move |block| block.chunks_exact(columns))
    }

    /// Make an independent copy with the same block layout.
    pub fn try_clone(&self) -> Result<Self> {
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let mut copy = allocate_block(block.len())?;
            copy.copy_from_slice(block);
            blocks.push(copy);
        }
        Ok(ChunkedMatrix {
            rows: self.rows,
            columns: self.columns,
            rows_per_block: self.rows_per_block,
            blocks,
        })
    }

    /// All elements in row-major order.
    pub fn to_vec(&self) -> Vec<real> {
        let mut out = Vec::with_capacity(self.rows * self.columns);
        for block in &self.blocks {
            out.extend_from_slice(block);
        }
        out
    }
}

impl std::fmt::Debug for ChunkedMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedMatrix")
            .field("rows", &self.rows)
            .field("columns", &self.columns)
            .field("rows_per_block", &self.rows_per_block)
            .field("num_blocks", &self.blocks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_layout() {
        let m = ChunkedMatrix::zeros(1000, 300).unwrap();
        assert_eq!(m.rows_per_block(), 682);
        assert_eq!(m.num_blocks(), 2);
        assert_eq!(m.locate(0).unwrap(), (0, 0));
        assert_eq!(m.locate(681).unwrap(), (0, 681 * 300));
        assert_eq!(m.locate(682).unwrap(), (1, 0));
        assert_eq!(m.locate(999).unwrap(), (1, (999 - 682) * 300));
    }

    #[test]
    fn wide_rows_get_one_block_each() {
        let m = ChunkedMatrix::zeros(3, BLOCK_ELEMENTS + 1).unwrap();
        assert_eq!(m.rows_per_block(), 1);
        assert_eq!(m.num_blocks(), 3);
        assert_eq!(m.row(2).unwrap().len(), BLOCK_ELEMENTS + 1);
    }

    #[test]
    fn fill_is_row_major() {
        let mut next = 0.0;
        let m = ChunkedMatrix::new(2000, 128, || {
            next += 1.0;
            next
        })
        .unwrap();
        assert!(m.num_blocks() > 1);
        for (i, row) in m.iter_rows().enumerate() {
            assert_eq!(row[0], (i * 128 + 1) as real);
            assert_eq!(row[127], (i * 128 + 128) as real);
        }
    }

    #[test]
    fn write_then_copy() {
        let mut m = ChunkedMatrix::zeros(2000, 128).unwrap();
        let last_in_first_block = m.rows_per_block() - 1;
        let first_in_second_block = m.rows_per_block();
        for &i in &[0, last_in_first_block, first_in_second_block, 1999] {
            let v: Vec<real> = (0..128).map(|c| (i * 1000 + c) as real).collect();
            m.write_row(i, &v).unwrap();
            assert_eq!(m.copy_row(i).unwrap(), v);
        }
        // neighbours untouched
        assert_eq!(m.row(1).unwrap(), &[0.0; 128][..]);
        assert_eq!(m.row(first_in_second_block + 1).unwrap(), &[0.0; 128][..]);
        assert_eq!(
            m.row(last_in_first_block).unwrap()[0],
            (last_in_first_block * 1000) as real
        );
    }

    #[test]
    fn out_of_range() {
        let mut m = ChunkedMatrix::zeros(10, 4).unwrap();
        assert!(matches!(
            m.row(10),
            Err(Error::IndexOutOfRange { index: 10, rows: 10 })
        ));
        assert!(matches!(
            m.write_row(11, &[0.0; 4]),
            Err(Error::IndexOutOfRange { .. })
        ));
        assert!(matches!(m.copy_row(usize::MAX), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn length_mismatch() {
        let mut m = ChunkedMatrix::zeros(10, 4).unwrap();
        assert!(matches!(
            m.write_row(0, &[1.0; 3]),
            Err(Error::LengthMismatch { expected: 4, actual: 3 })
        ));
        assert_eq!(m.row(0).unwrap(), &[0.0; 4][..]);
    }

    #[test]
    fn clone_is_independent() {
        let mut a = ChunkedMatrix::new(5, 2, || 1.0).unwrap();
        let b = a.try_clone().unwrap();
        a.write_row(3, &[7.0, 8.0]).unwrap();
        assert_eq!(b.row(3).unwrap(), &[1.0, 1.0]);
        assert_eq!(a.row(3).unwrap(), &[7.0, 8.0]);
    }

    #[test]
    fn zero_columns_rejected() {
        assert!(matches!(
            ChunkedMatrix::zeros(5, 0),
            Err(Error::Configuration(_))
        ));
    }
}
