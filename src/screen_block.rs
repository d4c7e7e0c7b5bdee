use std::{iter::FusedIterator, num::NonZeroU32};

use itertools::iproduct;
use ordered_float::OrderedFloat;

use crate::geometry::{ScreenBlock, ScreenPoint};

pub trait ScreenBlockExt {
    fn internal_points(&self) -> InternalPoints;
    fn tile_ordering(&self, tile_size: NonZeroU32) -> Vec<ScreenBlock>;
}

impl ScreenBlockExt for ScreenBlock {
    /// Create an iterator over coordinates (x, y) pairs inside the block,
    /// in C order (x changes first, then y)
    fn internal_points(&self) -> InternalPoints {
        if self.is_empty() {
            InternalPoints::empty()
        } else {
            InternalPoints {
                min_x: self.min.x,
                max: self.max,
                cursor: self.min,
            }
        }
    }

    /// Splits the block into tiles of at most tile_size * tile_size pixels, sorted by
    /// distance of their center from the center of the block.
    /// Tiles on the bottom and right edge are clipped if the tile size doesn't divide the
    /// block size.
    fn tile_ordering(&self, tile_size: NonZeroU32) -> Vec<ScreenBlock> {
        if self.is_empty() {
            return Vec::new();
        }

        let tile_size = tile_size.get();
        let center = (self.min.coords + self.max.coords).cast::<f32>() / 2.0;

        let mut tiles: Vec<_> = iproduct!(
            (self.min.y..self.max.y).step_by(tile_size as usize),
            (self.min.x..self.max.x).step_by(tile_size as usize)
        )
        .map(|(y, x)| {
            ScreenBlock::new(
                ScreenPoint::new(x, y),
                ScreenPoint::new(
                    (x + tile_size).min(self.max.x),
                    (y + tile_size).min(self.max.y),
                ),
            )
        })
        .collect();

        // Stable sort, ties stay in row order
        tiles.sort_by_key(|tile| {
            let tile_center = (tile.min.coords + tile.max.coords).cast::<f32>() / 2.0;
            OrderedFloat((tile_center - center).norm_squared())
        });

        tiles
    }
}

#[derive(Copy, Clone, Debug)]
pub struct InternalPoints {
    min_x: u32,
    max: ScreenPoint,
    cursor: ScreenPoint,
}

impl InternalPoints {
    /// Construct an iterator over internal points that returns no points
    fn empty() -> Self {
        InternalPoints {
            min_x: 1,
            max: ScreenPoint::origin(),
            cursor: ScreenPoint::origin(),
        }
    }
}

impl Iterator for InternalPoints {
    type Item = ScreenPoint;

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.y >= self.max.y {
            return None;
        }

        let ret = self.cursor;

        debug_assert!(self.cursor.x < self.max.x);
        self.cursor.x += 1;
        if self.cursor.x >= self.max.x {
            self.cursor.x = self.min_x;
            self.cursor.y += 1;
        }

        Some(ret)
    }
}

impl ExactSizeIterator for InternalPoints {
    fn len(&self) -> usize {
        if self.cursor.y >= self.max.y {
            0
        } else {
            let row_width = (self.max.x - self.min_x) as usize;
            let whole_rows = (self.max.y - self.cursor.y - 1) as usize;
            let current_row = (self.max.x - self.cursor.x) as usize;
            whole_rows * row_width + current_row
        }
    }
}

impl FusedIterator for InternalPoints {}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::assert;
    use proptest::prelude::*;
    use test_strategy::proptest;

    #[derive(Copy, Clone, Debug)]
    struct ScreenBlockWrapper(ScreenBlock);

    impl std::ops::Deref for ScreenBlockWrapper {
        type Target = ScreenBlock;
        fn deref(&self) -> &ScreenBlock {
            &self.0
        }
    }

    impl Arbitrary for ScreenBlockWrapper {
        type Parameters = ();
        type Strategy = proptest::strategy::BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            const RANGE: std::ops::Range<u32> = 0..100u32;
            (RANGE, RANGE, RANGE, RANGE)
                .prop_map(|coords| {
                    ScreenBlockWrapper(ScreenBlock::new(
                        ScreenPoint::new(coords.0, coords.1),
                        ScreenPoint::new(coords.2, coords.3),
                    ))
                })
                .boxed()
        }
    }

    fn safe_area(block: &ScreenBlock) -> u32 {
        if block.is_empty() { 0 } else { block.area() }
    }

    /// Goes through the whole iterator and checks that at every step iterator's size hint is equal
    /// to its reported length and equal to the expected number of elements.
    fn check_exact_length<T: ExactSizeIterator>(mut iterator: T, expected_length: usize) {
        let mut remaining = expected_length;
        loop {
            assert!(iterator.len() == remaining);
            assert!(iterator.size_hint() == (remaining, Some(remaining)));
            if iterator.next().is_none() {
                break;
            }
            remaining -= 1;
        }
        assert!(remaining == 0);
    }

    /// Check that all pixels in the block are covered exactly once by a pixel iterator
    fn check_pixel_iterator_covers_block(
        pixel_iterator: impl Iterator<Item = ScreenPoint>,
        block: &ScreenBlock,
    ) {
        let mut covered = vec![false; safe_area(block) as usize];
        for p in pixel_iterator {
            assert!(block.contains(&p));
            let index = (p.x - block.min.x) + (p.y - block.min.y) * block.width();
            assert!(!covered[index as usize]);
            covered[index as usize] = true;
        }
        assert!(covered.into_iter().all(|v| v));
    }

    #[proptest]
    fn pixel_iterator_covers_all(block: ScreenBlockWrapper) {
        check_pixel_iterator_covers_block(block.internal_points(), &block);
    }

    #[proptest]
    fn pixel_iterator_exact_length(block: ScreenBlockWrapper) {
        check_exact_length(block.internal_points(), safe_area(&block) as usize);
    }

    #[proptest]
    fn tiles_cover_all(block: ScreenBlockWrapper, #[strategy(1u32..40)] tile_size: u32) {
        let tiles = block.tile_ordering(NonZeroU32::new(tile_size).unwrap());
        for tile in &tiles {
            assert!(!tile.is_empty());
            assert!(tile.width() <= tile_size);
            assert!(tile.height() <= tile_size);
        }
        check_pixel_iterator_covers_block(
            tiles.iter().flat_map(|tile| tile.internal_points()),
            &block,
        );
    }

    #[test]
    fn center_tile_goes_first() {
        let block = ScreenBlock::with_size(&nalgebra::Vector2::new(300, 300));
        let tiles = block.tile_ordering(NonZeroU32::new(100).unwrap());
        assert!(tiles.len() == 9);
        assert!(tiles[0] == ScreenBlock::new(ScreenPoint::new(100, 100), ScreenPoint::new(200, 200)));
        // Corners go last
        assert!(tiles[8].min.x != 100);
        assert!(tiles[8].min.y != 100);
    }
}
