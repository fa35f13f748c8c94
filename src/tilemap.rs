/// A 2D grid stored row-major in a flat vector (`y * width + x`).
///
/// Unlike a wrapped map, every edge is hard: coordinates outside
/// `[0, width) x [0, height)` are never aliased onto another cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Build a map by evaluating `f(x, y)` for every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    /// Panics on a cell outside the map instead of reading the next row.
    fn index(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "cell ({}, {}) outside {}x{} tilemap",
            x,
            y,
            self.width,
            self.height
        );
        y * self.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let idx = self.index(x, y);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Row-major view of the underlying cells.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let y = idx / width;
            (x, y, val)
        })
    }
}

impl Tilemap<f32> {
    /// Minimum and maximum value, or `None` for an empty map.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut values = self.data.iter().copied();
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), h| (lo.min(h), hi.max(h))))
    }

    /// Sum of all cells, accumulated in f64.
    pub fn total(&self) -> f64 {
        self.data.iter().map(|&h| h as f64).sum()
    }

    /// First non-finite cell, if any.
    pub fn find_non_finite(&self) -> Option<(usize, usize, f32)> {
        self.iter().find(|(_, _, h)| !h.is_finite()).map(|(x, y, &h)| (x, y, h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let map = Tilemap::from_fn(3, 2, |x, y| (y * 10 + x) as i32);
        assert_eq!(map.as_slice(), &[0, 1, 2, 10, 11, 12]);
        assert_eq!(*map.get(2, 1), 12);
    }

    #[test]
    #[should_panic(expected = "outside 4x4 tilemap")]
    fn test_x_past_edge_does_not_wrap_to_next_row() {
        let map = Tilemap::from_fn(4, 4, |x, y| (y * 4 + x) as f32);
        // Row-major index of (4, 0) is the first cell of row 1
        map.get(4, 0);
    }

    #[test]
    #[should_panic(expected = "outside 3x2 tilemap")]
    fn test_set_past_bottom_edge_panics() {
        let mut map = Tilemap::new_with(3, 2, 0.0f32);
        map.set(0, 2, 1.0);
    }

    #[test]
    fn test_min_max_and_total() {
        let map = Tilemap::from_fn(2, 2, |x, y| (x + 2 * y) as f32);
        assert_eq!(map.min_max(), Some((0.0, 3.0)));
        assert!((map.total() - 6.0).abs() < 1e-9);
        assert!(Tilemap::new_with(0, 0, 0.0f32).min_max().is_none());
    }

    #[test]
    fn test_find_non_finite() {
        let mut map = Tilemap::new_with(3, 3, 0.5f32);
        assert!(map.find_non_finite().is_none());
        map.set(1, 2, f32::NAN);
        let (x, y, h) = map.find_non_finite().unwrap();
        assert_eq!((x, y), (1, 2));
        assert!(h.is_nan());
    }
}
