//! Grid shape and ping-pong bookkeeping shared by both backends.
//!
//! A field is a dense `width × height × depth` grid of `f32` trail
//! intensity. Two copies are kept: the *read* copy agents sense during a
//! step, and the *write* copy diffusion fills from it. After every step the
//! roles flip.
//!
//! ```
//! use physarum::field::{PingPong, Parity};
//!
//! let mut fields = PingPong::new([vec![0.0f32; 4], vec![0.0; 4]]);
//! assert_eq!(fields.parity(), Parity::A);
//! fields.write()[0] = 1.0;
//! fields.swap();
//! assert_eq!(fields.read()[0], 1.0);
//! ```

use glam::{UVec3, Vec3};

use crate::config::WorldConfig;

/// Dimensions of a field grid. `depth` is 1 for 2D worlds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldShape {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl FieldShape {
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }

    pub fn from_world(world: &WorldConfig) -> Self {
        Self::new(world.width, world.height, world.depth)
    }

    pub fn total_cells(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Linear index of an integer cell coordinate.
    #[inline]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        x as usize + y as usize * self.width as usize + z as usize * self.width as usize * self.height as usize
    }

    /// Cell containing a world position, clamped into the grid.
    #[inline]
    pub fn cell_of(&self, p: Vec3) -> UVec3 {
        let max = Vec3::new(
            (self.width - 1) as f32,
            (self.height - 1) as f32,
            (self.depth - 1) as f32,
        );
        p.floor().clamp(Vec3::ZERO, max).as_uvec3()
    }

    /// Linear index of the cell containing `p`.
    #[inline]
    pub fn index_of(&self, p: Vec3) -> usize {
        let c = self.cell_of(p);
        self.index(c.x, c.y, c.z)
    }

    /// Whether `p` lies inside `[0, extent)` on every axis.
    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= 0.0
            && p.y >= 0.0
            && p.z >= 0.0
            && p.x < self.width as f32
            && p.y < self.height as f32
            && p.z < self.depth as f32
    }

    /// Integer coordinate of a linear index.
    pub fn coords(&self, index: usize) -> UVec3 {
        let w = self.width as usize;
        let plane = w * self.height as usize;
        UVec3::new((index % w) as u32, ((index % plane) / w) as u32, (index / plane) as u32)
    }
}

/// Which of the two buffers is currently the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    A,
    B,
}

impl Parity {
    pub fn flipped(self) -> Self {
        match self {
            Parity::A => Parity::B,
            Parity::B => Parity::A,
        }
    }

    /// Slot of the read buffer.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Parity::A => 0,
            Parity::B => 1,
        }
    }
}

/// Two buffers of the same kind with a read/write role that flips on
/// [`swap`](PingPong::swap).
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    slots: [T; 2],
    parity: Parity,
}

impl<T> PingPong<T> {
    pub fn new(slots: [T; 2]) -> Self {
        Self { slots, parity: Parity::A }
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    pub fn read(&self) -> &T {
        &self.slots[self.parity.index()]
    }

    pub fn write(&mut self) -> &mut T {
        &mut self.slots[self.parity.flipped().index()]
    }

    /// Borrow the read buffer and the write buffer at the same time.
    pub fn split(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.slots;
        match self.parity {
            Parity::A => (&*a, b),
            Parity::B => (&*b, a),
        }
    }

    pub fn swap(&mut self) {
        self.parity = self.parity.flipped();
    }

    /// Return to the initial roles.
    pub fn reset(&mut self) {
        self.parity = Parity::A;
    }

    /// Slot by absolute index, independent of parity.
    pub fn slot(&self, index: usize) -> &T {
        &self.slots[index]
    }

    pub fn slots_mut(&mut self) -> &mut [T; 2] {
        &mut self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== FieldShape Tests ==========

    #[test]
    fn test_index_roundtrip() {
        let shape = FieldShape::new(7, 5, 3);
        for i in [0, 6, 7, 34, 35, 104] {
            let c = shape.coords(i);
            assert_eq!(shape.index(c.x, c.y, c.z), i);
        }
    }

    #[test]
    fn test_cell_of_clamps() {
        let shape = FieldShape::new(10, 10, 1);
        assert_eq!(shape.cell_of(Vec3::new(-3.0, 4.5, 0.0)), UVec3::new(0, 4, 0));
        assert_eq!(shape.cell_of(Vec3::new(12.0, 9.99, 5.0)), UVec3::new(9, 9, 0));
    }

    #[test]
    fn test_contains() {
        let shape = FieldShape::new(4, 4, 1);
        assert!(shape.contains(Vec3::new(3.9, 0.0, 0.5)));
        assert!(!shape.contains(Vec3::new(4.0, 1.0, 0.0)));
        assert!(!shape.contains(Vec3::new(1.0, -0.1, 0.0)));
    }

    // ========== PingPong Tests ==========

    #[test]
    fn test_parity_alternates() {
        let mut pp = PingPong::new([0u8, 1u8]);
        for k in 0..10 {
            assert_eq!(*pp.read() as usize, k % 2);
            pp.swap();
        }
    }

    #[test]
    fn test_written_becomes_read() {
        let mut pp = PingPong::new([0i32, 0i32]);
        for k in 1..6 {
            *pp.write() = k;
            pp.swap();
            assert_eq!(*pp.read(), k);
        }
    }

    #[test]
    fn test_split_is_disjoint() {
        let mut pp = PingPong::new([vec![1.0f32], vec![2.0f32]]);
        pp.swap();
        let (read, write) = pp.split();
        assert_eq!(read[0], 2.0);
        write[0] = 9.0;
        assert_eq!(pp.slot(0)[0], 9.0);
        pp.reset();
        assert_eq!(pp.parity(), Parity::A);
    }
}
