//! Combinatorial tuple enumeration.
//!
//! [`Tuples`] merges N independently advancing sources into one lazy stream of
//! N-tuples. Index tuples are visited in order of their largest coordinate, then
//! their coordinate sum, then lexicographically, which is a linear extension of
//! pointwise dominance: a tuple is never emitted before one it dominates.
//!
//! No source is drained up front. Sources are pulled one value at a time, in
//! rotation, and only as far as the smallest pending index tuple requires. A
//! tuple reaching past the end of some dimension is parked on that dimension and
//! re-placed each time the dimension grows.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Point(Vec<usize>);

impl Point {
    fn max(&self) -> usize {
        self.0.iter().copied().max().unwrap_or(0)
    }

    fn sum(&self) -> usize {
        self.0.iter().sum()
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.max()
            .cmp(&other.max())
            .then_with(|| self.sum().cmp(&other.sum()))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Index bookkeeping, independent of the values.
#[derive(Debug)]
struct Frontier {
    sizes: Vec<usize>,
    closed: Vec<bool>,
    ready: BinaryHeap<Reverse<Point>>,
    blocked: HashMap<usize, Vec<Point>>,
    seen: HashSet<Point>,
}

impl Frontier {
    fn new(dimensions: usize) -> Self {
        let mut frontier = Self {
            sizes: vec![0; dimensions],
            closed: vec![false; dimensions],
            ready: BinaryHeap::new(),
            blocked: HashMap::new(),
            seen: HashSet::new(),
        };
        frontier.offer(Point(vec![0; dimensions]));
        frontier
    }

    fn offer(&mut self, point: Point) {
        if self.seen.insert(point.clone()) {
            self.place(point);
        }
    }

    fn place(&mut self, point: Point) {
        match (0..self.sizes.len()).find(|&i| point.0[i] >= self.sizes[i]) {
            Some(dim) if self.closed[dim] => {}
            Some(dim) => self.blocked.entry(dim).or_default().push(point),
            None => self.ready.push(Reverse(point)),
        }
    }

    fn grow(&mut self, dim: usize) {
        self.sizes[dim] += 1;
        if let Some(waiting) = self.blocked.remove(&dim) {
            for point in waiting {
                self.place(point);
            }
        }
    }

    /// The dimension will never grow again; tuples waiting on it are dead.
    fn close(&mut self, dim: usize) {
        self.closed[dim] = true;
        self.blocked.remove(&dim);
    }

    /// Source size needed before the smallest ready tuple may be emitted.
    fn demand(&self) -> Option<usize> {
        self.ready.peek().map(|Reverse(point)| point.max() + 1)
    }

    fn pop(&mut self) -> Option<Point> {
        let Reverse(point) = self.ready.pop()?;
        for i in 0..point.0.len() {
            let mut next = point.0.clone();
            next[i] += 1;
            self.offer(Point(next));
        }
        Some(point)
    }

    fn stalled(&self) -> bool {
        self.ready.is_empty() && self.blocked.values().all(Vec::is_empty)
    }
}

/// Lazy ordered product of several sources.
pub struct Tuples<'a, T> {
    sources: VecDeque<(usize, Box<dyn Iterator<Item = T> + 'a>)>,
    values: Vec<Vec<T>>,
    frontier: Frontier,
    floor: Option<Vec<usize>>,
}

impl<'a, T: Clone> Tuples<'a, T> {
    pub fn new(sources: Vec<Box<dyn Iterator<Item = T> + 'a>>) -> Self {
        let dimensions = sources.len();
        Self {
            sources: sources.into_iter().enumerate().collect(),
            values: (0..dimensions).map(|_| Vec::new()).collect(),
            frontier: Frontier::new(dimensions),
            floor: None,
        }
    }

    /// Skips every index tuple whose coordinates all lie below `floor`.
    pub fn outside(mut self, floor: Vec<usize>) -> Self {
        self.floor = Some(floor);
        self
    }

    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    /// Values pulled so far from source `dim`
    pub fn pulled(&self, dim: usize) -> &[T] {
        &self.values[dim]
    }

    fn inside_floor(&self, point: &[usize]) -> bool {
        match &self.floor {
            Some(floor) => point.iter().zip(floor).all(|(i, f)| i < f),
            None => false,
        }
    }

    /// Pulls one value from the source at `pos` in the rotation.
    fn pull(&mut self, pos: usize) {
        let Some((dim, mut source)) = self.sources.remove(pos) else {
            return;
        };
        match source.next() {
            Some(value) => {
                self.values[dim].push(value);
                self.frontier.grow(dim);
                self.sources.push_back((dim, source));
            }
            None => self.frontier.close(dim),
        }
    }

    /// Next index tuple, pulling from the sources as needed.
    pub fn next_indexed(&mut self) -> Option<Vec<usize>> {
        loop {
            match self.frontier.demand() {
                Some(need) => {
                    // Every live source must reach `need` values first, otherwise a
                    // smaller tuple could still be blocked behind it.
                    let sizes = &self.frontier.sizes;
                    if let Some(pos) = self.sources.iter().position(|(dim, _)| sizes[*dim] < need) {
                        self.pull(pos);
                        continue;
                    }
                    let Point(point) = self.frontier.pop()?;
                    if !self.inside_floor(&point) {
                        return Some(point);
                    }
                }
                None => {
                    if self.frontier.stalled() || self.sources.is_empty() {
                        self.sources.clear();
                        return None;
                    }
                    self.pull(0);
                }
            }
        }
    }
}

impl<'a, T: Clone> Iterator for Tuples<'a, T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Vec<T>> {
        let point = self.next_indexed()?;
        Some(
            point
                .iter()
                .enumerate()
                .map(|(dim, &i)| self.values[dim][i].clone())
                .collect(),
        )
    }
}
