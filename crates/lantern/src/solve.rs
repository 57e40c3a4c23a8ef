//! Propagation-and-backtracking solver.
//!
//! Backs both the public [`solve`] entry point and the uniqueness check used
//! during synthesis. Deduction runs three rules to a fixpoint (exact clue
//! neighborhoods, banning cells already in a light's line of sight, forcing
//! a light wherever an unlit cell has a single remaining witness), then
//! branches on the first undecided cell.

use crate::{Board, Cell, Pos, Solution};

/// Solve a board, returning the full set of light positions (pre-placed
/// lights included) sorted by `(x, y)`, or `None` when no valid placement
/// exists.
///
/// Deterministic: the same board always yields the same first solution.
pub fn solve(board: &Board) -> Option<Solution> {
    let mut first = None;
    search_root(board, 1, &mut first);
    first
}

/// Count distinct solutions, stopping early once `limit` is reached.
///
/// `count_solutions(board, 2)` is the uniqueness probe used by synthesis.
pub fn count_solutions(board: &Board, limit: usize) -> usize {
    if limit == 0 {
        return 0;
    }
    let mut first = None;
    search_root(board, limit, &mut first)
}

fn search_root(board: &Board, limit: usize, first: &mut Option<Solution>) -> usize {
    let Some(state) = State::seed(board) else {
        return 0;
    };
    let mut found = 0;
    state.search(limit, &mut found, first);
    found
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// Undecided; may still host a light.
    Open,
    Light,
    /// May not host a light: a wall cell, or an open cell ruled out.
    Banned,
}

/// One node of the search tree. States are cloned at branch points and
/// discarded wholesale on contradiction, so a failed mutation never has to
/// be rolled back.
#[derive(Clone)]
struct State {
    width: usize,
    height: usize,
    wall: Vec<bool>,
    clues: Vec<(usize, u8)>,
    marks: Vec<Mark>,
    /// How many placed lights shine on each cell, the cell's own excluded.
    lit: Vec<u8>,
}

impl State {
    fn seed(board: &Board) -> Option<Self> {
        let width = board.width();
        let height = board.height();
        let cells = width * height;
        let mut wall = vec![false; cells];
        let mut clues = Vec::new();
        let mut pending = Vec::new();
        for pos in board.positions() {
            let i = pos.y * width + pos.x;
            match board.get(pos) {
                Cell::Empty => {}
                Cell::Light => pending.push(i),
                Cell::Barrier => wall[i] = true,
                Cell::Clue(n) => {
                    wall[i] = true;
                    clues.push((i, n));
                }
            }
        }
        let mut marks = vec![Mark::Open; cells];
        for (i, is_wall) in wall.iter().enumerate() {
            if *is_wall {
                marks[i] = Mark::Banned;
            }
        }
        let mut state = Self {
            width,
            height,
            wall,
            clues,
            marks,
            lit: vec![0; cells],
        };
        for i in pending {
            if !state.place_light(i) {
                return None;
            }
        }
        Some(state)
    }

    /// Open-region cells in the four lines of sight from `i`, walls excluded.
    fn visible(&self, i: usize) -> Vec<usize> {
        let x = (i % self.width) as isize;
        let y = (i / self.width) as isize;
        let mut seen = Vec::new();
        for (dx, dy) in [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)] {
            let (mut cx, mut cy) = (x + dx, y + dy);
            while cx >= 0
                && cy >= 0
                && (cx as usize) < self.width
                && (cy as usize) < self.height
            {
                let j = cy as usize * self.width + cx as usize;
                if self.wall[j] {
                    break;
                }
                seen.push(j);
                cx += dx;
                cy += dy;
            }
        }
        seen
    }

    fn orth(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        let x = (i % self.width) as isize;
        let y = (i / self.width) as isize;
        let width = self.width as isize;
        let height = self.height as isize;
        [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
            .into_iter()
            .filter(move |&(nx, ny)| nx >= 0 && ny >= 0 && nx < width && ny < height)
            .map(move |(nx, ny)| (ny * width + nx) as usize)
    }

    /// Place a light at `i`, banning and lighting its whole line of sight.
    /// Returns `false` on contradiction; the state is then unusable.
    fn place_light(&mut self, i: usize) -> bool {
        match self.marks[i] {
            Mark::Light => return true,
            Mark::Banned => return false,
            Mark::Open => {}
        }
        if self.lit[i] > 0 {
            return false;
        }
        self.marks[i] = Mark::Light;
        for j in self.visible(i) {
            self.lit[j] = self.lit[j].saturating_add(1);
            match self.marks[j] {
                // two lights in the same line of sight
                Mark::Light => return false,
                Mark::Open => self.marks[j] = Mark::Banned,
                Mark::Banned => {}
            }
        }
        true
    }

    fn ban(&mut self, i: usize) -> bool {
        match self.marks[i] {
            Mark::Light => false,
            _ => {
                self.marks[i] = Mark::Banned;
                true
            }
        }
    }

    /// Run all deduction rules to a fixpoint. Returns `false` on
    /// contradiction.
    fn propagate(&mut self) -> bool {
        loop {
            let mut changed = false;

            for k in 0..self.clues.len() {
                let (i, n) = self.clues[k];
                let n = n as usize;
                let mut placed = 0;
                let mut open = [0usize; 4];
                let mut open_len = 0;
                for j in self.orth(i) {
                    if self.wall[j] {
                        continue;
                    }
                    match self.marks[j] {
                        Mark::Light => placed += 1,
                        Mark::Open if self.lit[j] == 0 => {
                            open[open_len] = j;
                            open_len += 1;
                        }
                        _ => {}
                    }
                }
                if placed > n || placed + open_len < n {
                    return false;
                }
                if open_len == 0 {
                    continue;
                }
                if placed == n {
                    for &j in &open[..open_len] {
                        if !self.ban(j) {
                            return false;
                        }
                    }
                    changed = true;
                } else if placed + open_len == n {
                    for &j in &open[..open_len] {
                        if !self.place_light(j) {
                            return false;
                        }
                    }
                    changed = true;
                }
            }

            for i in 0..self.marks.len() {
                if self.wall[i] || self.marks[i] == Mark::Light || self.lit[i] > 0 {
                    continue;
                }
                // unlit cell: something in its line of sight (or the cell
                // itself) must still be able to host a light
                let mut witness = None;
                let mut candidates = 0;
                if self.marks[i] == Mark::Open {
                    witness = Some(i);
                    candidates = 1;
                }
                for j in self.visible(i) {
                    if self.marks[j] == Mark::Open && self.lit[j] == 0 {
                        witness.get_or_insert(j);
                        candidates += 1;
                        if candidates > 1 {
                            break;
                        }
                    }
                }
                match (candidates, witness) {
                    (0, _) => return false,
                    (1, Some(j)) => {
                        if !self.place_light(j) {
                            return false;
                        }
                        changed = true;
                    }
                    _ => {}
                }
            }

            if !changed {
                return true;
            }
        }
    }

    fn search(mut self, limit: usize, found: &mut usize, first: &mut Option<Solution>) {
        if !self.propagate() {
            return;
        }
        let branch = (0..self.marks.len())
            .find(|&i| self.marks[i] == Mark::Open && self.lit[i] == 0);
        let Some(i) = branch else {
            if self.is_solved() {
                *found += 1;
                if first.is_none() {
                    *first = Some(self.lights());
                }
            }
            return;
        };
        let mut with_light = self.clone();
        if with_light.place_light(i) {
            with_light.search(limit, found, first);
            if *found >= limit {
                return;
            }
        }
        if self.ban(i) {
            self.search(limit, found, first);
        }
    }

    fn is_solved(&self) -> bool {
        for i in 0..self.marks.len() {
            if !self.wall[i] && self.marks[i] != Mark::Light && self.lit[i] == 0 {
                return false;
            }
        }
        self.clues.iter().all(|&(i, n)| {
            let placed = self
                .orth(i)
                .filter(|&j| self.marks[j] == Mark::Light)
                .count();
            placed == n as usize
        })
    }

    fn lights(&self) -> Solution {
        let mut lights: Solution = (0..self.marks.len())
            .filter(|&i| self.marks[i] == Mark::Light)
            .map(|i| Pos {
                x: i % self.width,
                y: i / self.width,
            })
            .collect();
        lights.sort_unstable();
        lights
    }
}
