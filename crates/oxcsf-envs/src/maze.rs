//! Discrete grid maze with eight-way movement.
//!
//! The map is a rectangle of cells: `#` walls, `.` free cells and `*`
//! goals. The agent senses its eight surrounding cells and is rewarded on
//! reaching a goal; moves into walls or off the map leave it in place.

use anyhow::{bail, ensure};
use arrayvec::ArrayVec;
use rand::{Rng as _, RngCore};

use oxcsf_engine::Environment;

const WALL: u8 = b'#';
const FREE: u8 = b'.';
const GOAL: u8 = b'*';

/// Sensor encoding per surrounding cell.
const SENSE_FREE: f64 = 0.1;
const SENSE_WALL: f64 = 0.5;
const SENSE_GOAL: f64 = 0.9;

/// Clockwise from north.
const MOVES: [(isize, isize); 8] = [
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
];

#[derive(Debug, Clone)]
pub struct Maze {
    cells: Vec<Vec<u8>>,
    free: Vec<(usize, usize)>,
    position: (usize, usize),
    state: Vec<f64>,
    done: bool,
}

impl Maze {
    /// Parses a rectangular map; it must contain at least one free cell and
    /// one goal.
    pub fn parse(rows: &[&str]) -> anyhow::Result<Self> {
        ensure!(!rows.is_empty(), "maze has no rows");
        let width = rows[0].len();
        ensure!(width > 0, "maze has empty rows");
        let mut cells = Vec::with_capacity(rows.len());
        let mut free = Vec::new();
        let mut goals = 0;
        for (r, row) in rows.iter().enumerate() {
            ensure!(row.len() == width, "maze row {r} is ragged");
            for (c, cell) in row.bytes().enumerate() {
                match cell {
                    WALL => {}
                    FREE => free.push((r, c)),
                    GOAL => goals += 1,
                    other => bail!("unknown maze cell {:?}", other as char),
                }
            }
            cells.push(row.bytes().collect());
        }
        ensure!(!free.is_empty(), "maze has no free cells");
        ensure!(goals > 0, "maze has no goal");
        let mut maze = Self {
            cells,
            free,
            position: (0, 0),
            state: vec![0.0; MOVES.len()],
            done: false,
        };
        maze.position = maze.free[0];
        maze.sense();
        Ok(maze)
    }

    /// The shortest path length from a free cell to any goal, for
    /// computing the optimum step count of a map.
    #[must_use]
    pub fn optimal_steps(&self) -> f64 {
        let mut total = 0.0;
        for &start in &self.free {
            let mut seen = vec![vec![false; self.cells[0].len()]; self.cells.len()];
            let mut queue = std::collections::VecDeque::from([(start, 0_u32)]);
            seen[start.0][start.1] = true;
            'bfs: while let Some((pos, dist)) = queue.pop_front() {
                for m in MOVES {
                    if let Some(next) = self.target(pos, m) {
                        if self.cell(next) == GOAL {
                            total += f64::from(dist + 1);
                            break 'bfs;
                        }
                        if !seen[next.0][next.1] {
                            seen[next.0][next.1] = true;
                            queue.push_back((next, dist + 1));
                        }
                    }
                }
            }
        }
        total / self.free.len() as f64
    }

    fn cell(&self, (r, c): (usize, usize)) -> u8 {
        self.cells[r][c]
    }

    /// The cell reached by a move, unless it leads off the map or into a
    /// wall.
    fn target(&self, (r, c): (usize, usize), (dr, dc): (isize, isize)) -> Option<(usize, usize)> {
        let r = r.checked_add_signed(dr)?;
        let c = c.checked_add_signed(dc)?;
        if r >= self.cells.len() || c >= self.cells[0].len() || self.cells[r][c] == WALL {
            return None;
        }
        Some((r, c))
    }

    fn sense(&mut self) {
        let mut sensors = ArrayVec::<f64, 8>::new();
        for m in MOVES {
            let value = match self.target(self.position, m) {
                None => SENSE_WALL,
                Some(next) if self.cell(next) == GOAL => SENSE_GOAL,
                Some(_) => SENSE_FREE,
            };
            sensors.push(value);
        }
        self.state.clear();
        self.state.extend(sensors);
    }
}

impl Environment for Maze {
    fn x_dim(&self) -> usize {
        MOVES.len()
    }

    fn n_actions(&self) -> usize {
        MOVES.len()
    }

    fn multistep(&self) -> bool {
        true
    }

    fn max_payoff(&self) -> f64 {
        1.0
    }

    fn reset(&mut self, rng: &mut dyn RngCore) {
        self.position = self.free[rng.random_range(0..self.free.len())];
        self.done = false;
        self.sense();
    }

    fn state(&self) -> &[f64] {
        &self.state
    }

    fn execute(&mut self, action: usize, _rng: &mut dyn RngCore) -> f64 {
        if let Some(next) = self.target(self.position, MOVES[action]) {
            if self.cell(next) == GOAL {
                self.done = true;
                self.position = next;
                self.sense();
                return 1.0;
            }
            self.position = next;
        }
        self.sense();
        0.0
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

/// A four-room map with one goal, a standard multistep benchmark shape.
#[must_use]
pub fn four_rooms() -> Maze {
    Maze::parse(&[
        "#########",
        "#...#...#",
        "#...#...#",
        "#.......#",
        "#...#...#",
        "####.####",
        "#...#...#",
        "#.......#",
        "#...#..*#",
        "#########",
    ])
    .expect("the built-in map is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    #[test]
    fn parse_rejects_bad_maps() {
        assert!(Maze::parse(&[]).is_err());
        assert!(Maze::parse(&["##", "#"]).is_err());
        assert!(Maze::parse(&["#x#"]).is_err());
        // no goal
        assert!(Maze::parse(&["###", "#.#", "###"]).is_err());
    }

    #[test]
    fn sensors_report_surrounding_cells() {
        let mut maze = Maze::parse(&["###", "#.*", "###"]).unwrap();
        let mut rng = Pcg64Mcg::seed_from_u64(210);
        maze.reset(&mut rng);
        // the single free cell: east is the goal, everything else walls
        assert_eq!(maze.state().len(), 8);
        for (i, s) in maze.state().iter().enumerate() {
            let expected = if i == 2 { SENSE_GOAL } else { SENSE_WALL };
            assert_eq!(*s, expected, "sensor {i}");
        }
    }

    #[test]
    fn walking_into_walls_stays_put() {
        let mut maze = Maze::parse(&["###", "#.*", "###"]).unwrap();
        let mut rng = Pcg64Mcg::seed_from_u64(211);
        maze.reset(&mut rng);
        let pos = maze.position;
        assert_eq!(maze.execute(0, &mut rng), 0.0);
        assert_eq!(maze.position, pos);
        assert!(!maze.is_done());
    }

    #[test]
    fn reaching_the_goal_pays_and_ends_the_trial() {
        let mut maze = Maze::parse(&["###", "#.*", "###"]).unwrap();
        let mut rng = Pcg64Mcg::seed_from_u64(212);
        maze.reset(&mut rng);
        assert_eq!(maze.execute(2, &mut rng), 1.0);
        assert!(maze.is_done());
    }

    #[test]
    fn four_rooms_is_reachable() {
        let maze = four_rooms();
        let optimal = maze.optimal_steps();
        assert!(optimal > 1.0);
        assert!(optimal < 10.0);
    }
}
