//! Built-in problem environments for the oxcsf engine: the Boolean
//! multiplexer, discrete mazes and CSV-backed supervised datasets.

pub mod csv;
pub mod maze;
pub mod multiplexer;

pub use self::maze::Maze;
pub use self::multiplexer::Multiplexer;
