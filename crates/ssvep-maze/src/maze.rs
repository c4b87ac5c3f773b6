//! Maze grid and player movement
//!
//! The map is a text grid where `#` is a wall and `.` (or a space) is free.
//! Each character is a square tile of `tile_size` pixels. The player is a
//! disk moving in pixel coordinates; a move tries the full step first and
//! shrinks it until the disk fits. Touching the outermost ring of tiles wins.

use serde::{Deserialize, Serialize};
use ssvep_core::Command;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Built-in map used when no map file is given
pub const DEFAULT_MAP: &str = include_str!("../maps/default.txt");

#[derive(Error, Debug)]
pub enum MazeError {
    #[error("Maze map is empty")]
    EmptyMap,

    #[error("Row {row} has {actual} tiles, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown tile {tile:?} at row {row}, column {col}")]
    InvalidTile { row: usize, col: usize, tile: char },

    #[error("Invalid maze configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Start position ({x}, {y}) is blocked")]
    StartBlocked { x: i32, y: i32 },

    #[error("Failed to read maze map: {0}")]
    Io(#[from] std::io::Error),
}

/// Binary occupancy grid
#[derive(Debug, Clone, PartialEq)]
pub struct Maze {
    width: usize,
    height: usize,
    walls: Vec<bool>,
}

impl Maze {
    /// Parse a text map
    pub fn parse(text: &str) -> Result<Self, MazeError> {
        let rows: Vec<&str> = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .collect();
        let rows = match rows.iter().rposition(|row| !row.is_empty()) {
            Some(last) => &rows[..=last],
            None => return Err(MazeError::EmptyMap),
        };

        let width = rows[0].chars().count();
        let mut walls = Vec::with_capacity(width * rows.len());

        for (row, line) in rows.iter().enumerate() {
            let actual = line.chars().count();
            if actual != width {
                return Err(MazeError::RaggedRow {
                    row,
                    expected: width,
                    actual,
                });
            }
            for (col, tile) in line.chars().enumerate() {
                match tile {
                    '#' => walls.push(true),
                    '.' | ' ' => walls.push(false),
                    _ => return Err(MazeError::InvalidTile { row, col, tile }),
                }
            }
        }

        Ok(Maze {
            width,
            height: rows.len(),
            walls,
        })
    }

    /// Read a text map from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MazeError> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Width in tiles
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in tiles
    pub fn height(&self) -> usize {
        self.height
    }

    /// Out-of-bounds tiles count as walls
    pub fn is_wall(&self, col: i32, row: i32) -> bool {
        if col < 0 || row < 0 || col as usize >= self.width || row as usize >= self.height {
            return true;
        }
        self.walls[row as usize * self.width + col as usize]
    }
}

/// Player and movement parameters, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MazeConfig {
    /// Side of one map tile
    pub tile_size: i32,
    pub player_radius: i32,
    /// Largest step of a single move
    pub move_step: i32,
    /// Amount the step shrinks by while the path is blocked
    pub step_decrement: i32,
    /// Start position relative to the map center
    pub start_offset: (i32, i32),
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            tile_size: 10,
            player_radius: 10,
            move_step: 20,
            step_decrement: 2,
            start_offset: (0, -40),
        }
    }
}

/// What a command did to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Moved by `step` pixels
    Moved { step: i32 },
    /// Moved by `step` pixels and reached the border
    Won { step: i32 },
    /// No step size fits
    Blocked,
    /// `Hold` command
    Held,
    /// The game is already won; waiting for a reset
    Finished,
}

/// One maze run
#[derive(Debug, Clone)]
pub struct MazeGame {
    maze: Maze,
    config: MazeConfig,
    start: (i32, i32),
    position: (i32, i32),
    victory: bool,
    moves: usize,
}

impl MazeGame {
    pub fn new(maze: Maze, config: MazeConfig) -> Result<Self, MazeError> {
        if config.tile_size <= 0 || config.player_radius < 0 || config.move_step <= 0 || config.step_decrement <= 0 {
            return Err(MazeError::InvalidConfig {
                message: format!("{:?}", config),
            });
        }

        let center = (
            (maze.width() / 2) as i32 * config.tile_size,
            (maze.height() / 2) as i32 * config.tile_size,
        );
        let start = (center.0 + config.start_offset.0, center.1 + config.start_offset.1);

        let game = MazeGame {
            maze,
            config,
            start,
            position: start,
            victory: false,
            moves: 0,
        };
        if !game.is_path_free(start) {
            return Err(MazeError::StartBlocked {
                x: start.0,
                y: start.1,
            });
        }
        Ok(game)
    }

    /// Tiles covered by the player disk centered at `position`
    fn disk_tiles(&self, position: (i32, i32)) -> impl Iterator<Item = (i32, i32)> + '_ {
        let r = self.config.player_radius;
        let tile = self.config.tile_size;
        (-r..=r).flat_map(move |dy| {
            (-r..=r)
                .filter(move |dx| dx * dx + dy * dy <= r * r)
                .map(move |dx| {
                    (
                        (position.0 + dx).div_euclid(tile),
                        (position.1 + dy).div_euclid(tile),
                    )
                })
        })
    }

    /// Whether the whole disk lies on free tiles
    pub fn is_path_free(&self, position: (i32, i32)) -> bool {
        self.disk_tiles(position)
            .all(|(col, row)| !self.maze.is_wall(col, row))
    }

    /// Whether the disk reaches the outermost ring of tiles
    pub fn touches_edge(&self, position: (i32, i32)) -> bool {
        let last_col = self.maze.width() as i32 - 1;
        let last_row = self.maze.height() as i32 - 1;
        self.disk_tiles(position)
            .any(|(col, row)| col <= 0 || col >= last_col || row <= 0 || row >= last_row)
    }

    /// Apply one navigation command
    pub fn apply(&mut self, command: Command) -> MoveOutcome {
        if self.victory {
            return MoveOutcome::Finished;
        }
        if command == Command::Hold {
            return MoveOutcome::Held;
        }

        let (dx, dy) = command.offset();
        let mut step = self.config.move_step;
        while step > 0 {
            let next = (self.position.0 + dx * step, self.position.1 + dy * step);
            if self.is_path_free(next) {
                self.position = next;
                self.moves += 1;
                if self.touches_edge(next) {
                    self.victory = true;
                    return MoveOutcome::Won { step };
                }
                return MoveOutcome::Moved { step };
            }
            step -= self.config.step_decrement;
        }

        MoveOutcome::Blocked
    }

    /// Back to the start position
    pub fn reset(&mut self) {
        self.position = self.start;
        self.victory = false;
        self.moves = 0;
    }

    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    pub fn start(&self) -> (i32, i32) {
        self.start
    }

    pub fn is_won(&self) -> bool {
        self.victory
    }

    /// Successful moves since the last reset
    pub fn moves(&self) -> usize {
        self.moves
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }
}

impl fmt::Display for MazeGame {
    /// Tile map with the player center drawn as `@`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let player = (
            self.position.0.div_euclid(self.config.tile_size),
            self.position.1.div_euclid(self.config.tile_size),
        );
        for row in 0..self.maze.height() as i32 {
            let line: String = (0..self.maze.width() as i32)
                .map(|col| {
                    if (col, row) == player {
                        '@'
                    } else if self.maze.is_wall(col, row) {
                        '#'
                    } else {
                        '.'
                    }
                })
                .collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOM: &str = "\
##########
#.........
#.........
#.........
##########
";

    fn room_game() -> MazeGame {
        let config = MazeConfig {
            tile_size: 1,
            player_radius: 1,
            move_step: 6,
            step_decrement: 2,
            start_offset: (1, 0),
        };
        MazeGame::new(Maze::parse(ROOM).unwrap(), config).unwrap()
    }

    #[test]
    fn test_parse() {
        let maze = Maze::parse(ROOM).unwrap();
        assert_eq!((maze.width(), maze.height()), (10, 5));
        assert!(maze.is_wall(0, 0));
        assert!(!maze.is_wall(9, 2));
        assert!(maze.is_wall(-1, 2));
        assert!(maze.is_wall(10, 2));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Maze::parse("\n\n"), Err(MazeError::EmptyMap)));
        assert!(matches!(
            Maze::parse("###\n##\n"),
            Err(MazeError::RaggedRow { row: 1, expected: 3, actual: 2 })
        ));
        assert!(matches!(
            Maze::parse("#x#\n"),
            Err(MazeError::InvalidTile { row: 0, col: 1, tile: 'x' })
        ));
    }

    #[test]
    fn test_start_position() {
        let game = room_game();
        assert_eq!(game.start(), (6, 2));
        assert_eq!(game.position(), (6, 2));
        assert!(!game.is_won());
    }

    #[test]
    fn test_step_shrinks_until_free() {
        let mut game = room_game();
        // a step of 6 overlaps the wall column
        assert_eq!(game.apply(Command::Left), MoveOutcome::Moved { step: 4 });
        assert_eq!(game.position(), (2, 2));
    }

    #[test]
    fn test_blocked_move() {
        let mut game = room_game();
        assert_eq!(game.apply(Command::Up), MoveOutcome::Blocked);
        assert_eq!(game.position(), (6, 2));
        assert_eq!(game.moves(), 0);
    }

    #[test]
    fn test_victory_and_reset() {
        let mut game = room_game();
        assert_eq!(game.apply(Command::Right), MoveOutcome::Won { step: 2 });
        assert!(game.is_won());

        assert_eq!(game.apply(Command::Left), MoveOutcome::Finished);
        assert_eq!(game.position(), (8, 2));

        game.reset();
        assert_eq!(game.position(), game.start());
        assert!(!game.is_won());
        assert_eq!(game.moves(), 0);
    }

    #[test]
    fn test_hold_does_nothing() {
        let mut game = room_game();
        assert_eq!(game.apply(Command::Hold), MoveOutcome::Held);
        assert_eq!(game.position(), game.start());
    }

    #[test]
    fn test_default_map_route() {
        let mut game = MazeGame::new(Maze::parse(DEFAULT_MAP).unwrap(), MazeConfig::default()).unwrap();
        assert_eq!(game.start(), (120, 80));

        for _ in 0..6 {
            assert_eq!(game.apply(Command::Down), MoveOutcome::Moved { step: 20 });
        }
        assert_eq!(game.apply(Command::Down), MoveOutcome::Won { step: 20 });
        assert_eq!(game.position(), (120, 220));
    }

    #[test]
    fn test_start_blocked() {
        let config = MazeConfig {
            tile_size: 1,
            player_radius: 1,
            start_offset: (0, -2),
            ..MazeConfig::default()
        };
        assert!(matches!(
            MazeGame::new(Maze::parse(ROOM).unwrap(), config),
            Err(MazeError::StartBlocked { .. })
        ));
    }

    #[test]
    fn test_render_marks_player() {
        let game = room_game();
        let rendered = game.to_string();
        let rows: Vec<&str> = rendered.lines().collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[2], "#.....@...");
    }
}
