//! Console [`Renderer`]s: boxed text and JSON lines.

use std::io::{self, Write};

use log::warn;
use serde::Serialize;

use crate::engine::{tile_value, Direction, Grid, Rank, Transition};
use crate::game::Renderer;

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn on_restart(&mut self, _grid: &Grid) {}

    fn on_move(&mut self, _direction: Direction, _grid: &Grid, _previous: &Grid, _transitions: &[Transition]) {}

    fn on_game_over(&mut self, _grid: &Grid) {}
}

/// Prints the grid after every event using its `Display` layout.
pub struct TextRenderer<W> {
    out: W,
    show_transitions: bool,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, show_transitions: false }
    }

    /// Also print the transition list before each grid.
    pub fn with_transitions(mut self, show: bool) -> Self {
        self.show_transitions = show;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, write: impl FnOnce(&mut W) -> io::Result<()>) {
        if let Err(e) = write(&mut self.out).and_then(|()| self.out.flush()) {
            warn!("text renderer: {e}");
        }
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn on_restart(&mut self, grid: &Grid) {
        self.emit(|out| write!(out, "{grid}"));
    }

    fn on_move(&mut self, direction: Direction, grid: &Grid, _previous: &Grid, transitions: &[Transition]) {
        let show = self.show_transitions;
        self.emit(|out| {
            if show {
                write!(out, "{direction}:")?;
                for t in transitions {
                    let arrow = if t.merged { "=>" } else { "->" };
                    write!(out, " ({},{}){arrow}({},{})", t.from.x, t.from.y, t.to.x, t.to.y)?;
                }
                writeln!(out)?;
            }
            write!(out, "{grid}")
        });
    }

    fn on_game_over(&mut self, grid: &Grid) {
        let best = tile_value(grid.highest_rank());
        self.emit(|out| writeln!(out, "Game over. Highest tile: {best}"));
    }
}

/// Grid as nested rows for serialization.
#[derive(Serialize)]
struct GridRows<'a> {
    width: usize,
    height: usize,
    rows: Vec<&'a [Rank]>,
}

impl<'a> From<&'a Grid> for GridRows<'a> {
    fn from(grid: &'a Grid) -> Self {
        Self { width: grid.width(), height: grid.height(), rows: (0..grid.height()).map(|y| grid.row(y)).collect() }
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    Restart { grid: GridRows<'a> },
    Move { direction: Direction, transitions: &'a [Transition], previous: GridRows<'a>, grid: GridRows<'a> },
    GameOver { grid: GridRows<'a> },
}

/// Writes one JSON object per event, newline-delimited.
///
/// ```
/// use tile_merge::engine::Grid;
/// use tile_merge::game::Renderer;
/// use tile_merge::render::JsonRenderer;
/// let mut r = JsonRenderer::new(Vec::new());
/// r.on_restart(&Grid::from_rows(&[[1u8, 0]]).unwrap());
/// let out = String::from_utf8(r.into_inner()).unwrap();
/// assert_eq!(out, "{\"event\":\"restart\",\"grid\":{\"width\":2,\"height\":1,\"rows\":[[1,0]]}}\n");
/// ```
pub struct JsonRenderer<W> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, event: &Event<'_>) {
        let res = serde_json::to_writer(&mut self.out, event)
            .map_err(io::Error::from)
            .and_then(|()| writeln!(self.out))
            .and_then(|()| self.out.flush());
        if let Err(e) = res {
            warn!("json renderer: {e}");
        }
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn on_restart(&mut self, grid: &Grid) {
        self.emit(&Event::Restart { grid: grid.into() });
    }

    fn on_move(&mut self, direction: Direction, grid: &Grid, previous: &Grid, transitions: &[Transition]) {
        self.emit(&Event::Move { direction, transitions, previous: previous.into(), grid: grid.into() });
    }

    fn on_game_over(&mut self, grid: &Grid) {
        self.emit(&Event::GameOver { grid: grid.into() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::apply_move;

    #[test]
    fn it_text_renderer_prints_transitions_and_grid() {
        let previous = Grid::from_rows(&[[1u8, 1]]).unwrap();
        let out = apply_move(&previous, Direction::Left);
        let mut r = TextRenderer::new(Vec::new()).with_transitions(true);
        r.on_move(Direction::Left, &out.grid, &previous, &out.transitions);
        r.on_game_over(&out.grid);
        let text = String::from_utf8(r.into_inner()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("left: (1,0)=>(0,0)"));
        assert_eq!(lines.next(), Some("+---+---+"));
        assert!(text.contains("| 4 |   |"));
        assert!(text.ends_with("Game over. Highest tile: 4\n"));
    }

    #[test]
    fn it_json_renderer_writes_one_line_per_event() {
        let previous = Grid::from_rows(&[[0u8, 2], [0, 0]]).unwrap();
        let out = apply_move(&previous, Direction::Left);
        let mut r = JsonRenderer::new(Vec::new());
        r.on_restart(&previous);
        r.on_move(Direction::Left, &out.grid, &previous, &out.transitions);
        r.on_game_over(&out.grid);
        let text = String::from_utf8(r.into_inner()).unwrap();
        let events: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["event"], "restart");
        assert_eq!(events[1]["event"], "move");
        assert_eq!(events[1]["direction"], "left");
        assert_eq!(
            events[1]["transitions"],
            serde_json::json!([{ "from": { "x": 1, "y": 0 }, "to": { "x": 0, "y": 0 }, "merged": false }])
        );
        assert_eq!(events[1]["grid"]["rows"], serde_json::json!([[2, 0], [0, 0]]));
        assert_eq!(events[2]["event"], "game_over");
    }
}
