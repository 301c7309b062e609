//! Character display abstraction.
//!
//! Mirrors the few operations a HD44780 style LCD offers. [`TerminalDisplay`] draws the same
//! thing into a terminal so the board runs without the hardware.
use std::io::Write;

pub trait CharacterDisplay {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Blanks the display and resets any scrolling
    fn clear(&mut self) -> Result<(), Self::Error>;

    /// Shows `message`, one row per line
    fn set_message(&mut self, message: &str) -> Result<(), Self::Error>;

    /// Moves the content one column to the left
    fn scroll_left(&mut self) -> Result<(), Self::Error>;

    /// Moves the content one column to the right
    fn scroll_right(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug)]
pub struct TerminalDisplay<W> {
    out: W,
    columns: usize,
    rows: usize,
    message: String,
    /// Column of the message shown in the first display column, negative when scrolled right
    offset: i64,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W, columns: usize, rows: usize) -> Self {
        Self {
            out,
            columns,
            rows,
            message: String::new(),
            offset: 0,
        }
    }

    /// Writes the visible part of the message in a frame
    fn draw(&mut self) -> std::io::Result<()> {
        let border = format!("+{}+", "-".repeat(self.columns));
        let mut lines = self.message.lines();

        writeln!(self.out, "{border}")?;
        for _ in 0..self.rows {
            let row = visible(lines.next().unwrap_or_default(), self.offset, self.columns);
            writeln!(self.out, "|{row}|")?;
        }
        writeln!(self.out, "{border}")?;

        self.out.flush()
    }
}

/// `columns` characters of `line` starting at `offset`, padded with spaces
fn visible(line: &str, offset: i64, columns: usize) -> String {
    let chars: Vec<char> = line.chars().collect();

    (0..columns as i64)
        .map(|column| {
            usize::try_from(offset + column)
                .ok()
                .and_then(|i| chars.get(i).copied())
                .unwrap_or(' ')
        })
        .collect()
}

impl<W: Write> CharacterDisplay for TerminalDisplay<W> {
    type Error = std::io::Error;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.message.clear();
        self.offset = 0;
        Ok(())
    }

    fn set_message(&mut self, message: &str) -> Result<(), Self::Error> {
        self.message = message.to_string();
        self.draw()
    }

    fn scroll_left(&mut self) -> Result<(), Self::Error> {
        self.offset += 1;
        self.draw()
    }

    fn scroll_right(&mut self) -> Result<(), Self::Error> {
        self.offset -= 1;
        self.draw()
    }
}
