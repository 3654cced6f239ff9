//! Line-oriented text patching.
//!
//! A [`TextFile`] holds a file as an ordered sequence of lines, so that
//! replacing text on one line never shifts the offsets of another. The line
//! ending convention of the original file is kept when it is written back.

use std::{fs, io, ops::Range, path::Path};

use crate::parse::markdown::is_footnote_line;

/// The line terminator used by a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineEnding {
    /// Detects the convention from the first line break; files without one
    /// use `\n`.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        match text.find('\n') {
            Some(index) if text[..index].ends_with('\r') => Self::CrLf,
            _ => Self::Lf,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// A text file split into lines.
///
/// A file ending with a line terminator has an empty last line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFile {
    lines: Vec<String>,
    ending: LineEnding,
}

impl TextFile {
    /// Splits text into lines.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let ending = LineEnding::detect(text);
        let lines = text
            .split('\n')
            .map(|line| match ending {
                LineEnding::CrLf => line.strip_suffix('\r').unwrap_or(line),
                LineEnding::Lf => line,
            })
            .map(ToString::to_string)
            .collect();
        Self { lines, ending }
    }

    /// Reads a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not UTF-8.
    pub fn load(path: &Path) -> io::Result<Self> {
        fs::read_to_string(path).map(|text| Self::parse(&text))
    }

    /// Writes the file, replacing its previous content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.render())
    }

    /// The line ending the file uses.
    #[must_use]
    pub const fn ending(&self) -> LineEnding {
        self.ending
    }

    /// Returns a line by its one-based number.
    #[must_use]
    pub fn line(&self, line_no: usize) -> Option<&str> {
        line_no
            .checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .map(String::as_str)
    }

    /// Replaces a byte range within a line, keeping the rest of the line.
    ///
    /// Returns `false` if the line does not exist or the range is not within
    /// it on character boundaries.
    pub fn replace(&mut self, line_no: usize, range: Range<usize>, with: &str) -> bool {
        let Some(line) = line_no
            .checked_sub(1)
            .and_then(|index| self.lines.get_mut(index))
        else {
            return false;
        };
        if line.get(range.clone()).is_none() {
            return false;
        }
        line.replace_range(range, with);
        true
    }

    /// Appends footnote lines at the end of the file.
    ///
    /// Trailing blank lines are dropped first. A blank line separates the
    /// footnotes from body text, but not from a preceding footnote. The file
    /// ends with a line terminator after the last footnote.
    pub fn append_footnotes<I, S>(&mut self, footnotes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut footnotes = footnotes.into_iter().map(Into::into).peekable();
        if footnotes.peek().is_none() {
            return;
        }

        while self.lines.last().is_some_and(|line| line.trim().is_empty()) {
            self.lines.pop();
        }
        if self.lines.last().is_some_and(|line| !is_footnote_line(line)) {
            self.lines.push(String::new());
        }
        self.lines.extend(footnotes);
        self.lines.push(String::new());
    }

    /// Joins the lines back into text.
    #[must_use]
    pub fn render(&self) -> String {
        self.lines.join(self.ending.as_str())
    }
}
