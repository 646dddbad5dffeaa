//! Line input for the shell.
//!
//! The shell reads through `LineSource` so the same flow runs against an
//! interactive terminal, piped stdin, or a scripted reader in tests.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use reedline::{
    DefaultPrompt, Prompt, PromptEditMode, PromptHistorySearch, Reedline, Signal,
};
use std::borrow::Cow;
use std::io::{self, BufRead, Write};

/// Source of user input. `Ok(None)` means the user cancelled or input ended.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Reads a value without echoing it.
    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Reads lines from any buffered reader; prompts are not displayed.
pub struct BufReadInput<R> {
    reader: R,
}

impl<R: BufRead> BufReadInput<R> {
    pub fn new(reader: R) -> Self {
        BufReadInput { reader }
    }
}

impl<R: BufRead> LineSource for BufReadInput<R> {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.read_line(prompt)
    }
}

/// Prompt showing a field label, e.g. `host [.]: `.
struct LabelPrompt<'a> {
    label: &'a str,
}

impl Prompt for LabelPrompt<'_> {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed(self.label)
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _edit_mode: PromptEditMode) -> Cow<str> {
        Cow::Borrowed(" ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("::: ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: PromptHistorySearch,
    ) -> Cow<str> {
        Cow::Borrowed("(search) ")
    }
}

/// Interactive terminal input: a reedline editor for lines and raw-mode key
/// reading for secrets.
pub struct TerminalInput {
    editor: Reedline,
}

impl Default for TerminalInput {
    fn default() -> Self {
        TerminalInput::new()
    }
}

impl TerminalInput {
    pub fn new() -> Self {
        TerminalInput {
            editor: Reedline::create(),
        }
    }
}

impl LineSource for TerminalInput {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let signal = if prompt.is_empty() {
            self.editor.read_line(&DefaultPrompt::default())?
        } else {
            self.editor.read_line(&LabelPrompt { label: prompt })?
        };
        Ok(match signal {
            Signal::Success(line) => Some(line),
            _ => None,
        })
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{} ", prompt)?;
        stdout.flush()?;

        terminal::enable_raw_mode()?;
        let secret = read_hidden();
        terminal::disable_raw_mode()?;

        writeln!(stdout)?;
        secret
    }
}

fn read_hidden() -> io::Result<Option<String>> {
    let mut secret = String::new();
    loop {
        if let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event::read()?
        {
            match code {
                KeyCode::Enter => return Ok(Some(secret)),
                KeyCode::Esc => return Ok(None),
                KeyCode::Char('c') | KeyCode::Char('d')
                    if modifiers.contains(KeyModifiers::CONTROL) =>
                {
                    return Ok(None)
                }
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            }
        }
    }
}
