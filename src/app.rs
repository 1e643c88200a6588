use color_eyre::Result;
use pagefetch::{FetchPhase, FetchState, PageCursor};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::commands::{self, Action, COMMANDS};

/// Interactive pager over a `PageCursor`
pub struct App {
  cursor: PageCursor<Value>,
  should_quit: bool,
}

impl App {
  pub fn new(cursor: PageCursor<Value>) -> Self {
    Self {
      cursor,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(Duration::from_millis(100));

    println!("Type 'help' for commands.");
    self.draw();

    while !self.should_quit {
      tokio::select! {
        line = lines.next_line() => match line? {
          Some(line) => self.handle_input(&line),
          None => break,
        },
        _ = tick.tick() => {
          if self.cursor.poll() {
            self.draw();
          }
        }
      }
    }

    Ok(())
  }

  fn handle_input(&mut self, line: &str) {
    let Some(action) = commands::parse(line) else {
      if !line.trim().is_empty() {
        println!("Unknown command: {}", line.trim());
      }
      return;
    };

    debug!(?action, "command");
    if let Some(reason) = refusal(
      action,
      self.cursor.is_loading(),
      self.cursor.is_first_page(),
      self.cursor.is_last_page(),
    ) {
      println!("{}", reason);
      return;
    }

    let moved = match action {
      Action::Next => self.cursor.next(),
      Action::Prev => self.cursor.prev(),
      Action::First => self.cursor.first(),
      Action::Last => self.cursor.last(),
      Action::Refetch => {
        self.cursor.refetch();
        true
      }
      Action::Help => {
        print!("{}", help_text());
        return;
      }
      Action::Quit => {
        self.should_quit = true;
        return;
      }
    };

    if moved {
      self.draw();
    }
  }

  fn draw(&self) {
    print!(
      "{}",
      render_page(
        self.cursor.state(),
        self.cursor.current_page_number(),
        &self.cursor.total_pages_label(),
      )
    );
  }
}

/// Why a navigation command is refused, if it is.
fn refusal(action: Action, loading: bool, first: bool, last: bool) -> Option<&'static str> {
  match action {
    Action::Next | Action::Prev | Action::First | Action::Last if loading => {
      Some("Still loading, try again in a moment")
    }
    Action::Next | Action::Last if last => Some("Already on the last page"),
    Action::Prev | Action::First if first => Some("Already on the first page"),
    _ => None,
  }
}

fn help_text() -> String {
  COMMANDS
    .iter()
    .map(|cmd| format!("  {:<8} ({}) {}\n", cmd.name, cmd.aliases.join(", "), cmd.description))
    .collect()
}

/// Text for one page of results.
pub fn render_page(state: &FetchState<Value>, page: usize, total: &str) -> String {
  let mut out = format!("Page {} of {}\n", page, total);

  if state.loading {
    out.push_str("Loading...\n");
    return out;
  }

  if let Some(error) = &state.error {
    out.push_str(&format!("Error: {}\n", error));
  }

  match (&state.data, state.phase) {
    (_, FetchPhase::Idle) => {}
    (Some(Value::Array(items)), _) => {
      for item in items {
        out.push_str(&format!("  - {}\n", item));
      }
    }
    (Some(other), _) => out.push_str(&format!("  {}\n", other)),
    (None, _) => {}
  }

  out
}
