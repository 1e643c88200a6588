/// Pager commands and matching logic

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Next,
  Prev,
  First,
  Last,
  Refetch,
  Help,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: Action,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "next",
    aliases: &["n", ">"],
    description: "Go to the next page",
    action: Action::Next,
  },
  Command {
    name: "prev",
    aliases: &["p", "<", "previous"],
    description: "Go to the previous page",
    action: Action::Prev,
  },
  Command {
    name: "first",
    aliases: &["f", "home"],
    description: "Go to the first page",
    action: Action::First,
  },
  Command {
    name: "last",
    aliases: &["l", "end"],
    description: "Go to the last page",
    action: Action::Last,
  },
  Command {
    name: "refetch",
    aliases: &["r", "reload"],
    description: "Fetch the current page again",
    action: Action::Refetch,
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    description: "List commands",
    action: Action::Help,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit pagefetch",
    action: Action::Quit,
  },
];

/// Get matching commands for a given input, best match first
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0));
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve a line of input to an action. Empty or ambiguous input resolves to nothing.
pub fn parse(input: &str) -> Option<Action> {
  let needle = input.trim().to_lowercase();
  if needle.is_empty() {
    return None;
  }

  match get_suggestions(&needle).as_slice() {
    [only] => Some(only.action),
    [best, ..] if best.name == needle || best.aliases.contains(&needle.as_str()) => {
      Some(best.action)
    }
    _ => None,
  }
}
