//! # Program List
//!
//! A thin growable container over parsed [`Command`]s, standing in for
//! `original_source/commands.c`'s `program_t` (`program_init`,
//! `program_add_command`, `program_shrink`, `program_free`). A `Vec` already
//! gives us growth and bulk drop for free; this wrapper exists to keep the
//! "list of commands to run" a distinct, named thing at the call sites that
//! execute a whole program.

use crate::command::Command;

/// An ordered sequence of commands to execute against one session.
#[derive(Debug, Default)]
pub struct Program {
    commands: Vec<Command>,
}

impl Program {
    /// Build a program from an already-parsed command list.
    #[must_use]
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    /// Number of commands in the program.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the program has no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate the commands in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }
}

impl IntoIterator for Program {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;

    #[test]
    fn iterates_in_order() {
        let program = Program::new(vec![
            Command { order: 1, kind: CommandKind::ReadInstruction { vaddr: 0 } },
            Command { order: 2, kind: CommandKind::ReadData { vaddr: 4, size: 4 } },
        ]);
        let orders: Vec<_> = program.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![1, 2]);
    }
}
