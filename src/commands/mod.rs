//! The command table.
//!
//! Every command the server answers is registered here once, by lowercase name, with the shape
//! of its argument list and the handler that turns raw arguments into a typed [`Backend`] call.
//! Families register themselves from their own modules.

mod connection;
mod hashes;
mod keys;
mod parser;
mod sets;
mod sorted_sets;

pub use parser::CommandParser;

use std::collections::HashMap;

use crate::backend::Backend;
use crate::error::CommandError;
use crate::frame::Frame;

pub type Handler = fn(&dyn Backend, &mut CommandParser) -> Result<Frame, CommandError>;

/// How many arguments (not counting the command name) a command accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Fixed { required: usize, optional: usize },
    Variadic { required: usize },
}

impl Shape {
    pub const fn exactly(required: usize) -> Shape {
        Shape::Fixed {
            required,
            optional: 0,
        }
    }

    pub const fn at_least(required: usize) -> Shape {
        Shape::Variadic { required }
    }

    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Shape::Fixed { required, optional } => (required..=required + optional).contains(&count),
            Shape::Variadic { required } => count >= required,
        }
    }
}

#[derive(Clone, Copy)]
pub enum Op {
    Call(Handler),
    /// Reply `+OK`, then close the connection.
    Quit,
}

#[derive(Clone, Copy)]
pub struct Entry {
    pub name: &'static str,
    pub shape: Shape,
    pub op: Op,
}

pub struct Table {
    entries: HashMap<&'static [u8], Entry>,
}

impl Table {
    pub fn new() -> Table {
        let mut table = Table {
            entries: HashMap::new(),
        };

        keys::register(&mut table);
        hashes::register(&mut table);
        sets::register(&mut table);
        sorted_sets::register(&mut table);
        connection::register(&mut table);

        table
    }

    /// Looks up an already lowercased name.
    pub fn get(&self, name: &[u8]) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn add(&mut self, name: &'static str, shape: Shape, handler: Handler) {
        self.insert(Entry {
            name,
            shape,
            op: Op::Call(handler),
        });
    }

    fn insert(&mut self, entry: Entry) {
        debug_assert!(
            entry.name.bytes().all(|byte| !byte.is_ascii_uppercase()),
            "command names are registered lowercase"
        );
        self.entries.insert(entry.name.as_bytes(), entry);
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}
