use std::fmt;

use crate::types::Label;

/// Recognized signs in the order they were spelled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    symbols: Vec<Label>,
}

impl Message {
    #[cfg(test)]
    pub fn symbols(&self) -> &[Label] {
        &self.symbols
    }

    pub fn last(&self) -> Option<&Label> {
        self.symbols.last()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for symbol in &self.symbols {
            f.write_str(symbol.as_str())?;
        }
        Ok(())
    }
}

/// Appends a stable label only when it differs from the last spelled one.
#[derive(Clone, Debug, Default)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `stable` was appended.
    pub fn update(&mut self, stable: &Label) -> bool {
        if self.message.last() == Some(stable) {
            return false;
        }
        self.message.symbols.push(stable.clone());
        true
    }

    pub fn message(&self) -> &Message {
        &self.message
    }
}
