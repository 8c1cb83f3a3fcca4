use bytes::Bytes;

/// A command as received from a client, before it is resolved against the command table.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    /// The name exactly as sent; resolution is case-insensitive.
    pub name: Bytes,
    pub args: Vec<Bytes>,
    /// Sent as a plain text line rather than a multi-bulk request. Inline commands get inline
    /// replies.
    pub inline: bool,
}

impl Command {
    pub fn new<A>(name: impl Into<Bytes>, args: impl IntoIterator<Item = A>) -> Command
    where
        A: Into<Bytes>,
    {
        Command {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            inline: false,
        }
    }

    pub fn inline(mut self) -> Command {
        self.inline = true;
        self
    }
}
