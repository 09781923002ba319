// Wire protocol between the chat gateway and the server.

pub mod command;
pub mod event;
pub mod reply;
pub mod token;

pub use command::{Command, CommandError, CommandInvocation, OptionValue, COMMANDS};
pub use event::{Event, EventContext, FocusedOption};
pub use reply::{ActionRow, Button, ButtonStyle, Choice, Modal, Reply, Response, TextInput};
pub use token::{InteractionToken, TokenAction, TokenError};
