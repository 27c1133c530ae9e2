pub mod add_commands;
pub mod pipeline;
pub mod rename_commands;
pub mod sort_commands;
pub mod supervisor_commands;
pub mod terminal_desk;
