//! CLI module for the Formwork stack manager.
//!
//! This module provides the command-line interface for managing
//! infrastructure stacks.

mod commands;
mod output;

pub use commands::{Cli, Commands};
pub use output::{change_set_table, colored_status, confirm, stack_details};
