//! netnsplan show - print the merged configuration.

use std::io::{self, Write};

use clap::Args;
use netnsplan::DesiredState;

#[derive(Args)]
pub struct ShowCmd {}

impl ShowCmd {
    pub fn run(&self, state: &DesiredState) -> anyhow::Result<()> {
        let text = state.to_yaml_string()?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}
