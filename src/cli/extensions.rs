//! `devlog providers` and `devlog plugins`.

use anyhow::Result;
use clap::Parser;

use crate::config::Settings;
use crate::pipeline::Extensions;

/// Lists every AI provider id, built-in and discovered.
#[derive(Parser, Debug)]
pub struct ProvidersCommand {}

impl ProvidersCommand {
    /// Executes the providers command.
    pub fn execute(self) -> Result<()> {
        let settings = Settings::load()?;
        let extensions = Extensions::load(&settings);
        print!("{}", provider_listing(&extensions, &settings.default_provider()));
        Ok(())
    }
}

/// Lists plugins in dispatch order.
#[derive(Parser, Debug)]
pub struct PluginsCommand {}

impl PluginsCommand {
    /// Executes the plugins command.
    pub fn execute(self) -> Result<()> {
        let settings = Settings::load()?;
        let extensions = Extensions::load(&settings);
        for (position, name) in extensions.plugins.names().iter().enumerate() {
            println!("{:>2}. {name}", position + 1);
        }
        Ok(())
    }
}

fn provider_listing(extensions: &Extensions, default: &str) -> String {
    extensions
        .providers
        .names()
        .iter()
        .map(|name| {
            if *name == default {
                format!("{name} (default)\n")
            } else {
                format!("{name}\n")
            }
        })
        .collect()
}
