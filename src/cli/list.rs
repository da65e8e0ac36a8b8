//! `assetflow list`: registered filters and what they implement.

use anyhow::Result;
use assetflow::config::Kwargs;
use assetflow::filter::{Capabilities, Registry, Slot};
use owo_colors::{OwoColorize, Stream};
use std::io::{self, Write};

pub fn list_filters(registry: &Registry) -> Result<()> {
    let mut stdout = io::stdout().lock();
    for name in registry.names() {
        let caps = match registry.get_filter(name.as_str(), Kwargs::new()) {
            Ok(filter) => describe(filter.capabilities()),
            Err(err) => format!("({err})"),
        };
        let name = format!("{name:<16}");
        writeln!(stdout, "{} {}", name.if_supports_color(Stream::Stdout, |n| n.bold()), caps)?;
    }
    Ok(())
}

/// `open input output`, marking capabilities backed by an external tool.
fn describe(caps: Capabilities) -> String {
    let parts: Vec<String> = caps
        .present()
        .map(|c| match caps.get(c) {
            Slot::Tool => format!("{c}*"),
            _ => c.to_string(),
        })
        .collect();
    if parts.is_empty() {
        "-".to_owned()
    } else {
        parts.join(" ")
    }
}
