//! Version command

use anyhow::{Context, Result};
use forge_schema::StructuredVersion;

/// Print the components of `raw`, or only its first `components` of them.
pub fn version(raw: &str, components: Option<usize>) -> Result<()> {
    let version =
        StructuredVersion::parse(raw).with_context(|| format!("Invalid version '{raw}'"))?;

    if let Some(n) = components {
        println!("{}", version.prefix(n)?);
        return Ok(());
    }

    let lw = 12;
    println!("{:<lw$}{}", "version", version.as_str());
    println!(
        "{:<lw$}{}",
        "components",
        version.components().collect::<Vec<_>>().join(" ")
    );
    println!("{:<lw$}{}", "osgi", version.to_osgi());
    Ok(())
}
