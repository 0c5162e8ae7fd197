use std::path::Path;

use anyhow::bail;
use strata_core::StrataConfig;

pub fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let rendered = StrataConfig::scaffold().to_toml_string()?;
    std::fs::write(path, rendered)?;
    println!("✓ Generated {}", path.display());
    Ok(())
}
