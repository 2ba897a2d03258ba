//! Show or persist the line-evaluation flag.

use pycalc_core::PreferenceStore;

use crate::colors;
use crate::settings::Settings;

pub fn execute(settings: &Settings, state: Option<bool>) -> anyhow::Result<()> {
    let mut store = settings.preference_store();

    let enabled = match state {
        Some(enabled) => {
            store.store_enabled(enabled)?;
            tracing::info!(enabled, path = %store.path().display(), "Stored line evaluation flag");
            enabled
        }
        None => store.load_enabled()?,
    };

    let (color, label) = if enabled {
        (colors::GREEN, "enabled")
    } else {
        (colors::DIM, "disabled")
    };
    println!("line evaluation is {}{}{}", color, label, colors::RESET);
    Ok(())
}
