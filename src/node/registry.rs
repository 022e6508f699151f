//! Process-wide network selection
//!
//! A node picks its network once at startup. The selected profile lives in
//! a `OnceLock` and is handed out as `&'static`; code that can take the
//! profile as an argument should prefer that over reading the global.

use std::sync::OnceLock;

use super::chainparams::{Network, NetworkProfile, ProfileError};

static SELECTED: OnceLock<NetworkProfile> = OnceLock::new();

/// Build and select the profile named `name` ("main", "test" or "regtest").
///
/// Selecting the same network again returns the existing profile; selecting
/// a different one fails.
pub fn select_network(name: &str) -> Result<&'static NetworkProfile, ProfileError> {
    let network: Network = name.parse()?;
    if let Some(current) = SELECTED.get() {
        return same_network(current, network);
    }
    install_profile(NetworkProfile::for_network(network)?)
}

/// Select an already built profile, e.g. a regtest profile with overridden
/// deployments
pub fn install_profile(profile: NetworkProfile) -> Result<&'static NetworkProfile, ProfileError> {
    let network = profile.network();
    let current = SELECTED.get_or_init(|| profile);
    same_network(current, network)
}

fn same_network(
    current: &'static NetworkProfile,
    requested: Network,
) -> Result<&'static NetworkProfile, ProfileError> {
    if current.network() == requested {
        Ok(current)
    } else {
        Err(ProfileError::AlreadySelected {
            selected: current.network(),
            requested,
        })
    }
}

/// The selected profile.
///
/// # Panics
///
/// If no network has been selected: consensus code must never run against
/// an implicit default.
pub fn selected_profile() -> &'static NetworkProfile {
    match SELECTED.get() {
        Some(profile) => profile,
        None => panic!("consensus parameters requested before a network was selected"),
    }
}

pub fn try_selected_profile() -> Option<&'static NetworkProfile> {
    SELECTED.get()
}
