//! Update negotiation over the firmware catalog.
//!
//! Selection rule: among active, stable releases for the device type, keep
//! those strictly newer than the device's (version, build) whose
//! `min_current_version` gate (when set) the device already satisfies, then
//! answer the highest remaining (version, build). When the newest release is
//! gated, this naturally offers the intermediate stepping-stone release
//! instead; when nothing passes, the answer is "no update" even though newer
//! releases exist. Unstable releases are never offered automatically.

use crate::models::FirmwareRelease;
use crate::version::FirmwareVersion;

pub fn select_update<'a>(
    releases: &'a [FirmwareRelease],
    current_version: FirmwareVersion,
    current_build: i64,
) -> Option<&'a FirmwareRelease> {
    let mut best: Option<(FirmwareVersion, i64, &FirmwareRelease)> = None;

    for release in releases {
        if !release.is_active || !release.is_stable {
            continue;
        }
        // Unparseable catalog versions are ineligible, not fatal.
        let Some(version) = FirmwareVersion::parse(&release.version) else {
            continue;
        };
        if (version, release.build_number) <= (current_version, current_build) {
            continue;
        }
        if let Some(min) = release.min_current_version.as_deref() {
            match FirmwareVersion::parse(min) {
                Some(min) if current_version >= min => {}
                _ => continue,
            }
        }
        if best
            .map(|(v, b, _)| (version, release.build_number) > (v, b))
            .unwrap_or(true)
        {
            best = Some((version, release.build_number, release));
        }
    }

    best.map(|(_, _, release)| release)
}
