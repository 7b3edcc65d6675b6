//! Firmware upgrade planning
//!
//! Maps a device model and its current firmware version to an upgrade plan,
//! based on a versioned plan table, and locates the planned images on disk.

use crate::error::ConsoleError;
use anyhow::{Context, Result, ensure};
use log::{debug, info};
use regex::Regex;
use semver::{Version, VersionReq};
use serde::Deserialize;
use serde_valid::Validate;
use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
    sync::LazyLock,
};

/// Plan table formats this build understands.
pub const SUPPORTED_TABLE_FORMAT: &str = ">=1.0.0, <2.0.0";

const EMBEDDED_TABLE: &str = include_str!("../../config/firmware_table.json");

/// Oldest firmware that offers the update upload outside the advanced view.
const ADVANCED_VIEW_NOT_NEEDED_FROM: FirmwareVersion = FirmwareVersion {
    major: 7,
    minor: 15,
};

static VERSION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\.(\d{1,2})\b").expect("version pattern is valid")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
}

impl FirmwareVersion {
    /// Extract the first `major.minor` token of a console text.
    ///
    /// Tolerates surrounding text, a hardware prefix such as `154.` and
    /// leading zeros: `"FRITZ!OS: 07.29"` and `"154.7.29"` both yield 7.29.
    pub fn parse(raw: &str) -> Option<Self> {
        let captures = VERSION_TOKEN.captures(raw)?;

        Some(Self {
            major: captures.get(1)?.as_str().parse().ok()?,
            minor: captures.get(2)?.as_str().parse().ok()?,
        })
    }

    /// Firmware before 7.15 hides the update upload behind the advanced view.
    pub fn needs_advanced_view(&self) -> bool {
        *self < ADVANCED_VIEW_NOT_NEEDED_FROM
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02}", self.major, self.minor)
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct FirmwareImage {
    #[validate(pattern = r"^\d{1,2}\.\d{1,2}$")]
    pub version: String,
    #[validate(min_length = 1)]
    pub image: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ModelPlan {
    #[validate(min_length = 1)]
    pub model: String,
    #[serde(rename = "final")]
    #[validate]
    pub target: FirmwareImage,
    #[validate]
    pub bridge: Option<FirmwareImage>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct FirmwareTable {
    #[validate(min_length = 1)]
    pub format_version: String,
    #[serde(default = "default_direct_jump_major")]
    pub direct_jump_major: u32,
    #[validate]
    pub models: Vec<ModelPlan>,
}

fn default_direct_jump_major() -> u32 {
    7
}

/// A concrete image to flash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirmwareTarget {
    pub model: String,
    pub version: FirmwareVersion,
    pub image: String,
}

impl FirmwareTarget {
    fn from_entry(model: &str, entry: &FirmwareImage) -> Result<Self> {
        let version = FirmwareVersion::parse(&entry.version)
            .with_context(|| format!("failed to parse planned version {}", entry.version))?;
        let image = entry
            .image
            .clone()
            .unwrap_or_else(|| format!("{model}-{version}.image"));

        Ok(Self {
            model: model.to_string(),
            version,
            image,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpgradePlan {
    NoOp,
    Direct(FirmwareTarget),
    Staged {
        bridge: FirmwareTarget,
        target: FirmwareTarget,
    },
}

impl UpgradePlan {
    /// Images to flash, in order.
    pub fn images(&self) -> Vec<&FirmwareTarget> {
        match self {
            UpgradePlan::NoOp => vec![],
            UpgradePlan::Direct(target) => vec![target],
            UpgradePlan::Staged { bridge, target } => vec![bridge, target],
        }
    }
}

impl FirmwareTable {
    /// Table compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_TABLE).context("failed to load embedded firmware table")
    }

    /// Load the table from `path`, or the embedded one if no path is given
    ///
    /// # Arguments
    /// * `path` - Optional JSON file overriding the embedded table
    ///
    /// # Returns
    /// The validated table
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::embedded();
        };

        info!("loading firmware table from {}", path.display());
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read firmware table {}", path.display()))?;

        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json).context("failed to parse firmware table")?;

        let format = Version::parse(&table.format_version)
            .context("failed to parse firmware table format version")?;
        let supported = VersionReq::parse(SUPPORTED_TABLE_FORMAT)
            .context("failed to parse supported table format")?;

        ensure!(
            supported.matches(&format),
            "failed to load firmware table: format {format} is not {supported}"
        );

        table
            .validate()
            .context("failed to validate firmware table")?;

        ensure!(
            !table.models.is_empty(),
            "failed to load firmware table: no models"
        );

        let mut seen = HashSet::new();
        for plan in &table.models {
            ensure!(
                seen.insert(plan.model.as_str()),
                "failed to load firmware table: duplicate model {}",
                plan.model
            );
        }

        Ok(table)
    }

    pub fn plan_for(&self, model: &str) -> Option<&ModelPlan> {
        self.models.iter().find(|plan| plan.model == model)
    }

    /// Resolve the upgrade plan of a device
    ///
    /// A pure function of the model and the normalized current version. A
    /// current version that cannot be normalized leaves the bridge rule
    /// undecidable, so it needs a manual choice like an unknown model.
    ///
    /// # Arguments
    /// * `model` - Detected model id
    /// * `current` - Raw firmware version text as shown by the console
    ///
    /// # Returns
    /// The plan, or [`ConsoleError::UnknownModelOrPlan`] when the image has to
    /// be chosen manually
    pub fn resolve(&self, model: &str, current: &str) -> Result<UpgradePlan> {
        debug!("resolve() called: {model} {current}");

        let plan = self
            .plan_for(model)
            .ok_or_else(|| ConsoleError::UnknownModelOrPlan {
                model: model.to_string(),
                reason: "model not in the firmware table".to_string(),
            })?;

        let target = FirmwareTarget::from_entry(model, &plan.target)?;

        let Some(current) = FirmwareVersion::parse(current) else {
            return Err(ConsoleError::UnknownModelOrPlan {
                model: model.to_string(),
                reason: format!("current firmware version '{current}' unknown"),
            }
            .into());
        };

        if let Some(bridge) = &plan.bridge
            && current.major < self.direct_jump_major
        {
            return Ok(UpgradePlan::Staged {
                bridge: FirmwareTarget::from_entry(model, bridge)?,
                target,
            });
        }

        if current == target.version {
            Ok(UpgradePlan::NoOp)
        } else {
            Ok(UpgradePlan::Direct(target))
        }
    }
}

/// Firmware images next to the executable
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, target: &FirmwareTarget) -> PathBuf {
        self.dir.join(&target.image)
    }

    /// Path of the image if it is present in the store.
    pub fn locate(&self, target: &FirmwareTarget) -> Option<PathBuf> {
        let path = self.path_for(target);
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TABLE: &str = r#"{
        "format_version": "1.2.0",
        "models": [
            { "model": "7590", "bridge": { "version": "07.59" }, "final": { "version": "08.03" } },
            { "model": "7530", "final": { "version": "08.02", "image": "FRITZ.Box_7530-08.02.image" } }
        ]
    }"#;

    fn table() -> FirmwareTable {
        FirmwareTable::from_json(TABLE).expect("should load table")
    }

    fn version(major: u32, minor: u32) -> FirmwareVersion {
        FirmwareVersion { major, minor }
    }

    mod normalization {
        use super::*;

        #[test]
        fn extracts_first_version_token() {
            let parsed = FirmwareVersion::parse("FRITZ!OS: 07.29").unwrap();
            assert_eq!(parsed, version(7, 29));
            assert_eq!(parsed.to_string(), "07.29");
        }

        #[test]
        fn tolerates_hardware_prefix_and_missing_zeros() {
            assert_eq!(FirmwareVersion::parse("154.07.29"), Some(version(7, 29)));
            assert_eq!(FirmwareVersion::parse("FRITZ!OS 7.29"), Some(version(7, 29)));
            assert_eq!(FirmwareVersion::parse("no version here"), None);
        }

        #[test]
        fn advanced_view_threshold() {
            assert!(version(6, 83).needs_advanced_view());
            assert!(version(7, 14).needs_advanced_view());
            assert!(!version(7, 15).needs_advanced_view());
            assert!(!version(8, 3).needs_advanced_view());
        }
    }

    mod plans {
        use super::*;

        #[test]
        fn old_firmware_gets_staged_plan() {
            let plan = table().resolve("7590", "06.83").unwrap();

            let UpgradePlan::Staged { bridge, target } = &plan else {
                panic!("expected staged plan, got {plan:?}");
            };
            assert_eq!(bridge.version.to_string(), "07.59");
            assert_eq!(target.version.to_string(), "08.03");
            assert_eq!(plan.images().len(), 2);
        }

        #[test]
        fn current_firmware_is_noop() {
            assert_eq!(table().resolve("7590", "08.03").unwrap(), UpgradePlan::NoOp);
            assert_eq!(
                table().resolve("7590", "FRITZ!OS: 8.03").unwrap(),
                UpgradePlan::NoOp
            );
        }

        #[test]
        fn newer_generation_jumps_directly() {
            let plan = table().resolve("7590", "07.29").unwrap();
            assert!(matches!(plan, UpgradePlan::Direct(ref t) if t.version == version(8, 3)));
        }

        #[test]
        fn unknown_model_requires_manual_selection() {
            let err = table().resolve("4040", "07.29").unwrap_err();
            assert!(matches!(
                crate::error::category(&err),
                Some(ConsoleError::UnknownModelOrPlan { model, .. }) if model == "4040"
            ));
        }

        #[test]
        fn unparseable_version_needs_manual_selection() {
            for raw in ["", "unknown", "FRITZ!OS"] {
                let err = table().resolve("7590", raw).unwrap_err();
                assert!(matches!(
                    crate::error::category(&err),
                    Some(ConsoleError::UnknownModelOrPlan { model, .. }) if model == "7590"
                ));
            }
        }

        #[test]
        fn resolving_twice_yields_the_same_plan() {
            let table = table();
            assert_eq!(
                table.resolve("7590", "06.83").unwrap(),
                table.resolve("7590", "06.83").unwrap()
            );
        }
    }

    mod table_loading {
        use super::*;

        #[test]
        fn embedded_table_loads() {
            let table = FirmwareTable::embedded().expect("should load embedded table");
            assert!(table.plan_for("7590").is_some_and(|p| p.bridge.is_some()));
        }

        #[test]
        fn rejects_unsupported_format() {
            let json = TABLE.replace("1.2.0", "2.0.0");
            assert!(FirmwareTable::from_json(&json).is_err());
        }

        #[test]
        fn rejects_malformed_version() {
            let json = TABLE.replace("\"08.02\"", "\"latest\"");
            assert!(FirmwareTable::from_json(&json).is_err());
        }

        #[test]
        fn rejects_duplicate_models() {
            let json = TABLE.replace("\"7530\"", "\"7590\"");
            assert!(FirmwareTable::from_json(&json).is_err());
        }

        #[test]
        fn loads_override_file() {
            let dir = tempdir().expect("should create temp dir");
            let path = dir.path().join("table.json");
            std::fs::write(&path, TABLE).expect("should write table");

            let table = FirmwareTable::load(Some(&path)).expect("should load table");
            assert_eq!(table.direct_jump_major, 7);
            assert_eq!(table.models.len(), 2);
        }
    }

    mod store {
        use super::*;

        #[test]
        fn image_names_follow_convention_unless_given() {
            let table = table();
            let UpgradePlan::Direct(convention) = table.resolve("7590", "07.29").unwrap() else {
                panic!("expected direct plan");
            };
            let UpgradePlan::Direct(explicit) = table.resolve("7530", "07.29").unwrap() else {
                panic!("expected direct plan");
            };

            assert_eq!(convention.image, "7590-08.03.image");
            assert_eq!(explicit.image, "FRITZ.Box_7530-08.02.image");
        }

        #[test]
        fn locate_only_finds_existing_images() {
            let dir = tempdir().expect("should create temp dir");
            let store = ImageStore::new(dir.path());
            let UpgradePlan::Direct(target) = table().resolve("7590", "07.29").unwrap() else {
                panic!("expected direct plan");
            };

            assert_eq!(store.locate(&target), None);

            std::fs::write(store.path_for(&target), b"image").expect("should write image");
            assert_eq!(store.locate(&target), Some(dir.path().join("7590-08.03.image")));
        }
    }
}
