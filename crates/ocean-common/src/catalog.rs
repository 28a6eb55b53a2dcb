//! Static catalog of the satellite altimetry products the pipeline consumes.

use serde::{Deserialize, Serialize};

/// Along-track (L3) products assimilated and validated against.
pub const ALONG_TRACK_DATASETS: [&str; 7] = [
    "dataset-duacs-nrt-global-al-phy-l3",
    "dataset-duacs-nrt-global-c2n-phy-l3",
    "dataset-duacs-nrt-global-h2b-phy-l3",
    "dataset-duacs-nrt-global-s3a-phy-l3",
    "dataset-duacs-nrt-global-s3b-phy-l3",
    "cmems_obs-sl_glo_phy-ssh_nrt_j3n-l3-duacs_PT1S",
    "cmems_obs-sl_glo_phy-ssh_nrt_s6a-hr-l3-duacs_PT1S",
];

/// Merged gridded (L4) product used as boundary forcing and as the baseline.
pub const REFERENCE_L4_DATASET: &str = "dataset-duacs-nrt-global-merged-allsat-phy-l4";

/// SWOT nadir altimeter product.
pub const SWOT_NADIR_DATASET: &str = "swot-nadir-l3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    AlongTrack,
    MergedL4,
    SwotNadir,
}

/// Upstream data provider, which also selects the credential pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Cmems,
    Swot,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Cmems => "cmems",
            Provider::Swot => "swot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub kind: DatasetKind,
    pub provider: Provider,
}

impl CatalogEntry {
    pub fn is_along_track(&self) -> bool {
        matches!(self.kind, DatasetKind::AlongTrack | DatasetKind::SwotNadir)
    }
}

/// Every known product.
pub fn catalog() -> Vec<CatalogEntry> {
    ALONG_TRACK_DATASETS
        .iter()
        .chain(std::iter::once(&REFERENCE_L4_DATASET))
        .chain(std::iter::once(&SWOT_NADIR_DATASET))
        .map(|id| classify(id))
        .collect()
}

/// Known entry for `id`, if any.
pub fn lookup(id: &str) -> Option<CatalogEntry> {
    catalog().into_iter().find(|entry| entry.id == id)
}

/// Classify any identifier. Unknown ids are treated as CMEMS along-track products.
pub fn classify(id: &str) -> CatalogEntry {
    let (kind, provider) = if id == REFERENCE_L4_DATASET {
        (DatasetKind::MergedL4, Provider::Cmems)
    } else if id == SWOT_NADIR_DATASET {
        (DatasetKind::SwotNadir, Provider::Swot)
    } else {
        (DatasetKind::AlongTrack, Provider::Cmems)
    };
    CatalogEntry {
        id: id.to_string(),
        kind,
        provider,
    }
}
