//! Run configuration.
//!
//! The YAML file is deserialized into [`RawConfig`] (every optional field has a
//! serde default) and validated once into the immutable [`RunConfig`] shared
//! by all stages. Validation failures are `PipelineError::Config` and happen
//! before any I/O.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use ocean_common::catalog::{self, ALONG_TRACK_DATASETS, REFERENCE_L4_DATASET, SWOT_NADIR_DATASET};
use ocean_common::time::date_stamp;
use ocean_common::{BoundingBox, DatasetKind, PipelineError, PipelineResult, Provider, RunWindow};
use serde::Deserialize;
use tracing::debug;

use crate::collaborators::download::RetryPolicy;

pub const DEFAULT_FILE_PATTERN: &str = "{dataset}_{date}.nc";

/// Root of the YAML configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub experiment: ExperimentSection,
    pub domain: DomainSection,
    #[serde(default)]
    pub datasets: DatasetsSection,
    #[serde(default)]
    pub sources: SourcesSection,
    #[serde(default)]
    pub outputs: OutputsSection,
    #[serde(default)]
    pub boundary: BoundarySection,
    #[serde(default)]
    pub validation: ValidationSection,
    #[serde(default)]
    pub stages: StagesSection,
    pub assimilation: CommandSection,
    #[serde(default)]
    pub lagrangian: Option<LagrangianSection>,
    #[serde(default)]
    pub dissemination: Option<DisseminationSection>,
    #[serde(default)]
    pub download: DownloadSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentSection {
    pub name: String,
    #[serde(default)]
    pub init_date: Option<NaiveDate>,
    /// Defaults to today (UTC).
    #[serde(default)]
    pub final_date: Option<NaiveDate>,
    /// Alternative to `init_date`.
    #[serde(default)]
    pub window_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainSection {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetsSection {
    #[serde(default = "default_along_track")]
    pub along_track: Vec<String>,
    #[serde(default = "default_reference_l4")]
    pub reference_l4: String,
    #[serde(default)]
    pub swot_nadir: bool,
    /// Per-dataset manifest overrides, keyed by dataset id.
    #[serde(default)]
    pub manifest: Vec<ManifestOverride>,
}

impl Default for DatasetsSection {
    fn default() -> Self {
        Self {
            along_track: default_along_track(),
            reference_l4: default_reference_l4(),
            swot_nadir: false,
            manifest: Vec::new(),
        }
    }
}

fn default_along_track() -> Vec<String> {
    ALONG_TRACK_DATASETS.iter().map(|s| s.to_string()).collect()
}

fn default_reference_l4() -> String {
    REFERENCE_L4_DATASET.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestOverride {
    pub dataset: String,
    #[serde(default)]
    pub file_pattern: Option<String>,
    #[serde(default)]
    pub min_files: Option<usize>,
    #[serde(default)]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesSection {
    #[serde(default = "default_cmems_url")]
    pub cmems_url: String,
    #[serde(default = "default_swot_url")]
    pub swot_url: String,
}

impl Default for SourcesSection {
    fn default() -> Self {
        Self {
            cmems_url: default_cmems_url(),
            swot_url: default_swot_url(),
        }
    }
}

fn default_cmems_url() -> String {
    "https://nrt.cmems-du.eu/altimetry".to_string()
}

fn default_swot_url() -> String {
    "https://swot.aviso.altimetry.fr/nadir".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputsSection {
    #[serde(default = "default_averaging_interval")]
    pub averaging_interval_hours: u32,
    #[serde(default = "default_postprocess_days")]
    pub postprocess_days: u32,
}

impl Default for OutputsSection {
    fn default() -> Self {
        Self {
            averaging_interval_hours: default_averaging_interval(),
            postprocess_days: default_postprocess_days(),
        }
    }
}

fn default_averaging_interval() -> u32 {
    24
}

fn default_postprocess_days() -> u32 {
    35
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoundarySection {
    #[serde(default = "default_extrapolation_radius")]
    pub extrapolation_radius: usize,
    #[serde(default = "default_margin_deg")]
    pub margin_deg: f64,
    #[serde(default = "default_boundary_variable")]
    pub variable: String,
}

impl Default for BoundarySection {
    fn default() -> Self {
        Self {
            extrapolation_radius: default_extrapolation_radius(),
            margin_deg: default_margin_deg(),
            variable: default_boundary_variable(),
        }
    }
}

fn default_extrapolation_radius() -> usize {
    3
}

fn default_margin_deg() -> f64 {
    1.0
}

fn default_boundary_variable() -> String {
    "adt".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationSection {
    #[serde(default = "default_qa_sample_size")]
    pub qa_sample_size: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Explicit track files, relative to the experiment scratch directory.
    #[serde(default)]
    pub track_files: Vec<PathBuf>,
    #[serde(default = "default_track_prefix")]
    pub track_prefix: String,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            qa_sample_size: default_qa_sample_size(),
            seed: None,
            track_files: Vec::new(),
            track_prefix: default_track_prefix(),
        }
    }
}

fn default_qa_sample_size() -> usize {
    25
}

fn default_track_prefix() -> String {
    "obs".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StagesSection {
    #[serde(default)]
    pub draw_l3: bool,
    #[serde(default)]
    pub make_alongtrack_rmse: bool,
    #[serde(default)]
    pub make_lagrangian_diags: bool,
    #[serde(default)]
    pub destination: Destination,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Where finished products are pushed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    #[default]
    None,
    Ifremer,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::None => "none",
            Destination::Ifremer => "ifremer",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandSection {
    pub command: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LagrangianSection {
    pub command: Vec<String>,
    #[serde(default = "default_lagrangian_days")]
    pub numdays: u32,
    #[serde(default = "default_bathy_level")]
    pub bathy_level: f64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_lagrangian_days() -> u32 {
    30
}

fn default_bathy_level() -> f64 {
    -1000.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisseminationSection {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_secs: u64,
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_retry_delay_secs: default_initial_retry_delay(),
            max_retry_delay_secs: default_max_retry_delay(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_retry_delay() -> u64 {
    2
}

fn default_max_retry_delay() -> u64 {
    120
}

fn default_request_timeout() -> u64 {
    600 // 10 minutes
}

/// Values supplied on the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub final_date: Option<NaiveDate>,
    pub seed: Option<u64>,
    pub work_dir: Option<PathBuf>,
}

/// What the pipeline expects to find for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    pub id: String,
    pub kind: DatasetKind,
    pub provider: Provider,
    pub file_pattern: String,
    pub min_files: usize,
    pub required: bool,
}

impl DatasetSpec {
    fn from_catalog(id: &str) -> Self {
        let entry = catalog::classify(id);
        let required = entry.kind == DatasetKind::MergedL4;
        Self {
            id: entry.id,
            kind: entry.kind,
            provider: entry.provider,
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            min_files: usize::from(required),
            required,
        }
    }

    /// Expected file names: one per window day, the final day only for the
    /// SWOT nadir product.
    pub fn expected_files(&self, window: &RunWindow) -> Vec<(NaiveDate, String)> {
        let days: Vec<NaiveDate> = match self.kind {
            DatasetKind::SwotNadir => vec![window.final_date],
            _ => window.days().collect(),
        };
        days.into_iter()
            .map(|day| (day, self.file_name(day)))
            .collect()
    }

    pub fn file_name(&self, day: NaiveDate) -> String {
        self.file_pattern
            .replace("{dataset}", &self.id)
            .replace("{date}", &date_stamp(day))
    }
}

#[derive(Debug, Clone)]
pub struct ExternalCommand {
    pub argv: Vec<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct LagrangianSettings {
    pub command: ExternalCommand,
    pub numdays: u32,
    pub bathy_level: f64,
}

#[derive(Debug, Clone)]
pub struct ValidationSettings {
    pub qa_sample_size: usize,
    pub seed: Option<u64>,
    pub track_files: Vec<PathBuf>,
    pub track_prefix: String,
}

/// Optional-stage switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageFlags {
    pub draw_l3: bool,
    pub make_alongtrack_rmse: bool,
    pub make_lagrangian_diags: bool,
    pub destination: Destination,
}

/// Validated, immutable configuration of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub experiment: String,
    pub window: RunWindow,
    pub bbox: BoundingBox,
    pub work_dir: PathBuf,
    pub datasets: Vec<DatasetSpec>,
    pub reference_l4: String,
    pub sources: SourcesSection,
    pub averaging_interval_hours: u32,
    pub postprocess_days: u32,
    pub boundary: BoundarySection,
    pub validation: ValidationSettings,
    pub stages: StageFlags,
    pub stage_timeout: Option<Duration>,
    pub assimilation: ExternalCommand,
    pub lagrangian: Option<LagrangianSettings>,
    pub dissemination_url: Option<String>,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl RawConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(experiment = %config.experiment.name, path = %path.display(), "Loaded run config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> PipelineResult<Self> {
        serde_yaml::from_str(content).map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Check every field and resolve the run window against `today`.
    pub fn validate(self, overrides: &ConfigOverrides, today: NaiveDate) -> PipelineResult<RunConfig> {
        let name = self.experiment.name.trim().to_string();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(PipelineError::Config(format!(
                "experiment.name must match [A-Za-z0-9_-]+, got {:?}",
                self.experiment.name
            )));
        }

        let final_date = overrides
            .final_date
            .or(self.experiment.final_date)
            .unwrap_or(today);
        let window = match (self.experiment.init_date, self.experiment.window_days) {
            (Some(_), Some(_)) => {
                return Err(PipelineError::Config(
                    "experiment.init_date and experiment.window_days are mutually exclusive".into(),
                ))
            }
            (Some(init), None) => RunWindow::resolve(init, final_date)?,
            (None, Some(0)) => {
                return Err(PipelineError::Config("experiment.window_days must be positive".into()))
            }
            (None, Some(days)) => RunWindow::trailing(final_date, days)?,
            (None, None) => {
                return Err(PipelineError::Config(
                    "one of experiment.init_date or experiment.window_days is required".into(),
                ))
            }
        };

        let d = &self.domain;
        let bbox = BoundingBox::validated(d.lon_min, d.lon_max, d.lat_min, d.lat_max)?;

        let datasets = self.datasets.resolve()?;

        let hours = self.outputs.averaging_interval_hours;
        if hours == 0 || 24 % hours != 0 {
            return Err(PipelineError::Config(format!(
                "outputs.averaging_interval_hours must divide 24, got {}",
                hours
            )));
        }
        if self.outputs.postprocess_days == 0 {
            return Err(PipelineError::Config("outputs.postprocess_days must be positive".into()));
        }
        if !(self.boundary.margin_deg.is_finite() && self.boundary.margin_deg >= 0.0) {
            return Err(PipelineError::Config("boundary.margin_deg must be a non-negative number".into()));
        }
        if self.boundary.variable.trim().is_empty() {
            return Err(PipelineError::Config("boundary.variable must not be empty".into()));
        }
        if self.validation.track_prefix.is_empty() && self.validation.track_files.is_empty() {
            return Err(PipelineError::Config(
                "validation.track_prefix must not be empty without validation.track_files".into(),
            ));
        }

        let assimilation = external_command("assimilation", self.assimilation.command, self.assimilation.timeout_secs)?;

        let lagrangian = match (self.stages.make_lagrangian_diags, self.lagrangian) {
            (true, None) => {
                return Err(PipelineError::Config(
                    "stages.make_lagrangian_diags requires a lagrangian section".into(),
                ))
            }
            (_, Some(section)) => Some(LagrangianSettings {
                command: external_command("lagrangian", section.command, section.timeout_secs)?,
                numdays: section.numdays,
                bathy_level: section.bathy_level,
            }),
            (false, None) => None,
        };

        let dissemination_url = match (self.stages.destination, self.dissemination) {
            (Destination::None, section) => section.map(|s| s.url),
            (_, Some(section)) if !section.url.trim().is_empty() => Some(section.url.trim_end_matches('/').to_string()),
            (destination, _) => {
                return Err(PipelineError::Config(format!(
                    "stages.destination = {} requires dissemination.url",
                    destination.as_str()
                )))
            }
        };

        let dl = &self.download;
        if dl.initial_retry_delay_secs > dl.max_retry_delay_secs {
            return Err(PipelineError::Config(
                "download.initial_retry_delay_secs exceeds download.max_retry_delay_secs".into(),
            ));
        }
        let retry = RetryPolicy {
            max_retries: dl.max_retries,
            initial_delay: Duration::from_secs(dl.initial_retry_delay_secs),
            max_delay: Duration::from_secs(dl.max_retry_delay_secs),
        };

        Ok(RunConfig {
            experiment: name,
            window,
            bbox,
            work_dir: overrides.work_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
            datasets,
            reference_l4: self.datasets.reference_l4.clone(),
            sources: self.sources,
            averaging_interval_hours: hours,
            postprocess_days: self.outputs.postprocess_days,
            boundary: self.boundary,
            validation: ValidationSettings {
                qa_sample_size: self.validation.qa_sample_size,
                seed: overrides.seed.or(self.validation.seed),
                track_files: self.validation.track_files,
                track_prefix: self.validation.track_prefix,
            },
            stages: StageFlags {
                draw_l3: self.stages.draw_l3,
                make_alongtrack_rmse: self.stages.make_alongtrack_rmse,
                make_lagrangian_diags: self.stages.make_lagrangian_diags,
                destination: self.stages.destination,
            },
            stage_timeout: self.stages.timeout_secs.map(Duration::from_secs),
            assimilation,
            lagrangian,
            dissemination_url,
            retry,
            request_timeout: Duration::from_secs(dl.request_timeout_secs),
        })
    }
}

impl DatasetsSection {
    /// The download manifest: along-track products, the reference L4 and
    /// optionally the SWOT nadir product, with overrides applied.
    fn resolve(&self) -> PipelineResult<Vec<DatasetSpec>> {
        if self.reference_l4.trim().is_empty() {
            return Err(PipelineError::Config("datasets.reference_l4 must not be empty".into()));
        }
        let mut specs: Vec<DatasetSpec> = Vec::new();
        let ids = self
            .along_track
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.reference_l4.as_str()))
            .chain(self.swot_nadir.then_some(SWOT_NADIR_DATASET));
        for id in ids {
            if id.trim().is_empty() {
                return Err(PipelineError::Config("dataset identifiers must not be empty".into()));
            }
            if specs.iter().any(|s| s.id == id) {
                return Err(PipelineError::Config(format!("dataset {} is listed twice", id)));
            }
            let mut spec = DatasetSpec::from_catalog(id);
            if id == self.reference_l4 {
                spec.kind = DatasetKind::MergedL4;
                spec.required = true;
                spec.min_files = 1;
            }
            specs.push(spec);
        }

        for o in &self.manifest {
            let spec = specs.iter_mut().find(|s| s.id == o.dataset).ok_or_else(|| {
                PipelineError::Config(format!("manifest entry for unknown dataset {}", o.dataset))
            })?;
            if let Some(pattern) = &o.file_pattern {
                if !pattern.contains("{date}") && spec.kind != DatasetKind::SwotNadir {
                    return Err(PipelineError::Config(format!(
                        "file_pattern for {} must contain {{date}}",
                        o.dataset
                    )));
                }
                spec.file_pattern = pattern.clone();
            }
            if let Some(min) = o.min_files {
                spec.min_files = min;
            }
            if let Some(required) = o.required {
                spec.required = required;
            }
        }
        Ok(specs)
    }
}

fn external_command(section: &str, argv: Vec<String>, timeout_secs: Option<u64>) -> PipelineResult<ExternalCommand> {
    if argv.first().map_or(true, |program| program.trim().is_empty()) {
        return Err(PipelineError::Config(format!("{}.command must name a program", section)));
    }
    Ok(ExternalCommand {
        argv,
        timeout: timeout_secs.map(Duration::from_secs),
    })
}

impl RunConfig {
    pub fn dataset(&self, id: &str) -> Option<&DatasetSpec> {
        self.datasets.iter().find(|d| d.id == id)
    }

    pub fn reference_dataset(&self) -> Option<&DatasetSpec> {
        self.dataset(&self.reference_l4)
    }

    pub fn source_url(&self, provider: Provider) -> &str {
        match provider {
            Provider::Cmems => &self.sources.cmems_url,
            Provider::Swot => &self.sources.swot_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
experiment:
  name: eurec4a_nrt
  init_date: 2024-01-01
  final_date: 2024-01-11
domain:
  lon_min: -65.0
  lon_max: -47.0
  lat_min: 5.0
  lat_max: 22.0
assimilation:
  command: ["massh-run", "--config", "config_EUREC4A.py"]
"#;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn validate(yaml: &str) -> PipelineResult<RunConfig> {
        RawConfig::from_yaml(yaml)?.validate(&ConfigOverrides::default(), today())
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = validate(MINIMAL).unwrap();
        assert_eq!(config.experiment, "eurec4a_nrt");
        assert_eq!(config.window.day_count(), 10);
        assert_eq!(config.bbox.as_tuple(), (-65.0, -47.0, 5.0, 22.0));
        assert_eq!(config.datasets.len(), 8);
        assert_eq!(config.averaging_interval_hours, 24);
        assert_eq!(config.postprocess_days, 35);
        assert_eq!(config.boundary.extrapolation_radius, 3);
        assert_eq!(config.validation.qa_sample_size, 25);
        assert_eq!(config.stages.destination, Destination::None);
        assert_eq!(config.retry.max_retries, 5);

        let l4 = config.reference_dataset().unwrap();
        assert!(l4.required);
        assert_eq!(l4.min_files, 1);
        assert!(config.datasets.iter().filter(|d| d.id != l4.id).all(|d| !d.required));
    }

    #[test]
    fn test_inverted_window_is_config_error() {
        let yaml = MINIMAL.replace("final_date: 2024-01-11", "final_date: 2023-12-01");
        assert!(matches!(validate(&yaml), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_final_date_defaults_to_today_and_cli_wins() {
        let yaml = MINIMAL
            .replace("  final_date: 2024-01-11\n", "")
            .replace("init_date: 2024-01-01", "window_days: 30");
        let config = validate(&yaml).unwrap();
        assert_eq!(config.window.final_date, today());
        assert_eq!(config.window.day_count(), 30);

        let overrides = ConfigOverrides {
            final_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            seed: Some(9),
            work_dir: Some(PathBuf::from("/data")),
        };
        let config = RawConfig::from_yaml(&yaml).unwrap().validate(&overrides, today()).unwrap();
        assert_eq!(config.window.final_date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(config.validation.seed, Some(9));
        assert_eq!(config.work_dir, PathBuf::from("/data"));
    }

    #[test]
    fn test_invalid_fields_are_rejected() {
        let cases = [
            MINIMAL.replace("eurec4a_nrt", "bad name!"),
            MINIMAL.replace("lon_max: -47.0", "lon_max: -70.0"),
            MINIMAL.replace("lat_max: 22.0", "lat_max: 95.0"),
            format!("{}outputs:\n  averaging_interval_hours: 7\n", MINIMAL),
            format!("{}stages:\n  destination: ifremer\n", MINIMAL),
            format!("{}stages:\n  make_lagrangian_diags: true\n", MINIMAL),
            MINIMAL.replace("[\"massh-run\", \"--config\", \"config_EUREC4A.py\"]", "[]"),
            format!("{}datasets:\n  along_track: [a, a]\n", MINIMAL),
            format!("{}unknown_section: 1\n", MINIMAL),
        ];
        for yaml in &cases {
            assert!(matches!(validate(yaml), Err(PipelineError::Config(_))), "accepted:\n{}", yaml);
        }
    }

    #[test]
    fn test_full_config() {
        let yaml = format!(
            r#"{}datasets:
  along_track: [dataset-duacs-nrt-global-al-phy-l3]
  swot_nadir: true
  manifest:
    - dataset: dataset-duacs-nrt-global-al-phy-l3
      file_pattern: "nrt_al_{{date}}.nc"
      min_files: 3
      required: true
outputs:
  averaging_interval_hours: 6
stages:
  draw_l3: true
  make_alongtrack_rmse: true
  make_lagrangian_diags: true
  destination: ifremer
  timeout_secs: 3600
lagrangian:
  command: ["lamta"]
dissemination:
  url: "https://ftp.example.org/upload/"
validation:
  seed: 42
"#,
            MINIMAL
        );
        let config = validate(&yaml).unwrap();
        assert_eq!(config.datasets.len(), 3);

        let al = config.dataset("dataset-duacs-nrt-global-al-phy-l3").unwrap();
        assert!(al.required);
        assert_eq!(al.min_files, 3);
        assert_eq!(al.file_name(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()), "nrt_al_20240105.nc");
        assert_eq!(al.expected_files(&config.window).len(), 11);

        let swot = config.dataset(SWOT_NADIR_DATASET).unwrap();
        assert_eq!(swot.provider, Provider::Swot);
        assert_eq!(swot.expected_files(&config.window).len(), 1);

        assert_eq!(config.lagrangian.as_ref().unwrap().numdays, 30);
        assert_eq!(config.lagrangian.as_ref().unwrap().bathy_level, -1000.0);
        assert_eq!(config.dissemination_url.as_deref(), Some("https://ftp.example.org/upload"));
        assert_eq!(config.stage_timeout, Some(Duration::from_secs(3600)));
        assert_eq!(config.validation.seed, Some(42));
    }

    #[test]
    fn test_example_config_is_valid() {
        let raw = RawConfig::from_yaml(include_str!("../config/pipeline.example.yaml")).unwrap();
        let overrides = ConfigOverrides {
            final_date: NaiveDate::from_ymd_opt(2024, 1, 11),
            ..Default::default()
        };
        let config = raw.validate(&overrides, today()).unwrap();
        assert_eq!(config.window.init_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(config.datasets.len(), 8);
        assert_eq!(config.reference_dataset().unwrap().min_files, 5);
        assert!(config.stages.draw_l3);
        assert!(!config.stages.make_lagrangian_diags);
        assert!(config.dissemination_url.is_none());
    }
}
