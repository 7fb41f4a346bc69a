//! Capacity math for the add-capacity form
//!
//! Kubernetes quantity parsing, the fixed OSD size options, provisioned
//! capacity per added device set and the "currently used" figure derived
//! from Prometheus.

use crate::crd::{StorageCluster, DEFAULT_REPLICA};
use crate::domain::ports::{ClusterApiRef, MetricsSourceRef, ResourceRef};
use crate::error::{Error, Result};
use crate::metrics::queries::CEPH_CAPACITY_USED;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const KIB: u64 = 1024;
pub const MIB: u64 = KIB * 1024;
pub const GIB: u64 = MIB * 1024;
pub const TIB: u64 = GIB * 1024;
pub const PIB: u64 = TIB * 1024;

/// Shown when a figure cannot be computed
pub const NOT_AVAILABLE: &str = "Not available";

/// OSD sizes offered at install time, with their size in TiB
pub const OSD_CAPACITY_SIZES: [(&str, f64); 3] = [("512Gi", 0.5), ("2Ti", 2.0), ("4Ti", 4.0)];

// =============================================================================
// Quantities
// =============================================================================

/// Parse a Kubernetes resource quantity (`512Gi`, `2Ti`, `1T`, `1500M`, `1e12`, `42`) into bytes
pub fn parse_quantity(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::CapacityParse("empty quantity".into()));
    }

    let num_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    let num_str = &s[..num_end];
    let unit_str = &s[num_end..];

    let num: f64 = num_str
        .parse()
        .map_err(|_| Error::CapacityParse(format!("invalid number in quantity: {}", s)))?;

    let multiplier: f64 = match unit_str {
        "" => 1.0,
        "Ki" => KIB as f64,
        "Mi" => MIB as f64,
        "Gi" => GIB as f64,
        "Ti" => TIB as f64,
        "Pi" => PIB as f64,
        "Ei" => (PIB * 1024) as f64,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        // Decimal exponent form, `1e12` or `5E3`
        other => match other
            .strip_prefix(|c: char| c == 'e' || c == 'E')
            .and_then(|exp| exp.parse::<i32>().ok())
        {
            Some(exp) => 10f64.powi(exp),
            None => {
                return Err(Error::CapacityParse(format!(
                    "unknown unit in quantity: {}",
                    s
                )))
            }
        },
    };

    let bytes = num * multiplier;
    if !bytes.is_finite() || bytes > u64::MAX as f64 {
        return Err(Error::CapacityParse(format!("quantity out of range: {}", s)));
    }
    Ok(bytes as u64)
}

/// Size in TiB of one of the offered OSD sizes
pub fn osd_size_tib(quantity: &str) -> Option<f64> {
    OSD_CAPACITY_SIZES
        .iter()
        .find(|(q, _)| *q == quantity)
        .map(|(_, tib)| *tib)
}

fn trim_number(value: f64) -> String {
    let s = format!("{:.2}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Capacity provisioned by one device set of `size_tib` at replica 3
///
/// Fractional results keep two decimals (`0.5` gives `1.50`).
pub fn provisioned_capacity(size_tib: f64) -> String {
    let total = size_tib * DEFAULT_REPLICA as f64;
    if size_tib.fract() != 0.0 {
        format!("{:.2}", total)
    } else {
        format!("{}", total as u64)
    }
}

/// Format bytes with binary units (`1.5 TiB`)
pub fn humanize_binary_bytes(bytes: f64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", trim_number(value), UNITS[unit])
}

// =============================================================================
// View Model
// =============================================================================

/// Everything the add-capacity form shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCapacityView {
    pub name: String,
    pub namespace: String,
    pub device_set_count: u32,
    pub replica: u32,
    pub storage_class: Option<String>,
    /// Requested size per device, as written in the spec
    pub osd_size: Option<String>,
    pub osd_size_tib: Option<f64>,
    /// e.g. `6 TiB`; `None` for sizes outside the offered options
    pub provisioned_capacity: Option<String>,
    /// e.g. `1.5 TiB / 4 TiB`, or `Not available`
    pub currently_used: String,
}

impl AddCapacityView {
    /// Build the view from the cluster and the raw used bytes reported by Ceph
    pub fn build(cluster: &StorageCluster, used_raw_bytes: Option<f64>) -> Self {
        let device_set = cluster.first_device_set();
        let count = device_set.map(|d| d.count).unwrap_or(0);
        let osd_size = device_set.and_then(|d| d.device_size()).map(str::to_string);
        let osd_size_tib = osd_size.as_deref().and_then(osd_size_tib);

        let currently_used = match (used_raw_bytes, osd_size_tib) {
            (Some(raw), Some(size)) if count > 0 && raw > 0.0 => format!(
                "{} / {} TiB",
                humanize_binary_bytes(raw / DEFAULT_REPLICA as f64),
                trim_number(count as f64 * size)
            ),
            _ => NOT_AVAILABLE.to_string(),
        };

        Self {
            name: cluster.name().to_string(),
            namespace: cluster.namespace_or_default().to_string(),
            device_set_count: count,
            replica: device_set.map(|d| d.replica).unwrap_or(DEFAULT_REPLICA),
            storage_class: device_set.and_then(|d| d.storage_class()).map(str::to_string),
            osd_size,
            osd_size_tib,
            provisioned_capacity: osd_size_tib.map(|s| format!("{} TiB", provisioned_capacity(s))),
            currently_used,
        }
    }
}

/// Loads the add-capacity view from the cluster and Prometheus
pub struct CapacityService {
    api: ClusterApiRef,
    metrics: MetricsSourceRef,
}

impl CapacityService {
    pub fn new(api: ClusterApiRef, metrics: MetricsSourceRef) -> Self {
        Self { api, metrics }
    }

    /// Metrics failures degrade to `Not available`; cluster read failures are returned
    pub async fn view(&self, target: &ResourceRef) -> Result<AddCapacityView> {
        let cluster = self
            .api
            .get_storage_cluster(&target.namespace, &target.name)
            .await?;

        let used = match self.metrics.query(CEPH_CAPACITY_USED).await {
            Ok(samples) => samples.first().map(|s| s.value),
            Err(e) => {
                warn!("Used capacity query failed: {}", e);
                None
            }
        };

        Ok(AddCapacityView::build(&cluster, used))
    }
}
