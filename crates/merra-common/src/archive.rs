//! MERRA-2 product definitions, archive layout and local mirror scanning.
//!
//! The remote archive stores one file per day (hourly product) or per month
//! (monthly product) under dated directories:
//!
//! ```text
//! https://goldsmr4.gesdisc.eosdis.nasa.gov/data/MERRA2/M2T1NXLND.5.12.4/2018/10/
//!     MERRA2_400.tavg1_2d_lnd_Nx.20181001.nc4
//! ```
//!
//! A local mirror keeps the dated part of that layout (`{root}/2018/10/...`).
//! Nothing here performs network transport; download planning only produces
//! the URL and local directory for each date.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{MerraError, MerraResult};
use crate::time::{Cadence, ImageSequence};

const GESDISC_ROOT: &str = "https://goldsmr4.gesdisc.eosdis.nasa.gov";

/// Supported MERRA-2 land surface diagnostics collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Product {
    /// M2T1NXLND: hourly time-averaged land diagnostics, 24 images per file
    HourlyLand,
    /// M2TMNXLND: monthly mean land diagnostics, one image per file
    MonthlyLand,
}

impl Product {
    pub const ALL: [Product; 2] = [Product::HourlyLand, Product::MonthlyLand];

    pub fn short_name(&self) -> &'static str {
        match self {
            Product::HourlyLand => "M2T1NXLND",
            Product::MonthlyLand => "M2TMNXLND",
        }
    }

    /// Collection version as used in the archive path.
    pub fn version(&self) -> &'static str {
        match self {
            Product::HourlyLand => "M2T1NXLND.5.12.4",
            Product::MonthlyLand => "M2TMNXLND.5.12.4",
        }
    }

    /// Name recorded in the global metadata of every time-series store.
    pub fn product_name(&self) -> &'static str {
        match self {
            Product::HourlyLand => "MERRA2_hourly",
            Product::MonthlyLand => "MERRA2_monthly",
        }
    }

    /// First date for which the product exists.
    pub fn first_available(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(1980, 1, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn default_cadence(&self) -> Cadence {
        match self {
            Product::HourlyLand => Cadence::SixHourly,
            Product::MonthlyLand => Cadence::Monthly,
        }
    }

    /// Whether the product's files hold images at `cadence`: hourly files for
    /// the sub-daily and daily cadences, monthly files for the monthly one.
    pub fn supports(&self, cadence: Cadence) -> bool {
        match self {
            Product::HourlyLand => cadence.step_hours().is_some(),
            Product::MonthlyLand => cadence == Cadence::Monthly,
        }
    }

    /// Product whose files carry images at the given cadence.
    pub fn for_cadence(cadence: Cadence) -> Self {
        match cadence {
            Cadence::Monthly => Product::MonthlyLand,
            _ => Product::HourlyLand,
        }
    }

    /// Index along the file's time dimension holding the image for `timestamp`.
    pub fn time_index(&self, timestamp: DateTime<Utc>) -> usize {
        match self {
            Product::HourlyLand => timestamp.hour() as usize,
            Product::MonthlyLand => 0,
        }
    }

    pub fn layout(&self) -> ArchiveLayout {
        let (dirs, collection, token) = match self {
            Product::HourlyLand => (
                vec![DirTemplate::Year, DirTemplate::Month],
                "tavg1_2d_lnd_Nx",
                DateToken::Day,
            ),
            Product::MonthlyLand => (vec![DirTemplate::Year], "tavgM_2d_lnd_Nx", DateToken::Month),
        };

        ArchiveLayout {
            version: self.version().to_string(),
            url_root: GESDISC_ROOT.to_string(),
            remote_dirs: vec!["data".to_string(), "MERRA2".to_string(), self.version().to_string()],
            dirs,
            file: FileTemplate::new("MERRA2_", format!(".{}.", collection), token, ".nc4"),
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version())
    }
}

impl FromStr for Product {
    type Err = MerraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "hourly" | "M2T1NXLND" | "M2T1NXLND.5.12.4" => Ok(Product::HourlyLand),
            "monthly" | "M2TMNXLND" | "M2TMNXLND.5.12.4" => Ok(Product::MonthlyLand),
            other => Err(MerraError::UnknownProduct(other.to_string())),
        }
    }
}

/// One dated directory level of the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirTemplate {
    /// `%Y`
    Year,
    /// `%m`
    Month,
}

impl DirTemplate {
    pub fn format(&self, date: NaiveDate) -> String {
        match self {
            DirTemplate::Year => format!("{:04}", date.year()),
            DirTemplate::Month => format!("{:02}", date.month()),
        }
    }

    /// Whether a directory name could have been produced by [`DirTemplate::format`].
    pub fn matches(&self, name: &str) -> bool {
        let all_digits = |len: usize| name.len() == len && name.bytes().all(|b| b.is_ascii_digit());
        match self {
            DirTemplate::Year => all_digits(4),
            DirTemplate::Month => {
                all_digits(2) && name.parse::<u32>().map_or(false, |m| (1..=12).contains(&m))
            }
        }
    }
}

/// Date token embedded in a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateToken {
    /// `%Y%m%d`
    Day,
    /// `%Y%m`, resolved to the first day of the month
    Month,
}

impl DateToken {
    fn format(&self, date: NaiveDate) -> String {
        match self {
            DateToken::Day => date.format("%Y%m%d").to_string(),
            DateToken::Month => date.format("%Y%m").to_string(),
        }
    }

    fn parse(&self, s: &str) -> Option<NaiveDate> {
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match self {
            DateToken::Day if s.len() == 8 => NaiveDate::parse_from_str(s, "%Y%m%d").ok(),
            DateToken::Month if s.len() == 6 => {
                let year = s[..4].parse().ok()?;
                let month = s[4..].parse().ok()?;
                NaiveDate::from_ymd_opt(year, month, 1)
            }
            _ => None,
        }
    }

    /// Whether two dates fall on the same token value.
    fn same_period(&self, a: NaiveDate, b: NaiveDate) -> bool {
        match self {
            DateToken::Day => a == b,
            DateToken::Month => a.year() == b.year() && a.month() == b.month(),
        }
    }
}

/// File name pattern `{prefix}*{infix}{date}{suffix}`.
///
/// The single wildcard stands for the processing stream number
/// (`100`, `200`, `300`, `400`) which changes over the archive's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTemplate {
    prefix: String,
    infix: String,
    date: DateToken,
    suffix: String,
}

impl FileTemplate {
    pub fn new(
        prefix: impl Into<String>,
        infix: impl Into<String>,
        date: DateToken,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            infix: infix.into(),
            date,
            suffix: suffix.into(),
        }
    }

    pub fn date_token(&self) -> DateToken {
        self.date
    }

    /// Glob-style pattern for one date, e.g. `MERRA2_*.tavg1_2d_lnd_Nx.20181001.nc4`.
    pub fn glob(&self, date: NaiveDate) -> String {
        format!(
            "{}*{}{}{}",
            self.prefix,
            self.infix,
            self.date.format(date),
            self.suffix
        )
    }

    /// Date encoded in a matching file name.
    pub fn parse(&self, file_name: &str) -> Option<NaiveDate> {
        let rest = file_name
            .strip_prefix(&self.prefix)?
            .strip_suffix(&self.suffix)?;
        let (stream, date) = rest.rsplit_once(self.infix.as_str())?;
        if stream.is_empty() || stream.contains(['/', '\\']) {
            return None;
        }
        self.date.parse(date)
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.parse(file_name).is_some()
    }
}

/// Where a product lives remotely and in a local mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    pub version: String,
    pub url_root: String,
    /// Fixed remote path components between the root and the dated directories
    pub remote_dirs: Vec<String>,
    /// Dated directory levels, shared by the remote archive and the local mirror
    pub dirs: Vec<DirTemplate>,
    pub file: FileTemplate,
}

impl ArchiveLayout {
    fn dated_components(&self, date: NaiveDate) -> impl Iterator<Item = String> + '_ {
        self.dirs.iter().map(move |d| d.format(date))
    }

    /// Remote directory URL holding the file for `date` (trailing slash included).
    pub fn url_for(&self, date: NaiveDate) -> String {
        let mut url = self.url_root.trim_end_matches('/').to_string();
        for component in self.remote_dirs.iter().cloned().chain(self.dated_components(date)) {
            url.push('/');
            url.push_str(&component);
        }
        url.push('/');
        url
    }

    /// Local mirror directory holding the file for `date`.
    pub fn local_dir(&self, root: &Path, date: NaiveDate) -> PathBuf {
        self.dated_components(date)
            .fold(root.to_path_buf(), |path, component| path.join(component))
    }

    /// Locate the file for `date` in the local mirror.
    ///
    /// When several stream numbers are present the alphabetically first wins.
    pub fn find_file(&self, root: &Path, date: NaiveDate) -> Option<PathBuf> {
        let dir = self.local_dir(root, date);
        let found = sorted_entries(&dir)
            .filter(|e| e.file_type().is_file())
            .find(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|name| self.file.parse(name))
                    .map_or(false, |d| self.file.date_token().same_period(d, date))
            })
            .map(|e| e.into_path());

        debug!(
            dir = %dir.display(),
            date = %date,
            found = found.is_some(),
            "Looked up archive file"
        );
        found
    }

    /// First directory under `root` whose components match every dated level.
    pub fn first_folder(&self, root: &Path) -> Option<PathBuf> {
        self.dirs.iter().try_fold(root.to_path_buf(), |dir, template| {
            first_formatted_dir_in_dir(&dir, *template).map(|name| dir.join(name))
        })
    }

    /// Last directory under `root` whose components match every dated level.
    pub fn last_folder(&self, root: &Path) -> Option<PathBuf> {
        self.dirs.iter().try_fold(root.to_path_buf(), |dir, template| {
            last_formatted_dir_in_dir(&dir, *template).map(|name| dir.join(name))
        })
    }

    /// Matching file dates in one directory, ascending.
    fn file_dates(&self, dir: &Path) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = sorted_entries(dir)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.file_name().to_str().and_then(|name| self.file.parse(name)))
            .collect();
        dates.sort();
        dates
    }

    /// Product version and first/last file dates found in a local mirror.
    pub fn folder_version_first_last(&self, root: &Path) -> ArchiveExtent {
        let first = self
            .first_folder(root)
            .and_then(|dir| self.file_dates(&dir).first().copied());
        let last = self
            .last_folder(root)
            .and_then(|dir| self.file_dates(&dir).last().copied());
        let version = first.or(last).map(|_| self.version.clone());

        debug!(root = %root.display(), ?version, ?first, ?last, "Scanned local archive");
        ArchiveExtent {
            version,
            first,
            last,
        }
    }
}

/// What a local mirror already holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveExtent {
    pub version: Option<String>,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

/// Directory entries directly below `dir`, sorted by name. Missing or
/// unreadable directories yield nothing.
fn sorted_entries(dir: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
}

fn formatted_dirs(dir: &Path, template: DirTemplate) -> impl Iterator<Item = String> {
    sorted_entries(dir)
        .filter(|e| e.file_type().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(move |name| template.matches(name))
}

/// Alphabetically first subdirectory of `dir` matching `template`.
pub fn first_formatted_dir_in_dir(dir: &Path, template: DirTemplate) -> Option<String> {
    formatted_dirs(dir, template).next()
}

/// Alphabetically last subdirectory of `dir` matching `template`.
pub fn last_formatted_dir_in_dir(dir: &Path, template: DirTemplate) -> Option<String> {
    formatted_dirs(dir, template).last()
}

/// One remote directory to mirror and the dates it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTarget {
    pub url: String,
    pub local_dir: PathBuf,
    pub first: NaiveDate,
    pub last: NaiveDate,
}

/// Date range and product to bring a local mirror up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub product: Product,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DownloadPlan {
    /// Resolve the range to fetch into `root`.
    ///
    /// A missing start continues from the last date already mirrored, or
    /// from the product's first date for an empty mirror. A missing end
    /// means `today`. A mirror holding a different product version is
    /// rejected so that data sets are never mixed.
    pub fn resolve(
        product: Product,
        root: &Path,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> MerraResult<Self> {
        let foreign = Product::ALL
            .iter()
            .filter(|other| **other != product)
            .find_map(|other| other.layout().folder_version_first_last(root).version);
        if let Some(found) = foreign {
            return Err(MerraError::VersionMismatch {
                root: root.display().to_string(),
                found,
                expected: product.version().to_string(),
            });
        }

        let extent = product.layout().folder_version_first_last(root);

        let start = start
            .or(extent.last)
            .unwrap_or_else(|| product.first_available());
        let end = end.unwrap_or(today);

        Ok(Self {
            product,
            start,
            end,
        })
    }

    /// Remote directories to mirror, one per dated directory, in date order.
    pub fn targets(&self, local_root: &Path) -> Vec<DownloadTarget> {
        let layout = self.product.layout();
        let cadence = match self.product {
            Product::HourlyLand => Cadence::Daily,
            Product::MonthlyLand => Cadence::Monthly,
        };
        let to_utc = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        let (Some(start), Some(end)) = (to_utc(self.start), to_utc(self.end)) else {
            return Vec::new();
        };

        let mut targets: BTreeMap<String, DownloadTarget> = BTreeMap::new();
        for date in ImageSequence::new(start, end, cadence).map(|t| t.date_naive()) {
            let url = layout.url_for(date);
            targets
                .entry(url.clone())
                .and_modify(|t| t.last = date)
                .or_insert_with(|| DownloadTarget {
                    url,
                    local_dir: layout.local_dir(local_root, date),
                    first: date,
                    last: date,
                });
        }

        let mut targets: Vec<DownloadTarget> = targets.into_values().collect();
        targets.sort_by_key(|t| t.first);
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_url_for_hourly() {
        let layout = Product::HourlyLand.layout();
        assert_eq!(
            layout.url_for(date(2018, 10, 1)),
            "https://goldsmr4.gesdisc.eosdis.nasa.gov/data/MERRA2/M2T1NXLND.5.12.4/2018/10/"
        );
    }

    #[test]
    fn test_file_template_parse() {
        let layout = Product::HourlyLand.layout();
        assert_eq!(
            layout.file.parse("MERRA2_400.tavg1_2d_lnd_Nx.20181001.nc4"),
            Some(date(2018, 10, 1))
        );
        assert_eq!(
            layout.file.glob(date(2018, 10, 1)),
            "MERRA2_*.tavg1_2d_lnd_Nx.20181001.nc4"
        );
        assert!(!layout.file.matches("MERRA2_.tavg1_2d_lnd_Nx.20181001.nc4"));
        assert!(!layout.file.matches("MERRA2_400.tavg1_2d_lnd_Nx.20181001.nc4.xml"));
        assert!(!layout.file.matches("MERRA2_400.tavgM_2d_lnd_Nx.201810.nc4"));

        let monthly = Product::MonthlyLand.layout();
        assert_eq!(
            monthly.file.parse("MERRA2_400.tavgM_2d_lnd_Nx.201810.nc4"),
            Some(date(2018, 10, 1))
        );
    }

    #[test]
    fn test_dir_template_matches() {
        assert!(DirTemplate::Year.matches("2018"));
        assert!(!DirTemplate::Year.matches("18"));
        assert!(DirTemplate::Month.matches("09"));
        assert!(!DirTemplate::Month.matches("13"));
        assert!(!DirTemplate::Month.matches("9"));
    }

    #[test]
    fn test_last_formatted_dir_skips_files_and_noise() {
        let tmp = TempDir::new().unwrap();
        for name in ["2016", "2018", "notes", "2017"] {
            fs::create_dir(tmp.path().join(name)).unwrap();
        }
        touch(&tmp.path().join("2019"));

        assert_eq!(
            last_formatted_dir_in_dir(tmp.path(), DirTemplate::Year).as_deref(),
            Some("2018")
        );
        assert_eq!(
            first_formatted_dir_in_dir(tmp.path(), DirTemplate::Year).as_deref(),
            Some("2016")
        );
    }

    #[test]
    fn test_scan_empty_folder_yields_none() {
        let tmp = TempDir::new().unwrap();
        let layout = Product::HourlyLand.layout();
        assert_eq!(layout.first_folder(tmp.path()), None);
        assert_eq!(layout.last_folder(tmp.path()), None);
        assert_eq!(layout.folder_version_first_last(tmp.path()), ArchiveExtent::default());
    }

    #[test]
    fn test_scan_missing_folder_yields_none() {
        let layout = Product::HourlyLand.layout();
        let extent = layout.folder_version_first_last(Path::new("/nonexistent/merra/root"));
        assert_eq!(extent, ArchiveExtent::default());
    }

    #[test]
    fn test_folder_version_first_last() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("2017/12/MERRA2_400.tavg1_2d_lnd_Nx.20171230.nc4"));
        touch(&root.join("2017/12/MERRA2_400.tavg1_2d_lnd_Nx.20171231.nc4"));
        touch(&root.join("2018/01/MERRA2_400.tavg1_2d_lnd_Nx.20180101.nc4"));
        touch(&root.join("2018/02/MERRA2_400.tavg1_2d_lnd_Nx.20180201.nc4"));
        touch(&root.join("2018/02/MERRA2_400.tavg1_2d_lnd_Nx.20180202.nc4"));
        touch(&root.join("2018/02/MERRA2_400.tavg1_2d_lnd_Nx.20180202.nc4.xml"));

        let layout = Product::HourlyLand.layout();
        assert_eq!(layout.first_folder(root), Some(root.join("2017").join("12")));
        assert_eq!(layout.last_folder(root), Some(root.join("2018").join("02")));

        let extent = layout.folder_version_first_last(root);
        assert_eq!(extent.version.as_deref(), Some("M2T1NXLND.5.12.4"));
        assert_eq!(extent.first, Some(date(2017, 12, 30)));
        assert_eq!(extent.last, Some(date(2018, 2, 2)));
    }

    #[test]
    fn test_find_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2018/10/MERRA2_400.tavg1_2d_lnd_Nx.20181001.nc4");
        touch(&path);

        let layout = Product::HourlyLand.layout();
        assert_eq!(layout.find_file(tmp.path(), date(2018, 10, 1)), Some(path));
        assert_eq!(layout.find_file(tmp.path(), date(2018, 10, 2)), None);
    }

    #[test]
    fn test_download_plan_continues_from_last() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("2018/10/MERRA2_400.tavg1_2d_lnd_Nx.20181030.nc4"));

        let plan = DownloadPlan::resolve(
            Product::HourlyLand,
            tmp.path(),
            None,
            None,
            date(2018, 11, 2),
        )
        .unwrap();
        assert_eq!(plan.start, date(2018, 10, 30));
        assert_eq!(plan.end, date(2018, 11, 2));

        let targets = plan.targets(tmp.path());
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].local_dir, tmp.path().join("2018").join("10"));
        assert_eq!((targets[0].first, targets[0].last), (date(2018, 10, 30), date(2018, 10, 31)));
        assert_eq!((targets[1].first, targets[1].last), (date(2018, 11, 1), date(2018, 11, 2)));
    }

    #[test]
    fn test_download_plan_empty_mirror_starts_at_product_start() {
        let tmp = TempDir::new().unwrap();
        let plan =
            DownloadPlan::resolve(Product::HourlyLand, tmp.path(), None, None, date(2018, 1, 1))
                .unwrap();
        assert_eq!(plan.start, date(1980, 1, 1));
    }

    #[test]
    fn test_download_plan_rejects_other_product() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("2018/MERRA2_400.tavgM_2d_lnd_Nx.201810.nc4"));

        let result =
            DownloadPlan::resolve(Product::HourlyLand, tmp.path(), None, None, date(2018, 11, 2));
        assert!(matches!(result, Err(MerraError::VersionMismatch { .. })));
    }

    #[test]
    fn test_time_index() {
        let ts = Utc.with_ymd_and_hms(2018, 10, 1, 18, 30, 0).unwrap();
        assert_eq!(Product::HourlyLand.time_index(ts), 18);
        assert_eq!(Product::MonthlyLand.time_index(ts), 0);
    }

    #[test]
    fn test_supported_cadences() {
        for product in Product::ALL {
            assert!(product.supports(product.default_cadence()));
            assert_eq!(Product::for_cadence(product.default_cadence()), product);
        }
        assert!(Product::HourlyLand.supports(Cadence::Daily));
        assert!(!Product::HourlyLand.supports(Cadence::Monthly));
        assert!(!Product::MonthlyLand.supports(Cadence::SixHourly));
    }
}
