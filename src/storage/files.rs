//! Receipt files on disk: input scanning, receipt ids, and moves into
//! `processed/` and `error/`.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::receipt::parser::parse_date;
use crate::receipt::ReceiptResult;

/// Extensions accepted from `input/`, compared case-insensitively
pub const RECEIPT_IMAGE_EXTS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "tif", "tiff", "pdf", "heic", "heif",
];

fn invalid_filename_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[\\/:*?"<>|]+"#).expect("valid file name pattern"))
}

fn lower_ext(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

pub fn is_receipt_image(path: &Path) -> bool {
    RECEIPT_IMAGE_EXTS.contains(&lower_ext(path).as_str())
}

/// Collect receipt images from `input_dir`, sorted by name. Files with any
/// other extension are moved to `error_dir`.
pub fn scan_input(input_dir: &Path, error_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(input_dir)?;
    std::fs::create_dir_all(error_dir)?;

    let mut images = Vec::new();
    for entry in std::fs::read_dir(input_dir)
        .with_context(|| format!("Failed to read input directory: {}", input_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        if !is_receipt_image(&path) {
            tracing::error!("Unsupported file type, moving to error: {}", path.display());
            move_to_error(&path, error_dir)?;
            continue;
        }

        images.push(path);
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

/// Build `YYYYMMDD_HHMMSS_<merchant>` for a parsed receipt.
///
/// `source` is the image on disk, used for its modification time when the
/// receipt carries no readable date.
pub fn build_receipt_id(result: &ReceiptResult, source: Option<&Path>) -> String {
    let summary = &result.summary;

    let date = NaiveDate::parse_from_str(summary.date_iso.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date(&summary.date))
        .or_else(|| source.and_then(file_modified_date))
        .unwrap_or_else(|| {
            tracing::debug!("Using current date for receipt id");
            Local::now().date_naive()
        });

    let time_norm = summary.time_norm.trim();
    let hhmmss = if !time_norm.is_empty() {
        time_norm.replace(':', "")
    } else {
        raw_time_digits(&summary.time).unwrap_or_else(|| "000000".to_string())
    };

    let merchant = match summary.merchant_name.trim() {
        "" => "UNKNOWN",
        name => name,
    };
    let merchant = invalid_filename_chars().replace_all(merchant, "_");

    format!("{}_{}_{}", date.format("%Y%m%d"), hhmmss, merchant)
}

fn raw_time_digits(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() < 2 {
        return None;
    }
    let ss = parts.get(2).copied().unwrap_or("00");
    Some(format!("{:0>2}{:0>2}{:0>2}", parts[0], parts[1], ss))
}

fn file_modified_date(path: &Path) -> Option<NaiveDate> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let date = DateTime::<Local>::from(modified).date_naive();
    tracing::debug!("Using file mtime for receipt id: {} -> {}", path.display(), date);
    Some(date)
}

/// Year directory for a receipt id, `unknown` when it has no date prefix.
pub fn year_of_receipt_id(receipt_id: &str) -> &str {
    match receipt_id.get(..4) {
        Some(year) if year.chars().all(|c| c.is_ascii_digit()) => year,
        _ => "unknown",
    }
}

/// First free path among `<stem><ext>`, `<stem>_1<ext>`, `<stem>_2<ext>`, ...
pub fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let with_ext = |name: String| {
        if ext.is_empty() {
            dir.join(name)
        } else {
            dir.join(format!("{}.{}", name, ext))
        }
    };

    let first = with_ext(stem.to_string());
    if !first.exists() {
        return first;
    }

    (1..)
        .map(|index| with_ext(format!("{}_{}", stem, index)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// Rename, falling back to copy and delete across file systems.
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    std::fs::remove_file(src)
        .with_context(|| format!("Failed to remove {}", src.display()))?;
    Ok(())
}

/// Move a recorded receipt to `processed/<YYYY>/<receipt_id><ext>`.
/// Returns `None` when the source no longer exists.
pub fn move_to_processed(
    src: &Path,
    receipt_id: &str,
    processed_dir: &Path,
) -> Result<Option<PathBuf>> {
    if !src.exists() {
        tracing::error!("Source not found, skipping move to processed: {}", src.display());
        return Ok(None);
    }

    let year_dir = processed_dir.join(year_of_receipt_id(receipt_id));
    std::fs::create_dir_all(&year_dir)?;

    let dst = unique_path(&year_dir, receipt_id, &lower_ext(src));
    move_file(src, &dst)?;
    Ok(Some(dst))
}

/// Move a rejected file into `error_dir`, keeping its name.
/// Returns `None` when the source no longer exists.
pub fn move_to_error(src: &Path, error_dir: &Path) -> Result<Option<PathBuf>> {
    if !src.exists() {
        tracing::error!("Source not found, skipping move to error: {}", src.display());
        return Ok(None);
    }

    std::fs::create_dir_all(error_dir)?;

    let stem = src.file_stem().and_then(|s| s.to_str()).unwrap_or("receipt");
    let ext = src.extension().and_then(|e| e.to_str()).unwrap_or("");
    let dst = unique_path(error_dir, stem, ext);
    move_file(src, &dst)?;
    Ok(Some(dst))
}

/// A cloud inbox file copied into `input/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudImport {
    pub local: PathBuf,
    pub origin: PathBuf,
}

/// Copy every file in `inbox` into `input_dir`. A file that cannot be
/// copied is moved to `cloud_error` instead.
pub fn import_cloud_inbox(
    inbox: &Path,
    cloud_error: &Path,
    input_dir: &Path,
) -> Result<Vec<CloudImport>> {
    std::fs::create_dir_all(input_dir)?;

    let mut imports = Vec::new();
    for entry in std::fs::read_dir(inbox)
        .with_context(|| format!("Failed to read cloud inbox: {}", inbox.display()))?
    {
        let origin = entry?.path();
        if !origin.is_file() {
            continue;
        }
        let Some(name) = origin.file_name() else {
            continue;
        };
        let local = input_dir.join(name);

        match std::fs::copy(&origin, &local) {
            Ok(_) => {
                tracing::debug!("Imported from cloud: {}", origin.display());
                imports.push(CloudImport { local, origin });
            }
            Err(e) => {
                tracing::error!("Cloud copy failed: {} ({})", origin.display(), e);
                if let Err(e) = settle_cloud_origin(&origin, cloud_error) {
                    tracing::warn!("Could not move cloud file to error: {:#}", e);
                }
            }
        }
    }

    Ok(imports)
}

/// Move a cloud origin file into `target_dir`, replacing a file of the
/// same name.
pub fn settle_cloud_origin(origin: &Path, target_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(target_dir)?;
    let name = origin
        .file_name()
        .with_context(|| format!("Cloud file has no name: {}", origin.display()))?;
    let dst = target_dir.join(name);
    move_file(origin, &dst)?;
    Ok(dst)
}
