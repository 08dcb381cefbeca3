//! Horizontal bar charts of spending per category
//!
//! One PNG per ledger month (`output/graph/<YYYY>/<YYYYMM>_graph.png`) and
//! one per year (`<YYYY>_annual_graph.png`), bars sorted by amount.

use anyhow::{Context, Result};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::GraphSettings;
use crate::schema::ReceiptTag;
use crate::storage::{CategoryTotals, Ledger, YearMonth};

const FONT_FAMILY: &str = "kakeibo-label";

const WIDTH: u32 = 1000;
const MIN_HEIGHT: u32 = 400;
const TOP: i32 = 70;
const BOTTOM: i32 = 60;
const ROW_HEIGHT: i32 = 50;
const LABEL_WIDTH: i32 = 180;
const VALUE_WIDTH: i32 = 170;

const FALLBACK_COLOR: RGBColor = RGBColor(0xBD, 0xBD, 0xBD);

/// Fonts with Japanese glyphs tried when `graph.font_path` is unset
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/fonts-japanese-gothic.ttf",
    "/System/Library/Fonts/ヒラギノ角ゴシック W3.ttc",
    "/Library/Fonts/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\meiryo.ttc",
    "C:\\Windows\\Fonts\\msgothic.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
];

/// Bar colour for a ledger label
pub fn category_color(label: &str) -> RGBColor {
    match ReceiptTag::from_ledger_label(label) {
        Some(ReceiptTag::Food) => RGBColor(0x4C, 0xAF, 0x50),
        Some(ReceiptTag::EatingOut) => RGBColor(0xFF, 0x98, 0x00),
        Some(ReceiptTag::DailyNecessities) => RGBColor(0x21, 0x96, 0xF3),
        Some(ReceiptTag::Transportation) => RGBColor(0x9C, 0x27, 0xB0),
        Some(ReceiptTag::Medical) => RGBColor(0xF4, 0x43, 0x36),
        Some(ReceiptTag::Entertainment) => RGBColor(0x00, 0xBC, 0xD4),
        Some(ReceiptTag::Clothing) => RGBColor(0xE9, 0x1E, 0x63),
        Some(ReceiptTag::Housing) => RGBColor(0x79, 0x55, 0x48),
        Some(ReceiptTag::Utilities) => RGBColor(0x60, 0x7D, 0x8B),
        Some(ReceiptTag::Communication) => RGBColor(0x3F, 0x51, 0xB5),
        Some(ReceiptTag::Education) => RGBColor(0x8B, 0xC3, 0x4A),
        Some(ReceiptTag::Work) => RGBColor(0xFF, 0xC1, 0x07),
        Some(ReceiptTag::Other) => RGBColor(0x9E, 0x9E, 0x9E),
        Some(ReceiptTag::Unknown) | None => FALLBACK_COLOR,
    }
}

/// Writes the monthly and annual charts for a ledger
pub struct ChartWriter {
    labels: bool,
}

impl ChartWriter {
    /// Load the label font. Charts are still drawn, without text, when no
    /// font can be loaded.
    pub fn new(settings: &GraphSettings) -> Self {
        Self {
            labels: load_label_font(settings.font_path.as_deref()),
        }
    }

    /// Bars only, no text
    pub fn without_labels() -> Self {
        Self { labels: false }
    }

    /// Chart one month. Months without spending get no chart.
    pub fn monthly(&self, ledger: &Ledger, month: YearMonth) -> Result<Option<PathBuf>> {
        let totals = ledger.month_totals(month)?;
        if totals.is_empty() {
            tracing::info!("No spending to chart for {}", month);
            return Ok(None);
        }

        let path = ledger.monthly_graph_path(month);
        let title = format!("{}年{}月 カテゴリー別支出", month.year, month.month);
        render_bar_chart(&path, &title, &totals, self.labels)?;

        tracing::info!("Monthly graph saved: {}", path.display());
        Ok(Some(path))
    }

    /// Chart the sum of every ledger month in `year`
    pub fn annual(&self, ledger: &Ledger, year: i32) -> Result<Option<PathBuf>> {
        let totals = ledger.year_totals(year)?;
        if totals.is_empty() {
            tracing::info!("No spending to chart for {}", year);
            return Ok(None);
        }

        let path = ledger.annual_graph_path(year);
        let title = format!("{}年 年間カテゴリー別支出", year);
        render_bar_chart(&path, &title, &totals, self.labels)?;

        tracing::info!("Annual graph saved: {}", path.display());
        Ok(Some(path))
    }
}

/// Register the first usable font once per process
fn load_label_font(configured: Option<&Path>) -> bool {
    static LOADED: OnceLock<bool> = OnceLock::new();
    *LOADED.get_or_init(|| register_label_font(configured))
}

fn register_label_font(configured: Option<&Path>) -> bool {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(FONT_CANDIDATES.iter().map(PathBuf::from));

    for path in candidates {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        // plotters keeps registered fonts for the life of the process
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        match plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
            Ok(()) => {
                tracing::debug!("Chart font: {}", path.display());
                return true;
            }
            Err(_) => tracing::warn!("Unusable chart font: {}", path.display()),
        }
    }

    tracing::warn!("No chart font found, charts are drawn without labels");
    false
}

/// Bars in drawing order: largest amount first, ties by label
pub fn sorted_bars(totals: &CategoryTotals) -> Vec<(&str, i64)> {
    let mut bars: Vec<(&str, i64)> = totals.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    bars.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    bars
}

/// `12345` as `12,345`
pub fn group_thousands(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn draw_error<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow::anyhow!("Failed to draw chart: {}", e)
}

fn label_style(size: f64) -> TextStyle<'static> {
    FontDesc::new(FontFamily::Name(FONT_FAMILY), size, FontStyle::Normal).color(&BLACK)
}

/// Draw a horizontal bar chart to `path` (PNG by extension)
pub fn render_bar_chart(path: &Path, title: &str, totals: &CategoryTotals, labels: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create graph directory: {}", parent.display()))?;
    }

    let bars = sorted_bars(totals);
    let height = ((TOP + BOTTOM + ROW_HEIGHT * bars.len() as i32) as u32).max(MIN_HEIGHT);
    let max_amount = bars.iter().map(|(_, v)| *v).max().unwrap_or(0).max(1);
    let plot_width = WIDTH as i32 - LABEL_WIDTH - VALUE_WIDTH;

    let root = BitMapBackend::new(path, (WIDTH, height)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_error)?;

    if labels {
        root.draw(&Text::new(title.to_string(), (20, 20), label_style(26.0)))
            .map_err(draw_error)?;
    }

    for (idx, (label, amount)) in bars.iter().enumerate() {
        let top = TOP + idx as i32 * ROW_HEIGHT;
        let len = ((*amount).max(0) as f64 / max_amount as f64 * plot_width as f64).round() as i32;
        let right = LABEL_WIDTH + len.max(1);

        root.draw(&Rectangle::new(
            [(LABEL_WIDTH, top + 8), (right, top + ROW_HEIGHT - 8)],
            category_color(label).filled(),
        ))
        .map_err(draw_error)?;

        if labels {
            root.draw(&Text::new(label.to_string(), (20, top + 14), label_style(18.0)))
                .map_err(draw_error)?;
            root.draw(&Text::new(
                format!("{}円", group_thousands(*amount)),
                (right + 8, top + 14),
                label_style(18.0),
            ))
            .map_err(draw_error)?;
        }
    }

    if labels {
        root.draw(&Text::new(
            "支出金額（円）".to_string(),
            (LABEL_WIDTH + plot_width / 2 - 60, height as i32 - BOTTOM + 20),
            label_style(18.0),
        ))
        .map_err(draw_error)?;
    }

    root.present()
        .map_err(draw_error)
        .with_context(|| format!("Failed to write graph: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn totals(entries: &[(&str, i64)]) -> CategoryTotals {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn colors_follow_the_ledger_label() {
        let RGBColor(r, g, b) = category_color("食費");
        assert_eq!((r, g, b), (0x4C, 0xAF, 0x50));
        let RGBColor(r, g, b) = category_color("公共料金");
        assert_eq!((r, g, b), (0x60, 0x7D, 0x8B));
        let RGBColor(r, g, b) = category_color("ペット");
        assert_eq!((r, g, b), (0xBD, 0xBD, 0xBD));
    }

    #[test]
    fn bars_sort_by_amount_then_label() {
        let t = totals(&[("外食", 500), ("食費", 1200), ("医療", 500), ("衣類", 80)]);
        let order: Vec<&str> = sorted_bars(&t).into_iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["食費", "医療", "外食", "衣類"]);
    }

    #[test]
    fn thousands_are_grouped() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(594), "594");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(-4500), "-4,500");
    }

    #[test]
    fn renders_png_without_labels() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("2026").join("202601_graph.png");

        render_bar_chart(&path, "2026年1月", &totals(&[("食費", 594), ("外食", 0)]), false)?;

        let bytes = std::fs::read(&path)?;
        assert!(bytes.starts_with(PNG_MAGIC));
        Ok(())
    }
}
