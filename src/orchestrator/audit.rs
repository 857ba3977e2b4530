//! Timestamped audit files written next to the database.
//!
//! Every crawl leaves a machine-readable JSON snapshot and a
//! human-readable text rendition of the same records. The two files
//! share one timestamp so they pair up on disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::models::{LocatedPage, RawCardRecord};

/// Timestamp used in audit file names.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Write the crawl's card records as `credit_cards_<stamp>.json` plus a
/// readable `credit_cards_<stamp>.txt`. Returns both paths.
pub fn write_cards(
    results_dir: &Path,
    records: &[RawCardRecord],
    stamp: &str,
) -> std::io::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(results_dir)?;

    let json_path = results_dir.join(format!("credit_cards_{stamp}.json"));
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&json_path, json)?;

    let txt_path = results_dir.join(format!("credit_cards_{stamp}.txt"));
    let mut txt = std::fs::File::create(&txt_path)?;
    writeln!(txt, "信用卡信息汇总（共{}张）", records.len())?;
    let mut current_bank = "";
    for record in records {
        if record.bank_name != current_bank {
            current_bank = &record.bank_name;
            writeln!(txt, "\n========== {} ==========", current_bank)?;
        }
        writeln!(txt, "\n【卡片名称】{}", record.card_name)?;
        if let Some(card_type) = &record.card_type {
            writeln!(txt, "【卡片类型】{}", card_type)?;
        }
        if let Some(level) = &record.level {
            writeln!(txt, "【卡片等级】{}", level)?;
        }
        if let Some(fee) = &record.annual_fee {
            writeln!(txt, "【年费】{}", fee)?;
        }
        if let Some(points) = &record.points_rule {
            writeln!(txt, "【积分规则】{}", points)?;
        }
        if let Some(limit) = &record.credit_limit {
            writeln!(txt, "【额度】{}", limit)?;
        }
        if !record.benefits.is_empty() {
            writeln!(txt, "【权益】")?;
            for benefit in &record.benefits {
                if benefit.description.is_empty() {
                    writeln!(txt, "  - {}", benefit.title)?;
                } else {
                    writeln!(txt, "  - {}：{}", benefit.title, benefit.description)?;
                }
            }
        }
        if !record.requirements.is_empty() {
            writeln!(txt, "【申请条件】")?;
            for req in &record.requirements {
                if req.content.is_empty() {
                    writeln!(txt, "  - {}", req.title)?;
                } else {
                    writeln!(txt, "  - {}：{}", req.title, req.content)?;
                }
            }
        }
        writeln!(txt, "【来源】{}", record.source)?;
    }

    info!(
        "Audit written: {} and {}",
        json_path.display(),
        txt_path.display()
    );
    Ok((json_path, txt_path))
}

/// Write the located credit-card pages as `located_pages_<stamp>.json`
/// plus a readable `.txt` with one line per bank.
pub fn write_located(
    results_dir: &Path,
    pages: &[LocatedPage],
    stamp: &str,
) -> std::io::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(results_dir)?;

    let json_path = results_dir.join(format!("located_pages_{stamp}.json"));
    let json = serde_json::to_string_pretty(pages)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&json_path, json)?;

    let txt_path = results_dir.join(format!("located_pages_{stamp}.txt"));
    let mut txt = std::fs::File::create(&txt_path)?;
    writeln!(txt, "银行信用卡页面定位结果（共{}家）", pages.len())?;
    for page in pages {
        writeln!(txt, "{}：{}（{}）", page.bank_name, page.url, page.discovery_method)?;
    }

    info!("Located pages written: {}", json_path.display());
    Ok((json_path, txt_path))
}
