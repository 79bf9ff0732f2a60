use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use bstr::ByteSlice;
use bstr::io::BufReadExt;
use chrono::{DateTime, Local};
use rustc_hash::FxHashSet;
use log::{debug, info};

use crate::lib::classify::{FilterCategory, FilterMasks};
use crate::lib::common::{open_reads, VersionInfo};
use crate::lib::error::{FilterError, Result};

/// how many lines were written and how many were dropped
#[derive(Debug,Clone,Copy,Default,PartialEq,Eq)]
pub struct ApplyStats {
    pub kept: u64,
    pub removed: u64,
}

/// the read id is everything in front of the first tab,
/// lines without a tab are taken as a whole
fn read_id(line: &[u8]) -> &[u8] {
    match line.find_byte(b'\t') {
        Some(i) => &line[..i],
        None => line.trim_end_with(|c| c == '\n' || c == '\r'),
    }
}

fn is_masked(line: &[u8], masked: &FxHashSet<&str>) -> bool {
    match read_id(line).to_str() {
        Ok(id) => masked.contains(id),
        // ids in the masks are always valid UTF-8
        Err(_) => false,
    }
}

/// this function streams the original read-pair file and writes
/// every line whose read id is not flagged by one of the chosen
/// categories (None meaning all of them).
/// Lines are written unchanged, including their line terminator,
/// and in the original order. Coordinates are not parsed again.
///
/// Unittest: TRUE
///
pub fn apply_filter<W: Write>(
    path: &Path,
    out: W,
    masks: &FilterMasks,
    categories: Option<&[FilterCategory]>
) -> Result<ApplyStats> {
    filter_lines(path, out, Path::new("<output>"), masks, categories)
}

/// the output path is only used to report write errors
fn filter_lines<W: Write>(
    path: &Path,
    out: W,
    out_path: &Path,
    masks: &FilterMasks,
    categories: Option<&[FilterCategory]>
) -> Result<ApplyStats> {
    let masked = masks.masked_reads(categories);
    debug!("Removing reads flagged by {:?}, {} unique ids", categories, masked.len());
    let mut reader = open_reads(path)?;
    let mut writer = BufWriter::new(out);
    let mut stats = ApplyStats::default();
    // write errors are kept apart so they are not reported against the input
    let mut write_error: Option<io::Error> = None;
    reader
        .for_byte_line_with_terminator(|line| {
            if is_masked(line, &masked) {
                stats.removed += 1;
            } else if let Err(e) = writer.write_all(line) {
                write_error = Some(e);
                return Ok(false);
            } else {
                stats.kept += 1;
            }
            Ok(true)
        })
        .map_err(|e| FilterError::io(e, path))?;
    if let Some(e) = write_error {
        return Err(FilterError::io(e, out_path));
    }
    writer.flush().map_err(|e| FilterError::io(e, out_path))?;
    info!("Kept {} lines, removed {} lines", stats.kept, stats.removed);
    Ok(stats)
}

/// same as `apply_filter` but writes directly into a new file
pub fn apply_filter_to_file(
    path: &Path,
    out_path: &Path,
    masks: &FilterMasks,
    categories: Option<&[FilterCategory]>
) -> Result<ApplyStats> {
    let out = File::create(out_path).map_err(|e| FilterError::io(e, out_path))?;
    filter_lines(path, out, out_path, masks, categories)
}

/// this function writes the flagged read ids in a tab-separated
/// format: category id, category name and read id, one read per line.
/// It adds additionally a header with meta information
/// to identify more easily later the context.
/// Categories are written in id order, reads in the order they were flagged.
///
/// Unittest: TRUE
///
pub fn write_masks<W: Write>(
    masks: &FilterMasks,
    out: W,
    infos: &VersionInfo
) -> Result<()> {
    let now: DateTime<Local> = Local::now();
    let date = now.to_rfc2822();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(out);
    writer.write_record(["##", "program:", infos.program])?;
    writer.write_record(["##", "version:", infos.version])?;
    writer.write_record(["##", "author:", infos.author])?;
    writer.write_record(["##", "date:", date.as_str()])?;
    writer.write_record(["##", "command:", infos.command])?;
    writer.write_record(["#category_id", "category_name", "read_id"])?;
    for (category, reads) in masks.iter() {
        let id = category.id().to_string();
        for read in reads {
            writer.write_record([id.as_str(), category.name(), read.as_str()])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// reads a table written by `write_masks` back into masks.
/// Comment lines are skipped, the category name has to match
/// the category id.
///
/// Unittest: TRUE
///
pub fn read_masks(path: &Path) -> Result<FilterMasks> {
    let input = File::open(path).map_err(|e| FilterError::io(e, path))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(input);
    let mut masks = FilterMasks::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        if record.len() < 3 {
            return Err(FilterError::parse(line, "mask entries need category id, name and read id"));
        }
        let category = record[0]
            .parse::<u8>()
            .ok()
            .and_then(FilterCategory::from_id)
            .ok_or_else(|| FilterError::parse(line, format!("unknown filter category {:?}", &record[0])))?;
        if &record[1] != category.name() {
            return Err(FilterError::parse(line, format!(
                "category {} is {:?}, not {:?}", category.id(), category.name(), &record[1]
            )));
        }
        masks.insert(category, &record[2]);
    }
    debug!("Read {} masked reads from {:?}", masks.masked_reads(None).len(), path);
    Ok(masks)
}
