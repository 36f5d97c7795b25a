// ==========================================
// 排课核心 - 时间段 CSV 解析
// ==========================================
// 列: day_of_week,start_time,end_time（表头大小写不敏感，列顺序任意）
// 星期接受 MONDAY / Mon / 1 / 周一
// 时间接受 HH:MM 或 HH:MM:SS
// ==========================================

use crate::domain::time_interval::parse_clock_time;
use crate::domain::types::Weekday;
use crate::importer::error::{ImportError, ImportResult};
use chrono::NaiveTime;
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const COL_DAY: &str = "day_of_week";
const COL_START: &str = "start_time";
const COL_END: &str = "end_time";

/// 解析成功的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalRow {
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// 带行号的解析结果（行号从 1 开始，表头为第 1 行）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub line: usize,
    pub row: Result<IntervalRow, String>,
}

pub struct TimeIntervalCsvParser;

impl TimeIntervalCsvParser {
    /// 从文件解析
    pub fn parse_file(path: &Path) -> ImportResult<Vec<ParsedLine>> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        if let Some(ext) = path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }
        let file = File::open(path)?;
        Self::parse_reader(file)
    }

    /// 从任意 reader 解析
    pub fn parse_reader<R: Read>(reader: R) -> ImportResult<Vec<ParsedLine>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ImportError::MissingColumn(name.to_string()))
        };
        let day_idx = column(COL_DAY)?;
        let start_idx = column(COL_START)?;
        let end_idx = column(COL_END)?;

        let mut lines = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let line = idx + 2;
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    lines.push(ParsedLine {
                        line,
                        row: Err(e.to_string()),
                    });
                    continue;
                }
            };

            // 跳过完全空白的行
            if record.iter().all(|v| v.is_empty()) {
                continue;
            }

            let field = |i: usize| record.get(i).unwrap_or("");
            lines.push(ParsedLine {
                line,
                row: parse_row(field(day_idx), field(start_idx), field(end_idx)),
            });
        }

        Ok(lines)
    }
}

fn parse_row(day: &str, start: &str, end: &str) -> Result<IntervalRow, String> {
    let day_of_week = Weekday::parse(day).ok_or_else(|| format!("无法识别的星期: '{}'", day))?;
    let start_time =
        parse_clock_time(start).ok_or_else(|| format!("无法识别的开始时间: '{}'", start))?;
    let end_time = parse_clock_time(end).ok_or_else(|| format!("无法识别的结束时间: '{}'", end))?;
    Ok(IntervalRow {
        day_of_week,
        start_time,
        end_time,
    })
}
