//! Aggregation: fold per-page results into one ordered record list.
//!
//! Records keep page order, then in-array order. Nothing is merged or
//! deduplicated across pages, even when two pages describe the same
//! shipment.

use crate::output::{PageDisposition, PageOutcome, PageReport, PageResult, Record};
use crate::pipeline::parse::parse_reply;
use tracing::debug;

/// Records plus a per-page account of how they were obtained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub records: Vec<Record>,
    pub reports: Vec<PageReport>,
}

impl Aggregate {
    pub fn count(&self, pred: impl Fn(&PageDisposition) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.disposition)).count()
    }
}

/// Classify one page and return the records it contributes.
pub fn page_records(result: &PageResult) -> (PageDisposition, Vec<Record>) {
    match &result.outcome {
        PageOutcome::Failed(error) => (
            PageDisposition::ModelFailed {
                error: error.clone(),
            },
            Vec::new(),
        ),
        PageOutcome::Reply(text) if text.is_empty() => (PageDisposition::EmptyReply, Vec::new()),
        PageOutcome::Reply(text) => match parse_reply(text) {
            Some(records) => (
                PageDisposition::Extracted {
                    records: records.len(),
                },
                records,
            ),
            None => {
                debug!("Page {}: no JSON array in reply", result.page_num);
                (PageDisposition::NoJson, Vec::new())
            }
        },
    }
}

/// Fold page results, in the order given, into one record list.
pub fn aggregate(results: &[PageResult]) -> Aggregate {
    results.iter().fold(Aggregate::default(), |mut acc, result| {
        let (disposition, records) = page_records(result);
        acc.records.extend(records);
        acc.reports.push(PageReport {
            page_num: result.page_num,
            disposition,
            duration_ms: result.duration_ms,
        });
        acc
    })
}
