//! Page-loop integration tests with a scripted model.
//!
//! Rendering is bypassed via `Extractor::extract_images`, so these run
//! without pdfium or network access.

mod common;

use challan_reader::prompts::FIELD_NAMES;
use challan_reader::{
    ExtractionConfig, ExtractionProgressCallback, Extractor, ModelError, PageDisposition,
    PageError, PromptPair,
};
use common::{pages, ScriptedModel};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn extractor(model: Arc<ScriptedModel>) -> Extractor {
    Extractor::with_model(ExtractionConfig::default(), model)
}

#[tokio::test]
async fn single_page_yields_exact_record() {
    let reply = "Here is the result:\n\
        [{\"Date of Pullback\":\"\",\"Date of Invoice\":\"01/01/2024\",\"Date of Delivery\":\"\",\
        \"Invoice No. Challan No.\":\"INV-100\",\"SC No.\":\"\",\"LR No.\":\"\",\"Equipment Name\":\"\",\
        \"Serial No. of main unit\":\"\",\"Qty of Units\":\"\",\"Qty of Probes\":\"\",\"Pick up address\":\"\",\
        \"Status\":\"\",\"Delivery Location\":\"\",\"Serial No. of Probes\":\"\",\"Serial Nos.\":\"\"}]\nDone.";
    let model = Arc::new(ScriptedModel::replying(&[reply]));
    let output = extractor(Arc::clone(&model)).extract_images(pages(1)).await;

    assert_eq!(model.calls(), 1);
    assert_eq!(output.records.len(), 1);
    let rec = output.records[0].as_object().unwrap();
    assert_eq!(rec.len(), FIELD_NAMES.len());
    for field in FIELD_NAMES {
        let expected = match field {
            "Date of Invoice" => "01/01/2024",
            "Invoice No. Challan No." => "INV-100",
            _ => "",
        };
        assert_eq!(rec[field], expected, "field {field:?}");
    }
    assert_eq!(output.stats.extracted_pages, 1);
    assert_eq!(output.stats.total_records, 1);
}

#[tokio::test]
async fn failed_page_is_skipped_and_later_pages_processed() {
    let model = Arc::new(ScriptedModel::new([
        Err(ModelError::Api {
            status: 503,
            message: "The model is overloaded".into(),
        }),
        Ok(r#"[{"SC No.": "B-2"}]"#.to_string()),
    ]));
    let output = extractor(Arc::clone(&model)).extract_images(pages(2)).await;

    assert_eq!(model.calls(), 2);
    assert_eq!(output.records, vec![json!({"SC No.": "B-2"})]);
    assert_eq!(output.stats.failed_pages, 1);
    assert_eq!(output.stats.extracted_pages, 1);
    match &output.pages[0].disposition {
        PageDisposition::ModelFailed {
            error: PageError::ModelFailed { page, detail },
        } => {
            assert_eq!(*page, 1);
            assert!(detail.contains("503"), "got: {detail}");
        }
        other => panic!("unexpected disposition: {other:?}"),
    }
}

#[tokio::test]
async fn prose_reply_yields_no_records() {
    let model = Arc::new(ScriptedModel::replying(&["I could not find a challan on this page."]));
    let output = extractor(model).extract_images(pages(1)).await;

    assert!(output.records.is_empty());
    assert_eq!(output.stats.unparsed_pages, 1);
    assert_eq!(output.pages[0].disposition, PageDisposition::NoJson);
}

#[tokio::test]
async fn blocked_page_is_reported_as_blocked() {
    let model = Arc::new(ScriptedModel::new([Err(ModelError::Blocked {
        reason: "candidate blocked: SAFETY".into(),
    })]));
    let output = extractor(model).extract_images(pages(1)).await;

    assert!(output.records.is_empty());
    assert!(matches!(
        output.pages[0].disposition,
        PageDisposition::ModelFailed {
            error: PageError::Blocked { page: 1, .. }
        }
    ));
}

#[tokio::test]
async fn records_keep_page_then_array_order() {
    let model = Arc::new(ScriptedModel::replying(&[
        r#"[{"n": 1}, {"n": 2}]"#,
        "",
        r#"Here you go: [{"n": 3}]"#,
    ]));
    let output = extractor(model).extract_images(pages(3)).await;

    let ns: Vec<_> = output.records.iter().map(|r| r["n"].clone()).collect();
    assert_eq!(ns, vec![json!(1), json!(2), json!(3)]);
    assert_eq!(output.pages[1].disposition, PageDisposition::EmptyReply);
    assert_eq!(output.stats.processed_pages, 3);
}

#[tokio::test]
async fn record_count_is_sum_of_page_arrays() {
    let replies = [r#"[{"a":1},{"a":2},{"a":3}]"#, "[]", "no json", r#"[{"a":4}]"#];
    let model = Arc::new(ScriptedModel::replying(&replies));
    let output = extractor(model).extract_images(pages(replies.len())).await;

    let per_page: usize = output
        .pages
        .iter()
        .map(|p| match p.disposition {
            PageDisposition::Extracted { records } => records,
            _ => 0,
        })
        .sum();
    assert_eq!(output.records.len(), per_page);
    assert_eq!(output.records.len(), 4);
}

#[tokio::test]
async fn one_call_per_page_in_order_with_both_prompts() {
    let prompts = PromptPair {
        system: "sys".into(),
        user: "fields".into(),
    };
    let config = ExtractionConfig::builder().prompts(prompts).build().unwrap();
    let model = Arc::new(ScriptedModel::replying(&["[]", "[]", "[]"]));
    Extractor::with_model(config, model.clone())
        .extract_images(pages(3))
        .await;

    let seen = model.seen();
    assert_eq!(
        seen,
        (1..=3)
            .map(|p| ("sys".to_string(), p, "fields".to_string()))
            .collect::<Vec<_>>()
    );
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl ExtractionProgressCallback for EventLog {
    fn on_extraction_start(&self, total: usize) {
        self.0.lock().unwrap().push(format!("start {total}"));
    }
    fn on_page_start(&self, page: usize, _total: usize) {
        self.0.lock().unwrap().push(format!("page {page}"));
    }
    fn on_page_complete(&self, page: usize, _total: usize, reply_len: usize) {
        self.0.lock().unwrap().push(format!("ok {page} {reply_len}"));
    }
    fn on_page_error(&self, page: usize, _total: usize, _error: &str) {
        self.0.lock().unwrap().push(format!("err {page}"));
    }
    fn on_extraction_complete(&self, total: usize, replied: usize) {
        self.0.lock().unwrap().push(format!("done {replied}/{total}"));
    }
}

#[tokio::test]
async fn progress_events_follow_page_order() {
    let log = Arc::new(EventLog::default());
    let config = ExtractionConfig::builder()
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let model = Arc::new(ScriptedModel::new([
        Ok("[]".to_string()),
        Err(ModelError::Other("boom".into())),
    ]));
    Extractor::with_model(config, model)
        .extract_images(pages(2))
        .await;

    assert_eq!(
        *log.0.lock().unwrap(),
        ["start 2", "page 1", "ok 1 2", "page 2", "err 2", "done 1/2"]
    );
}

#[tokio::test]
async fn missing_file_fails_before_any_model_call() {
    let model = Arc::new(ScriptedModel::replying(&[]));
    let err = extractor(Arc::clone(&model))
        .extract("/definitely/not/here.pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, challan_reader::ChallanError::FileNotFound { .. }));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn non_pdf_bytes_are_rejected() {
    let model = Arc::new(ScriptedModel::replying(&[]));
    let err = extractor(Arc::clone(&model))
        .extract_bytes(b"hello, not a pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, challan_reader::ChallanError::NotAPdf { .. }));
    assert_eq!(model.calls(), 0);
}

#[test]
fn missing_key_fails_each_page_not_the_document() {
    let config = ExtractionConfig::builder().build().unwrap();
    assert!(config.api_key.is_none());
    // Construction succeeds; the key is only required per request.
    assert!(Extractor::new(config).is_ok());
}
