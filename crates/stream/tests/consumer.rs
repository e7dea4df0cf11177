mod common;

use common::ScriptedOpener;
use core_types::GenerationRequest;
use std::sync::{Arc, Mutex};
use stream::{
    CancelFlag, ConsumerConfig, GenerationRun, Phase, ResponseMode, StreamConsumer, StreamError,
};
use test_support::{BoundaryPolicy, ChunkPlan, build_chunk_plans};

const DOCUMENT: &str = "<!DOCTYPE html><html><head><title>Café ☕</title></head><body><h1>Grüße 👋</h1></body></html>";

fn request() -> GenerationRequest {
    GenerationRequest::generate("a café landing page")
}

fn collect(consumer: &mut StreamConsumer<ScriptedOpener>) -> Result<Vec<String>, StreamError> {
    consumer.consume(&request(), &CancelFlag::new())?.collect()
}

#[test]
fn byte_splits_never_corrupt_text() {
    for case in build_chunk_plans(DOCUMENT, 12, 0xc0ffee, BoundaryPolicy::ByteStream) {
        let opener = ScriptedOpener::from_plan(DOCUMENT, &case.plan);
        let mut consumer = StreamConsumer::new(opener, ConsumerConfig::default());
        let chunks = collect(&mut consumer).unwrap();
        assert_eq!(chunks.concat(), DOCUMENT, "{}", case.label);
        assert_eq!(consumer.full_text(), DOCUMENT, "{}", case.label);
        assert_eq!(consumer.phase(), Phase::Complete, "{}", case.label);
        assert_eq!(consumer.response_mode(), Some(ResponseMode::FullDocument));
        assert!(!consumer.is_multi_document());
    }
}

#[test]
fn small_read_buffer_still_reads_everything() {
    let config = ConsumerConfig {
        read_buffer_bytes: 3,
    };
    let mut consumer = StreamConsumer::new(ScriptedOpener::whole(DOCUMENT), config);
    let chunks = collect(&mut consumer).unwrap();
    assert!(chunks.len() > 10);
    assert_eq!(consumer.full_text(), DOCUMENT);
}

#[test]
fn progress_reports_each_chunk_and_phase() {
    let text = "<html><head></head><body><p>x</p></body></html>";
    let plan = ChunkPlan::boundaries(vec![19, 25, 33]);
    let opener = ScriptedOpener::from_plan(text, &plan);
    let mut consumer = StreamConsumer::new(opener, ConsumerConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    consumer.on_progress(move |p| {
        sink.lock().unwrap().push((p.chunk.to_string(), p.full_text.len(), p.phase));
    });
    collect(&mut consumer).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("<html><head></head>".to_string(), 19, Phase::Head),
            ("<body>".to_string(), 25, Phase::Body),
            ("<p>x</p>".to_string(), 33, Phase::Body),
            ("</body></html>".to_string(), 47, Phase::Complete),
        ]
    );
}

#[test]
fn multi_document_response_is_split() {
    let text = "<!-- FILE: index.html -->\n<html><body>home</body></html>\n<!-- FILE: about.html -->\n<html><body>about</body></html>\n";
    let mut consumer = StreamConsumer::new(
        ScriptedOpener::from_plan(text, &ChunkPlan::fixed(7)),
        ConsumerConfig::default(),
    );
    collect(&mut consumer).unwrap();
    assert!(consumer.is_multi_document());
    let files = consumer.files().unwrap();
    assert_eq!(files["index.html"], "<html><body>home</body></html>");
    assert_eq!(files["about.html"], "<html><body>about</body></html>");
}

#[test]
fn cancellation_yields_one_abort_then_ends() {
    let opener = ScriptedOpener::from_plan(DOCUMENT, &ChunkPlan::fixed(8)).cancel_after(2);
    let mut consumer = StreamConsumer::new(opener, ConsumerConfig::default());
    let cancel = CancelFlag::new();
    let mut chunks = consumer.consume(&request(), &cancel).unwrap();
    assert!(chunks.next().unwrap().is_ok());
    assert!(chunks.next().unwrap().is_ok());
    assert!(chunks.next().unwrap().unwrap_err().is_abort());
    assert!(chunks.next().is_none());
    drop(chunks);
    assert_eq!(consumer.full_text(), &DOCUMENT[..16]);
}

#[test]
fn cancelled_before_open_does_not_open() {
    let opener = ScriptedOpener::whole(DOCUMENT);
    let mut consumer = StreamConsumer::new(opener.clone(), ConsumerConfig::default());
    let cancel = CancelFlag::new();
    cancel.cancel();
    assert!(consumer.consume(&request(), &cancel).err().unwrap().is_abort());
    assert_eq!(opener.times_opened(), 0);
}

#[test]
fn error_status_is_reported() {
    let mut consumer = StreamConsumer::new(
        ScriptedOpener::whole(DOCUMENT).with_status(503),
        ConsumerConfig::default(),
    );
    let err = collect(&mut consumer).unwrap_err();
    assert!(matches!(err, StreamError::Status { code: 503 }));
    assert!(!err.is_abort());
}

#[test]
fn read_failure_ends_the_stream() {
    let opener = ScriptedOpener::from_plan(DOCUMENT, &ChunkPlan::fixed(10)).fail_after(1);
    let mut consumer = StreamConsumer::new(opener, ConsumerConfig::default());
    let cancel = CancelFlag::new();
    let items: Vec<_> = consumer.consume(&request(), &cancel).unwrap().collect();
    assert_eq!(items.len(), 2);
    assert!(matches!(items[1], Err(StreamError::Io(_))));
}

#[test]
fn reset_clears_state_between_responses() {
    let mut consumer =
        StreamConsumer::new(ScriptedOpener::whole(DOCUMENT), ConsumerConfig::default());
    collect(&mut consumer).unwrap();
    consumer.reset();
    assert_eq!(consumer.full_text(), "");
    assert_eq!(consumer.phase(), Phase::Head);
    assert_eq!(consumer.response_mode(), None);
}

#[test]
fn full_document_run_tracks_latest_text() {
    let mut consumer = StreamConsumer::new(
        ScriptedOpener::from_plan(DOCUMENT, &ChunkPlan::fixed(16)),
        ConsumerConfig::default(),
    );
    let mut run = GenerationRun::new("<html>previous</html>");
    let mut updates = 0;
    let result = run
        .drive(&mut consumer, &request(), &CancelFlag::new(), |_, _| updates += 1)
        .unwrap();
    assert_eq!(result.document, DOCUMENT);
    assert_eq!(result.files, None);
    assert_eq!(run.latest_document(), DOCUMENT);
    assert!(updates > 1);
}
