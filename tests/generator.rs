use cache::{CacheConfig, GenerationCache, MemoryStorage, derive_key_for};
use core_types::{GenerationRequest, SelectionValue};
use livepatch::Generator;
use net::{CancelFlag, OpenedStream, StreamError, StreamOpener};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use stream::{ConsumerConfig, StreamConsumer};

const PAGE: &str = "<!DOCTYPE html><html><head></head><body><h1>Crumb</h1></body></html>";

/// Serves the same body for every request and counts how often it was asked.
#[derive(Clone)]
struct FixedOpener {
    body: &'static str,
    opened: Arc<AtomicUsize>,
}

impl FixedOpener {
    fn new(body: &'static str) -> Self {
        Self {
            body,
            opened: Arc::default(),
        }
    }

    fn times_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl StreamOpener for FixedOpener {
    fn open(
        &self,
        _request: &GenerationRequest,
        _cancel: &CancelFlag,
    ) -> Result<OpenedStream, StreamError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(OpenedStream {
            status: 200,
            reader: Box::new(Cursor::new(self.body.as_bytes())),
        })
    }
}

fn generator(opener: &FixedOpener) -> Generator<FixedOpener, MemoryStorage> {
    Generator::new(
        StreamConsumer::new(opener.clone(), ConsumerConfig { read_buffer_bytes: 7 }),
        Some(GenerationCache::new(MemoryStorage::new(), CacheConfig::default())),
    )
}

#[test]
fn second_identical_request_is_served_from_cache() {
    let opener = FixedOpener::new(PAGE);
    let mut generator = generator(&opener);
    let request = GenerationRequest::generate("A bakery called Crumb");

    let mut updates = 0;
    let first = generator
        .generate(&request, &CancelFlag::new(), |_, _| updates += 1)
        .unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.result.document, PAGE);
    assert!(updates > 0);

    let respelled = GenerationRequest::generate("  a bakery called crumb ")
        .with_selection("pages", SelectionValue::List(vec![]));
    let second = generator
        .generate(&respelled, &CancelFlag::new(), |_, _| {})
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.result, first.result);
    assert_eq!(opener.times_opened(), 1);
}

#[test]
fn refinements_bypass_the_cache_and_invalidate_their_origin() {
    let opener = FixedOpener::new(PAGE);
    let mut generator = generator(&opener);
    let origin = GenerationRequest::generate("a bakery");
    generator.generate(&origin, &CancelFlag::new(), |_, _| {}).unwrap();
    assert_eq!(generator.cache().unwrap().len(), 1);

    let refine = GenerationRequest::refine("a bakery", PAGE);
    let refined = generator.generate(&refine, &CancelFlag::new(), |_, _| {}).unwrap();
    assert!(!refined.from_cache);
    assert_eq!(opener.times_opened(), 2);

    generator.invalidate_origin(&origin);
    assert!(generator.cache().unwrap().is_empty());
    assert!(
        !generator
            .cache()
            .unwrap()
            .keys()
            .any(|k| *k == derive_key_for(&origin))
    );
}

#[test]
fn cancelled_generation_is_not_cached() {
    let opener = FixedOpener::new(PAGE);
    let mut generator = generator(&opener);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = generator
        .generate(&GenerationRequest::generate("a bakery"), &cancel, |_, _| {})
        .unwrap_err();
    let stream_err = err.downcast_ref::<StreamError>().expect("stream error");
    assert!(stream_err.is_abort());
    assert!(generator.cache().unwrap().is_empty());
}
