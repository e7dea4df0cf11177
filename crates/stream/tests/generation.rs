mod common;

use common::{HANG_PROMPT, ScriptedOpener};
use core_types::GenerationRequest;
use std::sync::mpsc;
use std::time::Duration;
use stream::{
    CancelFlag, ConsumerConfig, GenerationCommand, GenerationEvent, GenerationRun, Phase,
    StreamConsumer, start_generation_runtime,
};
use test_support::{ChunkPlan, build_chunk_plans_utf8};

const BASE: &str = "<!DOCTYPE html><html><head><style>:root { --c: red; }</style></head><body><section id=\"hero\">Old</section><aside id=\"ad\">buy</aside></body></html>";

const PATCH: &str = concat!(
    "<!-- PATCH -->\n",
    "<!-- REPLACE_VARS --> --c: teal; <!-- /REPLACE_VARS -->\n",
    "<!-- REPLACE #hero --><section id=\"hero\">New</section><!-- /REPLACE -->\n",
    "<!-- REMOVE #ad -->\n",
    "<!-- /PATCH -->\n",
);

const EXPECTED: &str = "<!DOCTYPE html><html><head><style>:root {\n--c: teal;\n}</style></head><body><section id=\"hero\">New</section></body></html>";

fn refine() -> GenerationRequest {
    GenerationRequest::refine("make it teal", BASE)
}

#[test]
fn patch_stream_is_applied_under_every_chunk_plan() {
    for case in build_chunk_plans_utf8(PATCH, 12, 0xfeed) {
        let mut consumer = StreamConsumer::new(
            ScriptedOpener::from_plan(PATCH, &case.plan),
            ConsumerConfig::default(),
        );
        let mut run = GenerationRun::for_request(&refine());
        let mut phases = Vec::new();
        let result = run
            .drive(&mut consumer, &refine(), &CancelFlag::new(), |phase, _| {
                phases.push(phase)
            })
            .unwrap();
        assert_eq!(result.document, EXPECTED, "{}", case.label);
        assert_eq!(run.applied_operations(), 3, "{}", case.label);
        assert_eq!(consumer.phase(), Phase::Complete, "{}", case.label);
        assert!(phases.windows(2).all(|w| w[0] <= w[1]), "{}", case.label);
    }
}

#[test]
fn cancelled_patch_keeps_partial_application() {
    // Chunk 2 ends right after the REPLACE_VARS operation closes.
    let split = PATCH.find("<!-- REPLACE #hero").unwrap();
    let plan = ChunkPlan::boundaries(vec![15, split, split + 10]);
    let opener = ScriptedOpener::from_plan(PATCH, &plan).cancel_after(2);
    let mut consumer = StreamConsumer::new(opener, ConsumerConfig::default());
    let mut run = GenerationRun::for_request(&refine());
    let err = run
        .drive(&mut consumer, &refine(), &CancelFlag::new(), |_, _| {})
        .unwrap_err();
    assert!(err.is_abort());
    assert_eq!(run.applied_operations(), 1);
    assert!(run.latest_document().contains("--c: teal;"));
    assert!(run.latest_document().contains("Old"));
}

fn recv(rx: &mpsc::Receiver<GenerationEvent>) -> GenerationEvent {
    rx.recv_timeout(Duration::from_secs(5))
        .expect("runtime event")
}

#[test]
fn runtime_streams_updates_and_finishes() {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (evt_tx, evt_rx) = mpsc::channel();
    let opener = ScriptedOpener::from_plan(PATCH, &ChunkPlan::fixed(9));
    let handle = start_generation_runtime(opener, ConsumerConfig::default(), cmd_rx, evt_tx);

    cmd_tx
        .send(GenerationCommand::Start { request: refine() })
        .unwrap();
    let started = recv(&evt_rx);
    assert!(matches!(started, GenerationEvent::Started { request_id: 1 }));

    let mut updates = 0;
    loop {
        match recv(&evt_rx) {
            GenerationEvent::Update { request_id, .. } => {
                assert_eq!(request_id, 1);
                updates += 1;
            }
            GenerationEvent::Done { request_id, result } => {
                assert_eq!(request_id, 1);
                assert_eq!(result.document, EXPECTED);
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(updates >= 3);

    drop(cmd_tx);
    handle.join().unwrap();
}

#[test]
fn starting_again_aborts_the_running_generation() {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (evt_tx, evt_rx) = mpsc::channel();
    let opener = ScriptedOpener::whole("<html><body>done</body></html>");
    let handle = start_generation_runtime(opener, ConsumerConfig::default(), cmd_rx, evt_tx);

    cmd_tx
        .send(GenerationCommand::Start {
            request: GenerationRequest::generate(HANG_PROMPT),
        })
        .unwrap();
    assert_eq!(recv(&evt_rx).request_id(), 1);

    cmd_tx
        .send(GenerationCommand::Start {
            request: GenerationRequest::generate("a bakery"),
        })
        .unwrap();

    let mut aborted_first = false;
    let mut finished_second = false;
    while !(aborted_first && finished_second) {
        match recv(&evt_rx) {
            GenerationEvent::Aborted { request_id: 1, .. } => aborted_first = true,
            GenerationEvent::Done { request_id: 2, result } => {
                assert_eq!(result.document, "<html><body>done</body></html>");
                finished_second = true;
            }
            GenerationEvent::Started { request_id: 2 } | GenerationEvent::Update { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }

    drop(cmd_tx);
    handle.join().unwrap();
}

#[test]
fn cancel_command_stops_the_active_generation() {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (evt_tx, evt_rx) = mpsc::channel();
    let handle = start_generation_runtime(
        ScriptedOpener::new(Vec::new()),
        ConsumerConfig::default(),
        cmd_rx,
        evt_tx,
    );
    cmd_tx
        .send(GenerationCommand::Start {
            request: GenerationRequest::generate(HANG_PROMPT),
        })
        .unwrap();
    assert_eq!(recv(&evt_rx).request_id(), 1);
    cmd_tx.send(GenerationCommand::Cancel).unwrap();
    loop {
        match recv(&evt_rx) {
            GenerationEvent::Aborted { request_id, .. } => {
                assert_eq!(request_id, 1);
                break;
            }
            GenerationEvent::Update { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    drop(cmd_tx);
    handle.join().unwrap();
}
