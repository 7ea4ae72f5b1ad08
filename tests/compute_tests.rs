//! Compute runner integration tests: submission batching, post chain
//! notification and ping-pong correctness with the bundled kernels.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use rstest::rstest;

use common::{RecordingPostChain, RecordingQueue, init_logger};
use studio_framegraph::compute::kernels::{
    FluidConfig, FluidKernel, ParticleConfig, ParticleKernel,
};
use studio_framegraph::{
    ComputeBackend, ComputeError, ComputeRunner, ComputeTask, FrameContext, RunnerConfig, TaskId,
};

fn particles() -> ParticleKernel {
    ParticleKernel::new(ParticleConfig {
        count: 256,
        ..ParticleConfig::default()
    })
}

fn fluid() -> FluidKernel {
    FluidKernel::new(FluidConfig {
        width: 32,
        height: 32,
        ..FluidConfig::default()
    })
}

fn runner() -> (ComputeRunner<RecordingQueue>, RecordingPostChain) {
    init_logger();
    let post = RecordingPostChain::new();
    let mut runner = ComputeRunner::new(RecordingQueue::new());
    runner.set_post_chain(post.clone());
    (runner, post)
}

#[test]
fn test_initialize_and_frame_submit_once_each() {
    let (mut runner, post) = runner();
    let (p, f) = (particles(), fluid());

    runner
        .initialize(vec![p.init_task(), f.init_task()], 0)
        .unwrap();
    assert_eq!(runner.queue().submit_count(), 1);
    assert_eq!(
        runner.queue().submissions[0].tasks,
        [TaskId::from("particles.init"), TaskId::from("fluid.init")]
    );

    runner.frame(16.0).unwrap();
    assert_eq!(runner.queue().submit_count(), 2);
    assert_eq!(
        post.calls(),
        [(
            16.0,
            FrameContext {
                timestamp: 16.0,
                frame_index: 0
            }
        )]
    );
}

#[test]
fn test_frame_batches_every_registered_task() {
    let (mut runner, _post) = runner();
    let (p, f) = (particles(), fluid());
    runner.initialize(vec![p.init_task(), f.init_task()], 0).unwrap();
    assert!(runner.register(p.update_task()));
    assert!(runner.register(f.update_task()));

    for frame in 0..4 {
        runner.frame(16.0 * frame as f64).unwrap();
    }

    let submissions = &runner.queue().submissions;
    assert_eq!(submissions.len(), 5);
    for submission in &submissions[1..] {
        assert_eq!(submission.label, "compute.frame");
        assert_eq!(
            submission.tasks,
            [TaskId::from("particles.update"), TaskId::from("fluid.update")]
        );
    }
}

#[rstest]
#[case(0)]
#[case(120)]
fn test_frame_index_counts_from_initialize(#[case] start: u64) {
    let (mut runner, post) = runner();
    runner.initialize(Vec::new(), start).unwrap();
    runner.frame(0.0).unwrap();
    runner.frame(16.0).unwrap();
    runner.frame(33.0).unwrap();

    let indices: Vec<u64> = post.calls().iter().map(|(_, f)| f.frame_index).collect();
    assert_eq!(indices, [start, start + 1, start + 2]);
    assert_eq!(runner.queue().submissions[3].frame_index, start + 2);
}

#[test]
fn test_update_swaps_before_frame_returns() {
    let (mut runner, _post) = runner();
    let (p, f) = (particles(), fluid());
    runner.initialize(vec![p.init_task(), f.init_task()], 0).unwrap();
    runner.register(p.update_task());
    runner.register(f.update_task());

    let particle_write = p.state().lock().write().as_ptr();
    let fluid_write = f.state().lock().write().as_ptr();

    runner.frame(16.0).unwrap();

    assert_eq!(p.state().lock().read().as_ptr(), particle_write);
    assert_eq!(f.state().lock().read().as_ptr(), fluid_write);
}

#[test]
fn test_post_chain_sees_this_frames_result() {
    let (mut runner, _post) = runner();
    let f = fluid();
    runner.initialize(vec![f.init_task()], 0).unwrap();
    runner.register(f.update_task());

    let state = f.state().clone();
    let observed = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&observed);
    runner.set_render_callback(move |_| {
        sink.borrow_mut().push(state.lock().read_index());
    });

    runner.frame(0.0).unwrap();
    runner.frame(16.0).unwrap();
    // init swapped once, every update swaps once more
    assert_eq!(*observed.borrow(), [0, 1]);
}

#[test]
fn test_unregistered_task_stops_dispatching() {
    let (mut runner, _post) = runner();
    let (p, f) = (particles(), fluid());
    runner.initialize(Vec::new(), 0).unwrap();
    runner.register(p.update_task());
    runner.register(f.update_task());

    let removed = runner.unregister(&TaskId::from("particles.update"));
    assert!(removed.is_some());
    runner.frame(16.0).unwrap();

    let last = runner.queue().submissions.last().unwrap();
    assert_eq!(last.tasks, [TaskId::from("fluid.update")]);
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let (mut runner, _post) = runner();
    let p = particles();
    assert!(runner.register(p.update_task()));
    assert!(!runner.register(p.update_task()));
    assert_eq!(runner.task_ids().len(), 1);
}

#[test]
fn test_frame_before_initialize_fails() {
    let (mut runner, post) = runner();
    assert_eq!(runner.frame(16.0).unwrap_err(), ComputeError::NotInitialized);
    assert_eq!(runner.queue().submit_count(), 0);
    assert!(post.calls().is_empty());
}

#[test]
fn test_empty_frame_still_submits_and_notifies() {
    let (mut runner, post) = runner();
    runner.initialize(Vec::new(), 0).unwrap();
    runner.frame(16.0).unwrap();
    assert_eq!(runner.queue().submit_count(), 2);
    assert_eq!(post.calls().len(), 1);
}

#[test]
fn test_on_dispatch_fires_once_per_submission() {
    let (mut runner, _post) = runner();
    let batches = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&batches);
    runner.set_on_dispatch(move |ids| sink.borrow_mut().push(ids.len()));

    runner
        .initialize(
            vec![
                ComputeTask::new("a.init", ComputeBackend::cpu(|_| {})),
                ComputeTask::new("b.init", ComputeBackend::cpu(|_| {})),
            ],
            0,
        )
        .unwrap();
    runner.register(ComputeTask::new("a.update", ComputeBackend::cpu(|_| {})));
    runner.frame(16.0).unwrap();
    runner.frame(32.0).unwrap();

    assert_eq!(*batches.borrow(), [2, 1, 1]);
}

#[test]
fn test_custom_submission_labels() {
    init_logger();
    let config = RunnerConfig::new()
        .with_init_label("studio.init")
        .with_frame_label("studio.frame");
    let mut runner = ComputeRunner::with_config(RecordingQueue::new(), config);
    runner.initialize(Vec::new(), 0).unwrap();
    runner.frame(16.0).unwrap();

    let labels: Vec<&str> = runner
        .queue()
        .submissions
        .iter()
        .map(|s| s.label.as_str())
        .collect();
    assert_eq!(labels, ["studio.init", "studio.frame"]);
}
