use std::sync::Arc;

use anyhow::anyhow;
use serde_json::json;
use vgraph::error::GraphError;
use vgraph::nodes::common::{EndNode, RootNode};
use vgraph::nodes::dialogue::DialogueNode;
use vgraph::nodes::flow::SubgraphNode;
use vgraph::runtime::context::Context;
use vgraph::runtime::node::Node;
use vgraph::runtime::port::PortDescriptor;
use vgraph::runtime::syscall::Syscall;
use vgraph::{Blueprint, Evaluator, EvaluatorConfig, EvaluatorState, NodeId};

/// Always fails.
#[derive(Debug)]
struct Faulty;

impl Node for Faulty {
    fn kind(&self) -> &str {
        "faulty"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::flow_in("enter")]
    }

    fn evaluate(&self, _ctx: &Context<'_>, _syscall: &mut dyn Syscall) -> anyhow::Result<Option<NodeId>> {
        Err(anyhow!("boom"))
    }
}

/// Schedules itself as a resume point and loops back to itself.
#[derive(Debug)]
struct Recurse;

impl Node for Recurse {
    fn kind(&self) -> &str {
        "recurse"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::flow_in("enter")]
    }

    fn evaluate(&self, ctx: &Context<'_>, syscall: &mut dyn Syscall) -> anyhow::Result<Option<NodeId>> {
        syscall.push_continuation(ctx.node_id())?;
        Ok(Some(ctx.node_id()))
    }
}

/// Root -> A (dialogue) -> B (end)
fn linear() -> (Arc<Blueprint>, NodeId, NodeId, NodeId) {
    let mut bp = Blueprint::new("linear", "linear");
    let root = bp.add_node("root", Box::new(RootNode)).unwrap();
    let a = bp.add_node("a", Box::new(DialogueNode::new("Ann", "hi"))).unwrap();
    let b = bp.add_node("b", Box::new(EndNode)).unwrap();
    bp.connect(root, "next", a, "enter").unwrap();
    bp.connect(a, "next", b, "enter").unwrap();
    bp.set_root(root).unwrap();
    (Arc::new(bp), root, a, b)
}

#[test]
fn test_step_order_on_linear_graph() {
    let (bp, root, a, b) = linear();
    let mut ev = Evaluator::new(bp);

    // 1. Parked on the root
    ev.initialize().unwrap();
    assert_eq!(ev.state(), EvaluatorState::Suspended(root));
    assert_eq!(ev.current(), Some(root));

    // 2. Each step reports the node the following step visits
    assert_eq!(ev.step().unwrap(), Some(a));
    assert_eq!((ev.previous(), ev.next()), (Some(root), Some(a)));

    assert_eq!(ev.step().unwrap(), Some(b));
    assert_eq!((ev.previous(), ev.next()), (Some(a), Some(b)));
    assert_eq!(ev.current(), Some(a));

    assert_eq!(ev.step().unwrap(), None);
    assert_eq!((ev.previous(), ev.next()), (Some(b), None));
    assert!(ev.is_finished());

    // 3. Stepping a finished evaluator is a no-op
    assert_eq!(ev.step().unwrap(), None);
    assert_eq!(ev.previous(), Some(b));
    assert_eq!(ev.state(), EvaluatorState::Finished);
}

#[test]
fn test_continuation_resumes_after_dead_end() {
    let mut bp = Blueprint::new("call", "call");
    let root = bp.add_node("root", Box::new(RootNode)).unwrap();
    let call = bp.add_node("call", Box::new(SubgraphNode)).unwrap();
    let body = bp.add_node("body", Box::new(DialogueNode::new("", "inside"))).unwrap();
    let after = bp.add_node("after", Box::new(DialogueNode::new("", "after"))).unwrap();
    bp.connect(root, "next", call, "enter").unwrap();
    bp.connect(call, "body", body, "enter").unwrap();
    bp.connect(call, "next", after, "enter").unwrap();
    bp.set_root(root).unwrap();
    let mut ev = Evaluator::new(Arc::new(bp));
    ev.initialize().unwrap();

    assert_eq!(ev.step().unwrap(), Some(call));
    assert_eq!(ev.step().unwrap(), Some(body));
    assert_eq!(ev.continuations(), &[after]);

    // body has no outgoing flow: the pending resume point is used
    assert_eq!(ev.step().unwrap(), Some(after));
    assert_eq!(ev.continuation_depth(), 0);

    assert_eq!(ev.step().unwrap(), None);
    assert!(ev.is_finished());
}

#[test]
fn test_step_before_initialize_fails() {
    let (bp, ..) = linear();
    let mut ev = Evaluator::new(bp);
    assert_eq!(ev.state(), EvaluatorState::Idle);
    assert!(matches!(ev.step(), Err(GraphError::NotInitialized)));
    assert!(matches!(ev.reset(), Err(GraphError::NotInitialized)));
}

#[test]
fn test_missing_root_fails_initialize() {
    let mut bp = Blueprint::new("rootless", "rootless");
    bp.add_node("end", Box::new(EndNode)).unwrap();
    let mut ev = Evaluator::new(Arc::new(bp));
    assert!(matches!(ev.initialize(), Err(GraphError::MissingRoot(ref id)) if id == "rootless"));
    assert!(ev.graph().is_none());
}

#[test]
fn test_reset_keeps_values_until_reinitialized() {
    let (bp, root, a, _) = linear();
    let mut ev = Evaluator::new(bp);
    ev.initialize().unwrap();
    ev.step().unwrap();
    ev.step().unwrap();
    let graph = ev.graph().unwrap().clone();
    assert_eq!(graph.value(a, "visits").unwrap(), json!(1));

    // 1. Cursor back on the root, values untouched
    ev.reset().unwrap();
    assert_eq!(ev.state(), EvaluatorState::Suspended(root));
    assert_eq!((ev.previous(), ev.next()), (None, None));
    assert_eq!(graph.value(a, "visits").unwrap(), json!(1));

    // 2. A second pass accumulates
    ev.step().unwrap();
    ev.step().unwrap();
    assert_eq!(graph.value(a, "visits").unwrap(), json!(2));

    // 3. Values go back to defaults only on request
    ev.reinitialize_values().unwrap();
    assert_eq!(graph.value(a, "visits").unwrap(), json!(0));
}

#[test]
fn test_reinitialize_recycles_the_instance() {
    let (bp, ..) = linear();
    let mut ev = Evaluator::new(Arc::clone(&bp));
    ev.initialize().unwrap();
    let first = ev.instance().unwrap();

    ev.initialize().unwrap();
    assert_eq!(ev.instance(), Some(first));
    assert_eq!(bp.pool().live_count(), 1);

    ev.release();
    assert_eq!(ev.state(), EvaluatorState::Idle);
    assert_eq!(bp.pool().live_count(), 0);
}

#[test]
fn test_failing_node_leaves_cursor_in_place() {
    let mut bp = Blueprint::new("fail", "fail");
    let root = bp.add_node("root", Box::new(RootNode)).unwrap();
    let bad = bp.add_node("bad", Box::new(Faulty)).unwrap();
    bp.connect(root, "next", bad, "enter").unwrap();
    bp.set_root(root).unwrap();
    let mut ev = Evaluator::new(Arc::new(bp));
    ev.initialize().unwrap();
    let instance = ev.instance().unwrap();

    assert_eq!(ev.step().unwrap(), Some(bad));
    let err = ev.step().unwrap_err();
    match err {
        GraphError::Evaluation { node, instance: i, source } => {
            assert_eq!(node, bad);
            assert_eq!(i, instance);
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ev.state(), EvaluatorState::Suspended(bad));

    // The same node is retried
    assert!(ev.step().is_err());
}

#[test]
fn test_continuation_limit_is_enforced() {
    let mut bp = Blueprint::new("deep", "deep");
    let root = bp.add_node("root", Box::new(RootNode)).unwrap();
    let rec = bp.add_node("rec", Box::new(Recurse)).unwrap();
    bp.connect(root, "next", rec, "enter").unwrap();
    bp.set_root(root).unwrap();
    let config = EvaluatorConfig { continuation_limit: 3 };
    let mut ev = Evaluator::with_config(Arc::new(bp), config);
    ev.initialize().unwrap();

    ev.step().unwrap();
    for _ in 0..3 {
        assert_eq!(ev.step().unwrap(), Some(rec));
    }
    assert_eq!(ev.continuation_depth(), 3);

    let err = ev.step().unwrap_err();
    let GraphError::Evaluation { source, .. } = err else {
        panic!("expected an evaluation error");
    };
    assert!(matches!(
        source.downcast_ref::<GraphError>(),
        Some(GraphError::ContinuationOverflow(3))
    ));
}

#[test]
fn test_evaluators_run_on_separate_threads() {
    let (bp, _, a, _) = linear();
    let ready = std::sync::Barrier::new(4);

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let bp = Arc::clone(&bp);
                let ready = &ready;
                scope.spawn(move || {
                    let mut ev = Evaluator::new(bp);
                    ev.initialize().expect("initialize");
                    // all four ids are held before any is released
                    ready.wait();
                    while ev.step().expect("step").is_some() {}
                    let graph = ev.graph().expect("graph");
                    (graph.id(), graph.value(a, "visits").expect("visits"))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("thread")).collect()
    });

    let mut ids: Vec<_> = results.iter().map(|(id, _)| *id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
    assert!(results.iter().all(|(_, visits)| *visits == json!(1)));
    assert_eq!(bp.pool().live_count(), 0);
}
