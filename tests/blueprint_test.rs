use std::sync::Arc;

use serde_json::json;
use vgraph::error::GraphError;
use vgraph::nodes::common::{EndNode, PropertyNode, RootNode};
use vgraph::nodes::dialogue::{ChoiceNode, DialogueNode};
use vgraph::runtime::context::Context;
use vgraph::runtime::node::Node;
use vgraph::runtime::port::{PortDescriptor, ValueType};
use vgraph::runtime::syscall::Syscall;
use vgraph::{Blueprint, InstanceId, NodeId};

/// Dialogue stand-in without value ports.
#[derive(Debug)]
struct Mute;

impl Node for Mute {
    fn kind(&self) -> &str {
        "mute"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::flow_in("enter"), PortDescriptor::flow_out("next")]
    }

    fn evaluate(&self, ctx: &Context<'_>, _syscall: &mut dyn Syscall) -> anyhow::Result<Option<NodeId>> {
        Ok(ctx.next_node("next"))
    }
}

fn linear() -> Blueprint {
    let mut bp = Blueprint::new("linear", "linear");
    let root = bp.add_node("root", Box::new(RootNode)).unwrap();
    let end = bp.add_node("end", Box::new(EndNode)).unwrap();
    bp.connect(root, "next", end, "enter").unwrap();
    bp.set_root(root).unwrap();
    bp
}

#[test]
fn test_instance_ids_are_recycled_lifo() {
    let bp = Arc::new(linear());

    // 1. Five live instances take ids 1..=5
    let mut graphs: Vec<_> = (0..5).map(|_| bp.create_virtual_graph()).collect();
    let ids: Vec<_> = graphs.iter().map(|g| g.id()).collect();
    assert_eq!(ids, (1..=5).map(InstanceId).collect::<Vec<_>>());

    // 2. Release 3, then 5
    let five = graphs.remove(4);
    let three = graphs.remove(2);
    drop(three);
    drop(five);
    assert_eq!(bp.live_instances(), vec![InstanceId(1), InstanceId(2), InstanceId(4)]);

    // 3. Last released comes back first, then the counter resumes
    let a = bp.create_virtual_graph();
    let b = bp.create_virtual_graph();
    let c = bp.create_virtual_graph();
    assert_eq!(a.id(), InstanceId(5));
    assert_eq!(b.id(), InstanceId(3));
    assert_eq!(c.id(), InstanceId(6));
    assert_eq!(bp.pool().high_water(), 6);
}

#[test]
fn test_handles_release_their_id_exactly_once() {
    let bp = Arc::new(linear());
    let graph = bp.create_virtual_graph();
    let copy = graph.clone();
    let id = graph.id();

    // 1. Releasing one clone keeps the id live for the other
    graph.release();
    assert!(bp.is_live(id));

    // 2. The last clone frees it once
    copy.release();
    assert!(!bp.is_live(id));
    assert_eq!(bp.pool().live_count(), 0);

    // 3. The free list holds a single copy of the id
    let a = bp.create_virtual_graph();
    let b = bp.create_virtual_graph();
    assert_eq!(a.id(), id);
    assert_ne!(b.id(), id);
    assert_eq!(bp.pool().high_water(), 2);
}

#[test]
fn test_id_is_released_when_last_handle_drops() {
    let bp = Arc::new(linear());
    let graph = bp.create_virtual_graph();
    let copy = graph.clone();
    assert_eq!(graph, copy);
    assert_eq!(graph.handle_count(), 2);

    drop(graph);
    assert!(bp.is_live(copy.id()));

    let id = copy.id();
    drop(copy);
    assert!(!bp.is_live(id));
    assert_eq!(bp.pool().live_count(), 0);
}

#[test]
fn test_released_values_are_dropped() {
    let mut bp = Blueprint::new("forget", "forget");
    let line = bp.add_node("line", Box::new(DialogueNode::new("", "hi"))).unwrap();
    let bp = Arc::new(bp);

    let graph = bp.create_virtual_graph();
    let id = graph.id();
    graph.set_value(line, "visits", 4).unwrap();
    drop(graph);

    let slot = bp.port(line, "visits").unwrap().slot(None).unwrap();
    assert!(!slot.contains(id));

    // A recycled id starts from defaults, not from the previous owner's values
    let graph = bp.create_virtual_graph();
    assert_eq!(graph.id(), id);
    assert_eq!(graph.value(line, "visits").unwrap(), json!(0));
}

#[test]
fn test_precache_is_built_once_and_invalidated_by_edits() {
    let mut bp = linear();
    assert!(!bp.is_precached());
    assert_eq!(bp.precache().len(), 2);
    assert!(bp.is_precached());

    let extra = bp.add_node("extra", Box::new(EndNode)).unwrap();
    assert!(!bp.is_precached());
    let root = bp.root().unwrap();
    assert!(bp.connect(root, "next", extra, "enter").is_err());

    let bp = Arc::new(bp);
    let _graph = bp.create_virtual_graph();
    assert!(bp.is_precached());
    for addr in bp.precache() {
        assert!(bp.link_at(*addr).unwrap().is_bound());
    }
}

#[test]
fn test_remove_node_drops_links_and_root() {
    let mut bp = linear();
    let root = bp.root().unwrap();
    let end = bp.node_id("end").unwrap();

    bp.remove_node(end).unwrap();
    assert!(!bp.port(root, "next").unwrap().is_linked());
    assert!(bp.node_id("end").is_none());

    bp.remove_node(root).unwrap();
    assert_eq!(bp.root(), None);
    assert_eq!(bp.node_count(), 0);
    assert!(matches!(bp.remove_node(root), Err(GraphError::NodeNotFound(_))));
}

#[test]
fn test_labels_are_unique() {
    let mut bp = linear();
    let err = bp.add_node("end", Box::new(EndNode)).unwrap_err();
    assert!(matches!(err, GraphError::DuplicateLabel(ref l) if l == "end"));
}

#[test]
fn test_resync_prunes_links_to_removed_fields() {
    let mut bp = Blueprint::new("prune", "prune");
    let root = bp.add_node("root", Box::new(RootNode)).unwrap();
    let who = bp.add_node("who", Box::new(PropertyNode::new(ValueType::String, json!("Ann")))).unwrap();
    let line = bp.add_node("line", Box::new(DialogueNode::new("", "hi"))).unwrap();
    let flow = bp.connect(root, "next", line, "enter").unwrap();
    let speaker = bp.connect(who, "value", line, "speaker").unwrap();
    bp.set_root(root).unwrap();

    // 1. Nothing to prune on a consistent graph
    assert!(bp.resync().is_empty());

    // 2. The new implementation no longer declares "speaker"
    bp.replace_node(line, Box::new(Mute)).unwrap();
    let report = bp.resync();

    // 3. Both halves of the speaker link are gone, the flow link survives
    assert_eq!(report.len(), 2);
    assert!(report.contains(speaker));
    assert!(bp.find_link(speaker).is_none());
    assert!(!bp.port(who, "value").unwrap().is_linked());
    assert!(bp.find_link(flow).is_some());
    assert!(bp.port(line, "speaker").is_err());

    // 4. The pruned graph instantiates cleanly
    let bp = Arc::new(bp);
    let graph = bp.create_virtual_graph();
    assert_eq!(graph.value(who, "value").unwrap(), json!("Ann"));
}

#[test]
fn test_resync_prunes_links_after_type_change() {
    let mut bp = Blueprint::new("retype", "retype");
    let who = bp.add_node("who", Box::new(PropertyNode::new(ValueType::String, json!("Ann")))).unwrap();
    let line = bp.add_node("line", Box::new(DialogueNode::new("", "hi"))).unwrap();
    let link = bp.connect(who, "value", line, "speaker").unwrap();

    bp.replace_node(who, Box::new(PropertyNode::new(ValueType::Int, json!(1)))).unwrap();
    let report = bp.resync();

    assert!(report.contains(link));
    assert!(!bp.port(line, "speaker").unwrap().is_linked());
    assert_eq!(bp.port(who, "value").unwrap().value_type(), &ValueType::Int);
}

#[test]
fn test_replaced_node_takes_new_defaults_on_resync() {
    let mut bp = Blueprint::new("redeclare", "redeclare");
    let who = bp.add_node("who", Box::new(PropertyNode::new(ValueType::String, json!("Ann")))).unwrap();
    let menu = bp.add_node("menu", Box::new(ChoiceNode::new(&["a", "b"]))).unwrap();

    // 1. Same port shapes, new declared values
    bp.replace_node(who, Box::new(PropertyNode::new(ValueType::String, json!("Bob")))).unwrap();
    bp.replace_node(menu, Box::new(ChoiceNode::new(&["x", "y", "z"]))).unwrap();
    assert!(bp.resync().is_empty());

    // 2. Instances read the new default and labels
    let bp = Arc::new(bp);
    let graph = bp.create_virtual_graph();
    assert_eq!(graph.value(who, "value").unwrap(), json!("Bob"));
    assert_eq!(bp.port(menu, "choices").unwrap().sub_port_count(), Some(3));
    let labels: Vec<_> = (0..3).map(|i| graph.sub_value(menu, "choices", i).unwrap()).collect();
    assert_eq!(labels, vec![json!("x"), json!("y"), json!("z")]);

    // 3. The saved document agrees with the node params
    let doc = bp.to_document();
    let who_doc = doc.nodes.iter().find(|n| n.label == "who").unwrap();
    assert_eq!(who_doc.params["value"], json!("Bob"));
    assert_eq!(who_doc.ports[0].default, Some(json!("Bob")));
    let menu_doc = doc.nodes.iter().find(|n| n.label == "menu").unwrap();
    let choices = menu_doc.ports.iter().find(|p| p.field == "choices").unwrap();
    assert_eq!(choices.sub_ports, Some(vec![json!("x"), json!("y"), json!("z")]));
}

#[test]
fn test_shrunk_sub_ports_drop_their_links() {
    let mut bp = Blueprint::new("shrink", "shrink");
    let menu = bp.add_node("menu", Box::new(ChoiceNode::new(&["a", "b"]))).unwrap();
    let first = bp.add_node("first", Box::new(EndNode)).unwrap();
    let second = bp.add_node("second", Box::new(EndNode)).unwrap();
    let kept = bp.connect_indexed(menu, "choices", Some(0), first, "enter", None).unwrap();
    let dropped = bp.connect_indexed(menu, "choices", Some(1), second, "enter", None).unwrap();

    bp.replace_node(menu, Box::new(ChoiceNode::new(&["only"]))).unwrap();
    let report = bp.resync();

    assert_eq!(bp.port(menu, "choices").unwrap().sub_port_count(), Some(1));
    assert!(report.contains(dropped));
    assert!(!bp.port(second, "enter").unwrap().is_linked());
    assert!(bp.find_link(kept).is_some());
}

#[test]
fn test_edited_default_survives_resync_of_untouched_node() {
    let mut bp = Blueprint::new("edited", "edited");
    let who = bp.add_node("who", Box::new(PropertyNode::new(ValueType::String, json!("Ann")))).unwrap();
    bp.set_default(who, "value", json!("Cy")).unwrap();

    assert!(bp.resync().is_empty());

    let bp = Arc::new(bp);
    let graph = bp.create_virtual_graph();
    assert_eq!(graph.value(who, "value").unwrap(), json!("Cy"));
}
