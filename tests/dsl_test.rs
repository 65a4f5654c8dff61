use vgraph::dsl::BlueprintBuilder;
use vgraph::error::GraphError;
use vgraph::runtime::port::ValueType;

#[test]
fn test_build_linear_blueprint() {
    let bp = BlueprintBuilder::new("linear-flow")
        .name("Linear")
        .root("start")
        .dialogue("hello", "Ann", "Hello!")
        .end("end")
        .flow("start", "hello")
        .flow("hello", "end")
        .build()
        .expect("valid blueprint");

    assert_eq!(bp.id(), "linear-flow");
    assert_eq!(bp.name(), "Linear");
    assert_eq!(bp.node_count(), 3);
    assert_eq!(bp.root(), bp.node_id("start"));

    let hello = bp.node_id("hello").unwrap();
    let entry = bp.node(hello).unwrap();
    assert_eq!(entry.kind(), "dialogue");
    assert_eq!(entry.label(), "hello");
    assert_eq!(bp.port(hello, "next").unwrap().first_node(), bp.node_id("end"));
}

#[test]
fn test_build_branching_blueprint() {
    let bp = BlueprintBuilder::new("branch-flow")
        .root("start")
        .property("x", ValueType::Int, 5)
        .branch("check", Some("${value} > 10"))
        .end("a")
        .end("b")
        .flow("start", "check")
        .connect("x", "value", "check", "value")
        .connect_if("check", "a")
        .connect_else("check", "b")
        .build()
        .expect("valid blueprint");

    let check = bp.node_id("check").unwrap();
    assert_eq!(bp.port(check, "true").unwrap().first_node(), bp.node_id("a"));
    assert_eq!(bp.port(check, "false").unwrap().first_node(), bp.node_id("b"));
    assert_eq!(
        bp.node(check).unwrap().node().params(),
        serde_json::json!({ "condition": "value > 10" })
    );
}

#[test]
fn test_first_error_is_reported() {
    let err = BlueprintBuilder::new("bad")
        .root("start")
        .flow("start", "ghost")
        .end("end")
        .flow("start", "end")
        .build()
        .unwrap_err();
    assert!(matches!(err, GraphError::LabelNotFound(ref l) if l == "ghost"));

    let err = BlueprintBuilder::new("dup")
        .end("end")
        .end("end")
        .build()
        .unwrap_err();
    assert!(matches!(err, GraphError::DuplicateLabel(_)));

    let err = BlueprintBuilder::new("expr")
        .branch("check", Some("value >"))
        .build()
        .unwrap_err();
    assert!(matches!(err, GraphError::Document(_)));
}
