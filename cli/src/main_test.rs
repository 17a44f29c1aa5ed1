use super::*;
use canvas::doc::ElementKind;

#[test]
fn parse_elements_accepts_element_array() {
    let el = CanvasElement::create(ElementKind::Frame, 0);
    let text = serde_json::to_string(&vec![el.clone()]).unwrap();
    assert_eq!(parse_elements(&text).unwrap(), vec![el]);
}

#[test]
fn parse_elements_rejects_non_array() {
    assert!(matches!(parse_elements(r#"{"id":"x"}"#), Err(CliError::InvalidJson(_))));
}

#[test]
fn parse_elements_rejects_duplicate_ids() {
    let el = CanvasElement::create(ElementKind::Text, 0);
    let text = serde_json::to_string(&vec![el.clone(), el]).unwrap();
    assert!(matches!(parse_elements(&text), Err(CliError::InvalidDocument(_))));
}

#[test]
fn describe_notice_summarizes_snapshots() {
    let line = describe_notice(&Notice::RemoteApplied { project_id: "p1".into(), count: 3 });
    assert_eq!(line.as_deref(), Some("update p1: 3 elements"));
}

#[test]
fn describe_notice_skips_noise() {
    assert_eq!(describe_notice(&Notice::Joined { project_id: "p1".into() }), None);
    assert_eq!(describe_notice(&Notice::EditRejected { message: "x".into() }), None);
}

#[test]
fn cli_parses_move_with_persist() {
    let cli = Cli::try_parse_from(["canvas-cli", "move", "p1", "rect-1", "60", "55", "--persist"]).unwrap();
    let Command::Move { project_id, element_id, x, y, persist } = cli.command else {
        panic!("expected move");
    };
    assert_eq!((project_id.as_str(), element_id.as_str()), ("p1", "rect-1"));
    assert!((x - 60.0).abs() < f64::EPSILON && (y - 55.0).abs() < f64::EPSILON);
    assert!(persist);
}
