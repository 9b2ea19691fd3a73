//! Controller lifecycle against an in-memory surface

mod common;

use base64::Engine as _;
use common::MockSurface;
use pretty_assertions::assert_eq;
use rfpreview::{
    compile, Bindings, Error, MessageOutcome, PreviewConfig, PreviewController, PreviewState, SandboxMessage, Theme,
};

fn controller(surface: MockSurface) -> PreviewController<MockSurface> {
    PreviewController::new(surface, PreviewConfig::default()).expect("controller")
}

fn decode_document(url: &str) -> String {
    let payload = url
        .strip_prefix("data:text/html;charset=utf-8;base64,")
        .and_then(|rest| rest.split('#').next())
        .expect("data url");
    String::from_utf8(base64::engine::general_purpose::STANDARD.decode(payload).unwrap()).unwrap()
}

#[test]
fn one_live_handle_across_edits() {
    let surface = MockSurface::reporting(64.0);
    let mut c = controller(surface.clone());
    for i in 0..10 {
        let src = format!("function Widget() {{ return <div>{}</div> }}", i);
        c.render_preview(&src, if i % 2 == 0 { Theme::Light } else { Theme::Dark })
            .unwrap();
        assert_eq!(c.outstanding_handles(), 1);
    }
    c.refresh().unwrap();
    assert_eq!(c.outstanding_handles(), 1);

    let attached = surface.state.lock().unwrap().attached.clone();
    assert_eq!(attached.len(), 11);
    let generations: Vec<u64> = attached.iter().map(|(g, _)| *g).collect();
    assert_eq!(generations, (1..=11).collect::<Vec<_>>());
    let mut urls: Vec<&String> = attached.iter().map(|(_, u)| u).collect();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 11);

    c.dispose().unwrap();
    assert_eq!(c.outstanding_handles(), 0);
    assert!(surface.state.lock().unwrap().detached);
}

#[test]
fn scenario_badge_renders_and_reports_height() {
    let surface = MockSurface::reporting(48.0);
    let mut c = controller(surface.clone());
    c.render_preview(
        "export default function Badge() { return <span className=\"badge\">New</span> }",
        Theme::Light,
    )
    .unwrap();
    assert_eq!(c.pump().unwrap(), 1);

    let snap = c.snapshot();
    assert_eq!(snap.state, PreviewState::Loaded);
    assert_eq!(snap.component.as_deref(), Some("Badge"));
    assert!(snap.height.unwrap() > 0);
    assert_eq!(snap.error, None);

    let html = decode_document(c.live_url().unwrap());
    assert!(html.contains("\"component\":\"Badge\""));
}

#[test]
fn scenario_arrow_component_fails_before_transform() {
    let src = "const Badge = () => <span>New</span>;\nexport default Badge;";
    match compile(src, &Bindings::default()) {
        Err(Error::NoComponentFunction(msg)) => assert!(!msg.is_empty()),
        other => panic!("expected NoComponentFunction, got {:?}", other),
    }

    let surface = MockSurface::new();
    let mut c = controller(surface.clone());
    c.render_preview(src, Theme::Dark).unwrap();
    assert_eq!(c.state(), PreviewState::Error);
    assert!(c.error().unwrap().starts_with("No component function found"));

    // The attached document carries the failure and loads no runtime.
    let html = decode_document(c.live_url().unwrap());
    assert!(html.contains("\"failure\":\"No component function found"));
    assert!(!html.contains(&PreviewConfig::default().runtime.transformer_url));
}

#[test]
fn scenario_aliased_icon_is_bound() {
    let src = "import { Star as MyStar } from 'lucide-react';\nexport default function Rating() { return <MyStar /> }";
    let factory = compile(src, &Bindings::default()).unwrap();
    assert!(factory.program.contains("const MyStar = __rfIcons.lookup(\"Star\");"));
    assert!(!factory.program.contains("import"));
    assert_eq!(factory.icon_imports[0].imported, "Star");
    assert_eq!(factory.icon_imports[0].local, "MyStar");
}

#[test]
fn reports_from_superseded_documents_are_dropped() {
    let surface = MockSurface::new();
    let mut c = controller(surface.clone());
    c.render_preview("function A() { return null }", Theme::Light).unwrap();
    surface.post(1, SandboxMessage::Resized { height: 120.0 });
    c.pump().unwrap();
    assert_eq!(c.height(), Some(120));

    c.render_preview("function B() { return null }", Theme::Light).unwrap();
    assert_eq!(c.state(), PreviewState::Updating);
    surface.post(1, SandboxMessage::RenderFailed { error: "old".into() });
    surface.post(1, SandboxMessage::Resized { height: 5.0 });
    assert_eq!(c.pump().unwrap(), 0);
    assert_eq!(c.error(), None);
    assert_eq!(c.height(), Some(120));

    surface.post(2, SandboxMessage::Resized { height: 80.0 });
    c.pump().unwrap();
    assert_eq!(c.state(), PreviewState::Loaded);
    assert_eq!(c.height(), Some(80));
}

#[test]
fn error_then_height_keeps_banner() {
    let surface = MockSurface::new();
    let mut c = controller(surface.clone());
    c.render_preview("function A() { return null }", Theme::Light).unwrap();
    surface.post(1, SandboxMessage::RenderFailed { error: "TypeError: x is undefined".into() });
    surface.post(1, SandboxMessage::Resized { height: 30.0 });
    c.pump().unwrap();
    assert_eq!(c.state(), PreviewState::Error);
    assert_eq!(c.error(), Some("TypeError: x is undefined"));
    assert_eq!(c.height(), Some(30));

    // A fresh render clears the banner but keeps the last-good height until a new report.
    c.render_preview("function A() { return <p/> }", Theme::Light).unwrap();
    assert_eq!(c.error(), None);
    assert_eq!(c.height(), Some(30));
}

#[test]
fn foreign_messages_are_ignored() {
    let mut c = controller(MockSurface::new());
    c.render_preview("function A() { return null }", Theme::Light).unwrap();
    assert_eq!(c.handle_message("{\"type\":\"resize\",\"height\":1}"), MessageOutcome::Ignored);
    assert_eq!(
        c.handle_message("{\"type\":\"resize\",\"height\":1,\"source\":\"devtools\",\"generation\":1}"),
        MessageOutcome::Ignored
    );
    assert_eq!(c.state(), PreviewState::Generating);
}

#[test]
fn dropping_controller_releases_everything() {
    let surface = MockSurface::new();
    {
        let mut c = controller(surface.clone());
        c.render_preview("function A() { return null }", Theme::Light).unwrap();
    }
    assert!(surface.state.lock().unwrap().detached);
}
