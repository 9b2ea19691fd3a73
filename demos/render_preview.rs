//! Render a component in headless Chrome and save its thumbnail
//!
//! cargo run --example render_preview --features cdp -- path/to/Component.tsx

use base64::Engine as _;
use rfpreview::{Preview, PreviewConfig, PreviewState, Theme};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("rfpreview - CDP render example\n");

    let source = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => r#"export default function Badge() {
  return <span style={{ padding: 8, borderRadius: 999, background: 'var(--primary)', color: 'var(--primary-foreground)' }}>New</span>;
}"#
        .to_string(),
    };

    let preview = Preview::launch_cdp(PreviewConfig::default()).await?;
    let mut updates = preview.subscribe();

    let snapshot = preview.render_preview(&source, Theme::Light).await?;
    println!("Rendering `{}` (generation {})", snapshot.component.as_deref().unwrap_or("?"), snapshot.generation);

    let settled = tokio::time::timeout(Duration::from_secs(20), async {
        loop {
            if updates.changed().await.is_err() {
                return None;
            }
            let snap = updates.borrow().clone();
            if matches!(snap.state, PreviewState::Loaded | PreviewState::Error) {
                return Some(snap);
            }
        }
    })
    .await?;

    match settled {
        Some(snap) if snap.error.is_none() => println!("Loaded, height {:?}px", snap.height),
        Some(snap) => println!("Render error: {}", snap.error.unwrap_or_default()),
        None => println!("Preview closed before reporting"),
    }

    if let Some(uri) = preview.capture().await? {
        let payload = uri.trim_start_matches("data:image/jpeg;base64,");
        std::fs::write("thumbnail.jpg", base64::engine::general_purpose::STANDARD.decode(payload)?)?;
        println!("Thumbnail saved to: thumbnail.jpg");
    }

    preview.close().await?;
    println!("Done!");
    Ok(())
}
