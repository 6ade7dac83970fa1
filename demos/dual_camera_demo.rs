//! Dual Camera Demo
//!
//! Walks a camera session through the everyday flows: permission probe,
//! automatic assignment, toggling, reassignment, a busy device and a
//! snapshot. Runs on an in-process mock backend so no camera is needed;
//! pass `--native` (with the `native` feature) to use real hardware.
//!
//! Pass a path to a JSON session config as the first argument to override
//! the defaults.

use dualcam::{
    CameraSession, CaptureBackend, MockCaptureBackend, MockDevice, MockDeviceBehavior,
    SessionConfig, SessionEvent, SessionView, SlotId,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let native = args.iter().any(|a| a == "--native");

    let mut config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => SessionConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => SessionConfig::default(),
    };
    if config.snapshot_dir == std::path::Path::new(".") {
        config.snapshot_dir = std::env::temp_dir().join("dualcam-demo");
    }

    // Initialize logging
    dualcam::init_logging(&config)?;

    println!("🎥 DualCam Demo");
    println!("===============");

    let mock = MockCaptureBackend::default();
    mock.add_device(MockDevice::camera("cam-front", "Front Camera"));
    mock.add_device(MockDevice::camera("cam-usb", ""));
    mock.add_device(MockDevice {
        behavior: MockDeviceBehavior::Busy,
        ..MockDevice::camera("cam-conference", "Conference Room")
    });

    let backend: Arc<dyn CaptureBackend> = if native {
        dualcam::get_platform_backend()
    } else {
        Arc::new(mock.clone())
    };
    println!("Backend: {}", backend.name());

    let session = CameraSession::new(backend, config)?;
    let mut events = session.subscribe();

    // Demo 1: permission probe and automatic assignment
    println!("\n🔐 Demo 1: Permission and devices");
    println!("----------------------------------");
    match session.initialize().await {
        Ok(devices) => {
            for device in &devices {
                println!("  📷 {} ({})", device.label, device.id);
            }
        }
        Err(e) => {
            println!("❌ {} - camera features disabled", e);
            return Ok(());
        }
    }
    print_view(&session.view());

    // Demo 2: toggling a feed
    println!("\n⏯️  Demo 2: Toggle Feed A");
    println!("------------------------");
    session.toggle(SlotId::FIRST).await?;
    print_view(&session.view());
    session.toggle(SlotId::FIRST).await?;
    print_view(&session.view());

    // Demo 3: a device claimed by another application
    if !native {
        println!("\n🚫 Demo 3: Busy device on Feed B");
        println!("--------------------------------");
        if let Err(e) = session.start(SlotId::SECOND, "cam-conference").await {
            println!("  start failed: {} ({})", e, e.error_code());
        }
        print_view(&session.view());

        session.reassign_device(SlotId::SECOND, Some("cam-usb"))?;
        session.apply_selections().await?;
        print_view(&session.view());
    }

    // Demo 4: snapshot and mirroring
    println!("\n📸 Demo 4: Snapshot");
    println!("-------------------");
    session.set_mirrored(SlotId::SECOND, true)?;
    match session.snapshot(SlotId::FIRST).await? {
        Some(path) => println!("  saved {}", path.display()),
        None => println!("  nothing captured"),
    }

    // Demo 5: diagnostics
    println!("\n🩺 Demo 5: Diagnostics");
    println!("----------------------");
    let report = session.report();
    println!("  {}", report.summary());
    if args.iter().any(|a| a == "--report") {
        println!("{}", report.to_json()?);
    }

    println!("\n🧹 Shutting down");
    println!("  released {} track(s)", session.shutdown());
    if !native {
        println!("  mock tracks still open: {}", mock.open_track_count());
    }

    println!("\n📨 Events seen:");
    while let Ok(Some(event)) = events.try_next() {
        match event {
            SessionEvent::SlotStateChanged { snapshot } => {
                println!("  {} rev {} -> {:?}", snapshot.slot, snapshot.revision, snapshot.status)
            }
            other => println!("  {}", other.event_type()),
        }
    }

    println!("\n✨ DualCam demo completed!");
    Ok(())
}

fn print_view(view: &SessionView) {
    for slot in &view.slots {
        println!(
            "  {:<7} {:?}{}{} [{}]",
            slot.label,
            slot.render,
            slot.selection_label
                .as_deref()
                .map(|label| format!(" on {}", label))
                .unwrap_or_default(),
            if slot.mirrored { " (mirrored)" } else { "" },
            slot.toggle_label()
        );
        if let Some(error) = &slot.error {
            println!("          {}", error);
        }
    }
}
