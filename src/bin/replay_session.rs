use std::env;
use std::path::PathBuf;
use webxr_bridge::vr::scripted::{self, HostScript};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("[replay] error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let script_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: replay_session <script.json>")?;

    let script = HostScript::load(&script_path)?;
    let frames = scripted::replay(&script)?;
    for frame in &frames {
        for event in &frame.events {
            println!("[replay] frame {} event {}", frame.frame, serde_json::to_string(event)?);
        }
        for pointer in &frame.pointer_events {
            println!("[replay] frame {} pointer {}", frame.frame, serde_json::to_string(pointer)?);
        }
    }
    println!(
        "[replay] replayed {} frames from {}",
        frames.len(),
        script_path.display()
    );
    Ok(())
}
