use anyhow::{bail, Context};
use procamera::headless::{list_cameras, record, HeadlessOptions};
use procamera::ProCameraConfig;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    procamera::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: procamera-cli <list-cameras|record> [args]");
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "list-cameras" => cmd_list_cameras(&args),
        "record" => cmd_record(&args).await,
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

fn cmd_list_cameras(args: &[String]) -> anyhow::Result<()> {
    let cameras = list_cameras()?;
    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string(&cameras)?);
    } else {
        for camera in cameras {
            let c = &camera.characteristics;
            let high_speed: Vec<String> = c
                .high_speed_modes
                .iter()
                .map(|m| format!("{}@{}", m.resolution, m.max_fps))
                .collect();
            println!(
                "{}: ISO {}-{}, up to {} fps, high-speed [{}]",
                camera.id,
                c.iso_range.0,
                c.iso_range.1,
                c.max_standard_fps,
                high_speed.join(", ")
            );
        }
    }
    Ok(())
}

async fn cmd_record(args: &[String]) -> anyhow::Result<()> {
    // record [--fps <label>] [--resolution <label>] [--iso <n>] [--shutter <n>]
    //        [--duration <secs>] [--output <dir>] [--config <file>] [--json]
    let mut options = HeadlessOptions::new("./recordings");
    let mut config_path: Option<PathBuf> = None;
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        let flag = args[i].as_str();
        if flag == "--json" {
            json = true;
            i += 1;
            continue;
        }
        let value = args
            .get(i + 1)
            .with_context(|| format!("{} needs a value", flag))?;
        match flag {
            "--fps" => options.fps_label = value.clone(),
            "--resolution" => options.resolution_label = value.clone(),
            "--iso" => options.iso_position = value.parse().context("--iso")?,
            "--shutter" => options.shutter_position = value.parse().context("--shutter")?,
            "--duration" => options.duration = parse_duration(value)?,
            "--output" => options.output_dir = PathBuf::from(value),
            "--config" => config_path = Some(PathBuf::from(value)),
            other => bail!("Unknown option: {}", other),
        }
        i += 2;
    }

    options.config = match config_path {
        Some(path) => ProCameraConfig::load(&path)?,
        None => ProCameraConfig::load_or_default(),
    };

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("Failed to install Ctrl-C handler")?;

    let report = record(&options, stop).await?;
    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!(
            "{} {} session: {}x{}@{} ISO {} exposure {} ms",
            if report.interrupted { "Stopped early," } else { "Recorded" },
            report.session_kind,
            report.config.width,
            report.config.height,
            report.config.target_fps,
            report.config.iso,
            report.config.shutter_duration_ns / 1_000_000
        );
        println!(
            "Saved {} ({} frames, {} dropped)",
            report.saved.output.uri, report.saved.frames_encoded, report.saved.frames_dropped
        );
        for warning in &report.saved.warnings {
            println!("warning: {}", warning);
        }
    }
    Ok(())
}

fn parse_duration(value: &str) -> anyhow::Result<Duration> {
    let secs: f64 = value.parse().context("--duration")?;
    if !(secs > 0.0) {
        bail!("--duration must be positive");
    }
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => Ok(duration),
        Err(e) => bail!("--duration {}: {}", value, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1.5").unwrap(), Duration::from_millis(1500));
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("nan").is_err());
        assert!(parse_duration("inf").is_err());
        assert!(parse_duration("1e300").is_err());
    }
}
