use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;

use thermal_rig::{
    camera_enumerator::enumerate_cameras,
    vendor_sdk::{SimDeviceSpec, SimulatedVendorSdk},
    zone::{zone_base_path, Heater, MockHeater, ZoneCoordinates, ZoneCycle, ZonePhase, ZoneTiming},
    CameraEvent, CameraEventSink, CameraFactory, CameraRegistry, LogEventSink, RigSettings,
};

// Upper bound on a single sleep so Ctrl-C is noticed promptly.
const MAX_IDLE: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about = "Records one inspection zone on the dual-camera thermal rig")]
struct Args {
    /// Settings file, defaults to the per-user config location
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory receiving the zone recordings
    #[arg(long, default_value = "recordings")]
    save_dir: PathBuf,

    /// Name of the inspected object, used in file names
    #[arg(long, default_value = "object")]
    object: String,

    /// Zone coordinates as X,Y
    #[arg(long, default_value = "0,0")]
    zone: ZoneCoordinates,

    /// Use the simulated vendor SDK for the visible camera
    #[arg(long)]
    simulate_vendor: bool,

    /// Print the video devices found on this machine and exit
    #[arg(long)]
    list_cameras: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_cameras {
        let cameras = enumerate_cameras()?;
        if cameras.is_empty() {
            println!("No video devices found");
        }
        for camera in cameras {
            println!("{}", camera);
        }
        return Ok(());
    }

    let settings = match &args.settings {
        Some(path) => RigSettings::load_from(path)?,
        None => RigSettings::load()?,
    };

    let mut factory = CameraFactory::new(settings.clone());
    if args.simulate_vendor {
        factory = factory.with_vendor_sdk(Arc::new(SimulatedVendorSdk::new(vec![
            SimDeviceSpec::color("Simulated BFS-U3-16S2C"),
        ])));
    }

    let (event_sender, event_receiver) = mpsc::channel::<CameraEvent>();
    let mut registry = factory.create_registry(Arc::new(event_sender))?;

    for (name, ok) in registry.initialize_all(Instant::now()) {
        if !ok {
            log::warn!("{} camera is not available, continuing without it", name);
        }
    }

    let abort_requested = Arc::new(AtomicBool::new(false));
    {
        let abort_requested = abort_requested.clone();
        ctrlc::set_handler(move || abort_requested.store(true, Ordering::SeqCst))
            .context("failed to set Ctrl-C handler")?;
    }

    #[cfg(feature = "hotplug")]
    let hotplug_events = thermal_rig::hotplug_detector::run_hotplug_detector()
        .inspect_err(|err| log::warn!("USB hotplug detection disabled: {}", err))
        .ok();

    if !settings.mock_heater {
        log::warn!("No heater controller attached, using the mock heater");
    }
    let heater: Box<dyn Heater> = Box::new(MockHeater::new());

    let base = zone_base_path(&args.save_dir, &args.object, args.zone);
    let mut zone = ZoneCycle::new(base, ZoneTiming::from_settings(&settings), heater);
    if let Err(err) = zone.start(&mut registry, Instant::now()) {
        drain_events(&event_receiver);
        registry.release_all();
        return Err(err).context("failed to start the zone");
    }
    for path in zone.files() {
        log::info!("Recording to {}", path.display());
    }

    loop {
        let now = Instant::now();
        registry.tick(now);
        drain_events(&event_receiver);

        #[cfg(feature = "hotplug")]
        if let Some(events) = &hotplug_events {
            let arrived = events.try_iter().any(|event| {
                matches!(
                    event,
                    thermal_rig::hotplug_detector::HotplugEvent::DeviceArrived { .. }
                )
            });
            if arrived {
                registry.expedite_reconnects(now);
            }
        }

        if abort_requested.load(Ordering::SeqCst) {
            let deleted = zone.abort(&mut registry);
            log::warn!("Zone aborted, deleted {} file(s)", deleted.len());
            break;
        }
        if zone.tick(&mut registry, now) == ZonePhase::Completed {
            break;
        }

        sleep_until_next_deadline(&registry, &zone, now);
    }

    registry.release_all();
    drain_events(&event_receiver);
    Ok(())
}

fn drain_events(receiver: &mpsc::Receiver<CameraEvent>) {
    for event in receiver.try_iter() {
        LogEventSink.notify(event);
    }
}

fn sleep_until_next_deadline(registry: &CameraRegistry, zone: &ZoneCycle, now: Instant) {
    let wake = [
        registry.next_deadline(),
        zone.next_deadline(),
        Some(now + MAX_IDLE),
    ]
    .into_iter()
    .flatten()
    .min()
    .unwrap_or(now + MAX_IDLE);
    thread::sleep(wake.saturating_duration_since(Instant::now()));
}
