//! SensorTag Key-Press to Pointer Bridge
//!
//! Main entry point and run loop.

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use zbus::fdo::{DBusProxy, NameOwnerChanged, NameOwnerChangedStream};
use zbus::Connection;

use sensortag_hid::bluez;
use sensortag_hid::hid::{VirtualPointer, DEFAULT_DEVICE_NAME};
use sensortag_hid::scan::{self, DiscoveredCharacteristic};
use sensortag_hid::{BridgeError, Session};

/// Well-known name claimed on the system bus, so the bridge shows up
/// identifiably in bus listings.
const OWN_BUS_NAME: &str = "demo.sensortag.hid";

#[derive(Parser)]
#[command(name = "sensortag-hid")]
#[command(about = "Bridges TI SensorTag key presses into a virtual pointer device")]
struct Cli {
    /// Name of the virtual pointer device
    #[arg(long, default_value = DEFAULT_DEVICE_NAME)]
    device_name: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Connect to the system bus and claim our name there
    let conn = Connection::system().await?;
    conn.request_name(OWN_BUS_NAME).await?;
    info!("Acquired bus name {}", OWN_BUS_NAME);

    // Watch first, then probe, so a bluetoothd arriving in between is
    // not missed.
    let dbus = DBusProxy::new(&conn).await?;
    let mut bluez_owner_changes = dbus
        .receive_name_owner_changed_with_args(&[(0, bluez::BUS_NAME)])
        .await?;
    if !dbus.name_has_owner(bluez::BUS_NAME.try_into()?).await? {
        info!("Waiting for {} to appear on the bus", bluez::BUS_NAME);
        wait_for_owner(&mut bluez_owner_changes).await?;
    }

    // Find the key-press characteristic in the BlueZ object tree
    let objects = bluez::managed_objects(&conn).await?;
    let target = scan::find_characteristic(&objects, scan::KEY_PRESS_DATA_UUID).ok_or_else(|| {
        BridgeError::CharacteristicNotFound(scan::KEY_PRESS_DATA_UUID.to_string())
    })?;
    info!("Found key-press characteristic at {}", target.path);
    info!("SensorTag device at {}", target.device_path);

    let mut session = Session::new(conn.clone());
    let mut pointer: Option<VirtualPointer> = None;

    let outcome = run(
        &mut session,
        &mut pointer,
        &target,
        &cli,
        &mut bluez_owner_changes,
    )
    .await;

    // Teardown runs on every exit path, success or error
    session.shutdown().await;
    if let Some(mut pointer) = pointer {
        info!("Destroying virtual pointer");
        pointer.close();
    }

    outcome
}

/// Bridge loop: pump key events into the pointer until a stop condition.
async fn run(
    session: &mut Session,
    pointer_slot: &mut Option<VirtualPointer>,
    target: &DiscoveredCharacteristic,
    cli: &Cli,
    bluez_owner_changes: &mut NameOwnerChangedStream,
) -> Result<()> {
    // Install signal handling before any BlueZ setup; a termination
    // request during a stalling connect must still reach the teardown
    // path instead of killing the process outright.
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = session.establish(target) => result?,
        _ = sigint.recv() => {
            info!("Received SIGINT during setup, shutting down");
            return Ok(());
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM during setup, shutting down");
            return Ok(());
        }
    }

    // Create the virtual pointer only once the subscription stands
    let created = VirtualPointer::create(&cli.device_name).map_err(BridgeError::Pointer)?;
    info!("Created virtual pointer: {}", cli.device_name);
    let pointer = pointer_slot.insert(created);
    if let Some(path) = pointer.device_path() {
        info!("Device path: {}", path.display());
    }

    // Main loop
    info!("Entering main loop. Press Ctrl+C to exit.");

    loop {
        tokio::select! {
            // Key presses from the SensorTag
            event = session.next_event() => {
                match event {
                    Some(event) => {
                        if let Err(e) = pointer.emit(event.left, event.right) {
                            warn!("Failed to emit pointer event: {}", e);
                        }
                    }
                    None => {
                        warn!("Notification stream ended");
                        break;
                    }
                }
            }

            // bluetoothd going away takes the session with it
            change = bluez_owner_changes.next() => {
                match change {
                    Some(change) if bluez_owner_lost(&change) => {
                        warn!("{} vanished from the bus, shutting down", bluez::BUS_NAME);
                        break;
                    }
                    Some(_) => {}
                    None => {
                        warn!("Bus connection closed");
                        break;
                    }
                }
            }

            // Shutdown signals
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// True when the change reports the BlueZ name losing its owner.
fn bluez_owner_lost(change: &NameOwnerChanged) -> bool {
    match change.args() {
        Ok(args) => args.old_owner().is_some() && args.new_owner().is_none(),
        Err(_) => false,
    }
}

/// Block until the BlueZ name gains an owner.
async fn wait_for_owner(changes: &mut NameOwnerChangedStream) -> Result<()> {
    while let Some(change) = changes.next().await {
        if change.args()?.new_owner().is_some() {
            info!("{} appeared on the bus", bluez::BUS_NAME);
            return Ok(());
        }
    }
    anyhow::bail!("Bus connection closed while waiting for {}", bluez::BUS_NAME)
}
