use std::{sync::mpsc, thread};

use rusb::{Context, Device, HotplugBuilder, UsbContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugEvent {
    DeviceArrived { vendor_id: u16, product_id: u16 },
    DeviceLeft { vendor_id: u16, product_id: u16 },
}

struct HotplugDetector {
    evt_sender: mpsc::Sender<HotplugEvent>,
}

fn vid_pid<T: UsbContext>(device: &Device<T>) -> (u16, u16) {
    device
        .device_descriptor()
        .map(|d| (d.vendor_id(), d.product_id()))
        .unwrap_or((0, 0))
}

impl<T: UsbContext> rusb::Hotplug<T> for HotplugDetector {
    fn device_arrived(&mut self, device: Device<T>) {
        let (vendor_id, product_id) = vid_pid(&device);
        log::debug!("USB device arrived: {:04x}:{:04x}", vendor_id, product_id);
        let _ = self.evt_sender.send(HotplugEvent::DeviceArrived {
            vendor_id,
            product_id,
        });
    }

    fn device_left(&mut self, device: Device<T>) {
        let (vendor_id, product_id) = vid_pid(&device);
        log::debug!("USB device left: {:04x}:{:04x}", vendor_id, product_id);
        let _ = self.evt_sender.send(HotplugEvent::DeviceLeft {
            vendor_id,
            product_id,
        });
    }
}

///
/// Watches USB arrivals and removals on a background thread.
/// Devices already present are not reported, only changes.
///
/// The rig uses arrivals to retry disconnected cameras right away instead of
/// waiting for the next reconnect interval.
///
pub fn run_hotplug_detector() -> Result<mpsc::Receiver<HotplugEvent>, anyhow::Error> {
    if !rusb::has_hotplug() {
        return Err(anyhow::anyhow!("USB hotplug not supported on this system"));
    }
    let (sender, receiver) = mpsc::channel::<HotplugEvent>();
    let context = Context::new()?;
    let reg: rusb::Registration<Context> = HotplugBuilder::new()
        .enumerate(false)
        .register(&context, Box::new(HotplugDetector { evt_sender: sender }))?;
    thread::spawn(move || {
        loop {
            if let Err(err) = context.handle_events(None) {
                log::error!("error handling libusb events: {:?}", err);
                break;
            }
        }
        context.unregister_callback(reg);
    });

    Ok(receiver)
}
