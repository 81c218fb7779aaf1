pub mod mods;
pub mod registry;
pub mod sfr;

use log::{debug, error};

use self::mods::{SimioDevice, WriteAccess};
use self::registry::Registry;
use self::sfr::SfrBank;
use crate::args::ArgTokens;
use crate::error::Error;
use crate::Address;

/// Simulated IO bus: SFR block plus an ordered set of named devices
///
/// Accesses outside the SFR block are offered to devices in attach order.
pub struct Simio {
    sfr: SfrBank,
    registry: Registry,
    devices: Vec<(String, Box<dyn SimioDevice>)>,
}

impl Simio {
    pub fn new(registry: Registry) -> Self {
        Self {
            sfr: SfrBank::new(),
            registry,
            devices: Vec::new(),
        }
    }

    pub fn sfr(&self) -> &SfrBank {
        &self.sfr
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Names of attached devices, in attach order
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|(name, _)| name.as_str())
    }

    fn find_mut(&mut self, name: &str) -> Result<&mut Box<dyn SimioDevice>, Error> {
        self.devices
            .iter_mut()
            .find(|(dev_name, _)| dev_name == name)
            .map(|(_, dev)| dev)
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))
    }

    /// Create a device of class `class` and attach it as `name`
    pub fn add(&mut self, class: &str, name: &str, args: &mut ArgTokens<'_>) -> Result<(), Error> {
        if self.devices.iter().any(|(dev_name, _)| dev_name == name) {
            return Err(Error::DuplicateName(name.to_string()));
        }

        let class_entry = self
            .registry
            .get(class)
            .ok_or_else(|| Error::UnknownClass(class.to_string()))?;

        let device = class_entry.create(&self.sfr, args).map_err(|source| {
            error!("{}: can't create {} device: {}", name, class, source);
            Error::Create {
                class: class.to_string(),
                source,
            }
        })?;

        debug!("Attached {} device as {}", class_entry.name(), name);
        self.devices.push((name.to_string(), device));
        Ok(())
    }

    /// Detach and destroy a device
    pub fn del(&mut self, name: &str) -> Result<(), Error> {
        let idx = self
            .devices
            .iter()
            .position(|(dev_name, _)| dev_name == name)
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))?;
        self.devices.remove(idx);
        debug!("Detached device {}", name);
        Ok(())
    }

    pub fn config(&mut self, name: &str, param: &str, args: &mut ArgTokens<'_>) -> Result<(), Error> {
        let device = self.find_mut(name)?;
        device.config(param, args).map_err(|source| {
            error!("{}: {}", name, source);
            Error::Config {
                device: name.to_string(),
                source,
            }
        })
    }

    pub fn info(&self, name: &str) -> Result<String, Error> {
        self.devices
            .iter()
            .find(|(dev_name, _)| dev_name == name)
            .map(|(_, dev)| dev.info())
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))
    }

    /// Simulator reset: clear the SFR block, then reset every device
    pub fn reset(&mut self) {
        self.sfr.reset();
        for (_, device) in self.devices.iter_mut() {
            device.reset();
        }
    }

    /// Byte write from the simulated CPU
    pub fn write_b(&mut self, addr: Address, data: u8) -> Result<(), Error> {
        debug!("Bus write 0x{:04x} <- 0x{:02x}", addr, data);
        if self.sfr.write_addr(addr, data) {
            return Ok(());
        }

        for (name, device) in self.devices.iter_mut() {
            let access = device.write_b(addr, data).map_err(|source| Error::Device {
                device: name.clone(),
                source,
            })?;
            if access == WriteAccess::Handled {
                break;
            }
        }
        Ok(())
    }

    /// Byte read from the simulated CPU, `None` when nothing maps `addr`
    pub fn read_b(&mut self, addr: Address) -> Result<Option<u8>, Error> {
        if let Some(data) = self.sfr.read_addr(addr) {
            return Ok(Some(data));
        }

        for (name, device) in self.devices.iter_mut() {
            let data = device.read_b(addr).map_err(|source| Error::Device {
                device: name.clone(),
                source,
            })?;
            if data.is_some() {
                debug!("Bus read 0x{:04x} -> {:02x?} ({})", addr, data, name);
                return Ok(data);
            }
        }
        Ok(None)
    }
}
