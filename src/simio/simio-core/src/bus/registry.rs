use std::collections::BTreeMap;

use crate::args::ArgTokens;
use crate::bus::mods::SimioDevice;
use crate::bus::sfr::SfrBank;

pub use crate::error::BoxError as CreateError;

/// Factory building a device attached to the given register bank
pub type CreateFn =
    Box<dyn Fn(&SfrBank, &mut ArgTokens<'_>) -> Result<Box<dyn SimioDevice>, CreateError>>;

/// A named kind of device the host can attach
pub struct DeviceClass {
    name: &'static str,
    help: &'static str,
    create: CreateFn,
}

impl DeviceClass {
    pub fn new<F>(name: &'static str, help: &'static str, create: F) -> Self
    where
        F: Fn(&SfrBank, &mut ArgTokens<'_>) -> Result<Box<dyn SimioDevice>, CreateError> + 'static,
    {
        Self {
            name,
            help,
            create: Box::new(create),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn help(&self) -> &'static str {
        self.help
    }

    pub fn create(
        &self,
        sfr: &SfrBank,
        args: &mut ArgTokens<'_>,
    ) -> Result<Box<dyn SimioDevice>, CreateError> {
        (self.create)(sfr, args)
    }
}

/// Device classes keyed by (case-insensitive) name
#[derive(Default)]
pub struct Registry {
    classes: BTreeMap<String, DeviceClass>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, replacing any previous class of the same name
    pub fn register(&mut self, class: DeviceClass) {
        self.classes.insert(class.name.to_ascii_lowercase(), class);
    }

    pub fn get(&self, name: &str) -> Option<&DeviceClass> {
        self.classes.get(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.classes.values().map(|class| class.name)
    }
}
