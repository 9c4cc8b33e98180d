//! Buzzer on a Linux sysfs GPIO line.
//!
//! The pin is exported on open (if not already) and configured as output.
//! `release()` drives it low and unexports it again when we exported it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::time::sleep;

use super::{Actuator, AlertPattern};
use crate::error::{Result, VitalinkError};

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// BCM pin the buzzer is wired to by default.
pub const DEFAULT_BUZZER_PIN: u32 = 18;

pub struct SysfsBuzzer {
    root: PathBuf,
    pin: u32,
    exported_by_us: bool,
    released: bool,
}

impl SysfsBuzzer {
    pub async fn open(pin: u32) -> Result<Self> {
        Self::open_at(SYSFS_GPIO_ROOT, pin).await
    }

    /// Open under an alternative sysfs root.
    pub async fn open_at(root: impl AsRef<Path>, pin: u32) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let pin_dir = root.join(format!("gpio{}", pin));

        let mut exported_by_us = false;
        if fs::metadata(&pin_dir).await.is_err() {
            write_attr(&root.join("export"), &pin.to_string()).await?;
            exported_by_us = true;
        }
        write_attr(&pin_dir.join("direction"), "out").await?;

        let buzzer = Self {
            root,
            pin,
            exported_by_us,
            released: false,
        };
        buzzer.set(false).await?;
        log::info!("[Buzzer] GPIO {} ready", pin);
        Ok(buzzer)
    }

    fn value_path(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin)).join("value")
    }

    async fn set(&self, high: bool) -> Result<()> {
        write_attr(&self.value_path(), if high { "1" } else { "0" }).await
    }
}

async fn write_attr(path: &Path, value: &str) -> Result<()> {
    fs::write(path, value)
        .await
        .map_err(|e| VitalinkError::Actuator(format!("{}: {}", path.display(), e)))
}

#[async_trait]
impl Actuator for SysfsBuzzer {
    async fn signal(&mut self, pattern: AlertPattern) -> Result<()> {
        if self.released {
            return Err(VitalinkError::Actuator(format!("GPIO {} already released", self.pin)));
        }
        for _ in 0..pattern.pulses {
            self.set(true).await?;
            sleep(pattern.on).await;
            self.set(false).await?;
            sleep(pattern.off).await;
        }
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.set(false).await?;
        if self.exported_by_us {
            write_attr(&self.root.join("unexport"), &self.pin.to_string()).await?;
        }
        log::info!("[Buzzer] GPIO {} released", self.pin);
        Ok(())
    }
}
