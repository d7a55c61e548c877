//! Ordered composition of hardware configuration concerns.
//!
//! A chain is an explicit list of [`HwConfig`] objects. Configuring walks the
//! list front to back, deconfiguring walks it back to front, describing walks
//! it front to back again. Every hook is awaited before the next one starts.
//!
//! # Example
//!
//! ```ignore
//! use hwconf::chain::HwConfigChain;
//! use hwconf::concerns::{MtuConfig, MtuParams};
//! use hwconf::record::HwConfigRecord;
//!
//! let chain = HwConfigChain::new()
//!     .with(MtuConfig::new(devices, MtuParams { mtu: Some(9000) }));
//!
//! let mut record = HwConfigRecord::new();
//! let outcome = chain
//!     .run(&mut record, || async {
//!         // measure something
//!         Ok(())
//!     })
//!     .await;
//! outcome.into_result()?;
//! ```

use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::record::{ConcernKey, HwConfigRecord};

/// One hardware tunable with reversible configuration.
#[async_trait]
pub trait HwConfig: Send + Sync + fmt::Debug {
    /// Key under which the concern records its state.
    fn key(&self) -> ConcernKey;

    /// Apply the tunable and record what is needed to undo it.
    ///
    /// Must be a no-op that records nothing when the parameter is absent or
    /// the concern has no target devices.
    async fn configure(&self, record: &mut HwConfigRecord) -> Result<()>;

    /// Undo whatever [`HwConfig::configure`] recorded and consume the record.
    async fn deconfigure(&self, record: &mut HwConfigRecord) -> Result<()>;

    /// Human readable lines describing the recorded configuration.
    fn describe(&self, record: &HwConfigRecord) -> Vec<String>;

    /// Human readable lines describing what configure would do.
    fn plan(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Failure of one concern during deconfiguration.
#[derive(Debug)]
pub struct DeconfigureError {
    /// The concern that failed.
    pub concern: ConcernKey,
    /// The error.
    pub error: Error,
}

impl fmt::Display for DeconfigureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.concern, self.error)
    }
}

/// Result of deconfiguring a chain.
#[derive(Debug, Default)]
pub struct DeconfigureReport {
    /// Concerns deconfigured without error, in deconfigure order.
    pub deconfigured: Vec<ConcernKey>,
    /// Concerns that failed.
    pub errors: Vec<DeconfigureError>,
}

impl DeconfigureReport {
    /// Check if every concern was restored.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert to a Result, returning the first failure.
    pub fn into_result(self) -> Result<()> {
        match self.errors.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(()),
        }
    }
}

/// Outcome of [`HwConfigChain::run`].
#[derive(Debug)]
pub struct RunOutcome<T> {
    /// Result of configure and the body, in that precedence.
    pub result: Result<T>,
    /// What happened while deconfiguring.
    pub deconfigure: DeconfigureReport,
}

impl<T> RunOutcome<T> {
    /// The body's result, or the first deconfigure failure if the body succeeded.
    pub fn into_result(self) -> Result<T> {
        let value = self.result?;
        self.deconfigure.into_result()?;
        Ok(value)
    }
}

/// An ordered list of concerns.
#[derive(Debug, Default)]
pub struct HwConfigChain {
    concerns: Vec<Box<dyn HwConfig>>,
}

impl HwConfigChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a concern.
    pub fn with(mut self, concern: impl HwConfig + 'static) -> Self {
        self.push(Box::new(concern));
        self
    }

    /// Append a boxed concern.
    pub fn push(&mut self, concern: Box<dyn HwConfig>) {
        self.concerns.push(concern);
    }

    /// Number of concerns.
    pub fn len(&self) -> usize {
        self.concerns.len()
    }

    /// Check if the chain has no concerns.
    pub fn is_empty(&self) -> bool {
        self.concerns.is_empty()
    }

    /// Concern keys in configure order.
    pub fn keys(&self) -> Vec<ConcernKey> {
        self.concerns.iter().map(|c| c.key()).collect()
    }

    /// Configure every concern in order.
    ///
    /// Stops at the first failure; concerns configured before it stay in the
    /// record so [`HwConfigChain::deconfigure`] can undo them.
    pub async fn configure(&self, record: &mut HwConfigRecord) -> Result<()> {
        for concern in &self.concerns {
            let key = concern.key();
            if record.contains(key) {
                return Err(Error::AlreadyConfigured {
                    concern: key.to_string(),
                });
            }

            concern.configure(record).await.inspect_err(|e| {
                tracing::warn!(concern = %key, error = %e, "configure failed");
            })?;
            if record.contains(key) {
                tracing::info!(concern = %key, "configured");
            } else {
                tracing::debug!(concern = %key, "skipped");
            }
        }
        Ok(())
    }

    /// Deconfigure every concern in reverse order.
    ///
    /// Never stops early: each failure is logged and collected in the report.
    pub async fn deconfigure(&self, record: &mut HwConfigRecord) -> DeconfigureReport {
        let mut report = DeconfigureReport::default();

        for concern in self.concerns.iter().rev() {
            let key = concern.key();
            let was_configured = record.contains(key);

            match concern.deconfigure(record).await {
                Ok(()) => {
                    if was_configured {
                        tracing::info!(concern = %key, "deconfigured");
                        report.deconfigured.push(key);
                    }
                }
                Err(error) => {
                    tracing::warn!(concern = %key, %error, "deconfigure failed");
                    report.errors.push(DeconfigureError {
                        concern: key,
                        error,
                    });
                }
            }
        }

        report
    }

    /// Describe the recorded configuration, one concern after another.
    pub fn describe(&self, record: &HwConfigRecord) -> Vec<String> {
        self.concerns
            .iter()
            .flat_map(|concern| concern.describe(record))
            .collect()
    }

    /// Describe what configuring would do.
    pub fn plan(&self) -> Vec<String> {
        self.concerns.iter().flat_map(|concern| concern.plan()).collect()
    }

    /// Configure, run `body`, then deconfigure whatever was configured.
    ///
    /// Deconfiguration happens even when configure or the body fails. The
    /// body only runs if configure succeeded.
    pub async fn run<T, F, Fut>(&self, record: &mut HwConfigRecord, body: F) -> RunOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let result = match self.configure(record).await {
            Ok(()) => body().await,
            Err(e) => Err(e),
        };
        let deconfigure = self.deconfigure(record).await;
        RunOutcome {
            result,
            deconfigure,
        }
    }
}
