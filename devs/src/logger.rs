//! A logger that accumulates formatted records in a shared buffer.
//!
//! The buffer can be drained at any point, which lets tests and embedding applications inspect
//! what the kernel logged during a run, e.g., the outputs leaving the root model.
//!
//! # Examples
//!
//! Calling [`LoggerBuilder::init`] more than once is not an error: only the first call installs
//! the logger, the following ones do nothing.
//! ```
//! # use devs::logger;
//! # fn main() -> eyre::Result<()> {
//! logger::LoggerBuilder::default()
//!     .level(log::LevelFilter::Debug)
//!     .init()?;
//! log::info!("Info message");
//! log::debug!("Debug message");
//! log::trace!("Trace message");
//! log::warn!("Warn message");
//! assert_eq!(
//!     logger::clear()?,
//!     vec![
//!         String::from("[INFO]  Info message"),
//!         String::from("[DEBUG] Debug message"),
//!         String::from("[WARN]  Warn message"),
//!     ]
//! );
//! log::error!("Following message");
//! assert_eq!(
//!     logger::clear()?,
//!     vec![String::from("[ERROR] Following message")]
//! );
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use eyre::eyre;
use log::LevelFilter;

lazy_static::lazy_static! {
    static ref LOG_BUFFER: Arc<RwLock<Vec<String>>> = Arc::new(RwLock::new(Vec::new()));
    static ref BUFFER_INITIALIZED: RwLock<bool> = RwLock::new(false);
}

/// Builds a buffered logger.
#[derive(Debug)]
pub struct LoggerBuilder {
    level: LevelFilter,
    target: Option<String>,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            level: LevelFilter::Warn,
            target: None,
        }
    }
}

impl LoggerBuilder {
    /// Sets level filter.
    #[must_use]
    pub fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Only keeps records whose target starts with `target`, e.g., `devs`.
    #[must_use]
    pub fn target<S: Into<String>>(mut self, target: S) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Installs the buffered logger as the global logger, unless it has already been installed.
    ///
    /// # Errors
    ///
    /// Fails if another logger has already been installed, or if a lock is poisoned.
    pub fn init(self) -> eyre::Result<()> {
        let mut initialized = BUFFER_INITIALIZED
            .write()
            .map_err(|err| eyre!("{:?}", err))?;
        if *initialized {
            return Ok(());
        }
        let buffer = Arc::clone(&LOG_BUFFER);
        let mut dispatch = fern::Dispatch::new()
            .level(self.level)
            .chain(fern::Output::call(move |record| {
                buffer
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(format!(
                        "{:7} {}",
                        format!("[{}]", record.level()),
                        record.args()
                    ));
            }));
        if let Some(target) = self.target {
            dispatch = dispatch.filter(move |metadata| metadata.target().starts_with(&target));
        }
        dispatch.apply()?;
        *initialized = true;
        Ok(())
    }
}

/// Clears the log buffer and returns its contents.
///
/// # Errors
///
/// Fails if the buffer lock is poisoned.
pub fn clear() -> eyre::Result<Vec<String>> {
    let mut handle = LOG_BUFFER.write().map_err(|err| eyre!("{:?}", err))?;
    Ok(handle.drain(..).collect())
}
