#[cfg(feature = "tracing")]
use tracing::debug;

use crate::{Error, Result};

/// The three host load-average samples (1, 5 and 15 minute windows).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

/// A source of host load averages.
///
/// The server queries it once per `<loadavg/>` request. Implemented for
/// [`SystemLoad`] and for any `Fn() -> Result<LoadAverage>`, which keeps
/// tests free of host state.
pub trait LoadSource {
    fn load_average(&self) -> Result<LoadAverage>;
}

impl<F> LoadSource for F
where
    F: Fn() -> Result<LoadAverage>,
{
    fn load_average(&self) -> Result<LoadAverage> {
        self()
    }
}

/// Reads load averages from the running host.
///
/// * Linux: `/proc/loadavg`.
/// * macOS: `sysctl -n vm.loadavg`.
/// * Elsewhere: always [`Error::LoadAverageUnavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoad;

impl LoadSource for SystemLoad {
    fn load_average(&self) -> Result<LoadAverage> {
        let load = read_load_average()?;

        #[cfg(feature = "tracing")]
        debug!("Host load average: {:?}", load);

        Ok(load)
    }
}

#[cfg(target_os = "linux")]
fn read_load_average() -> Result<LoadAverage> {
    let contents = std::fs::read_to_string("/proc/loadavg")?;
    parse_samples(&contents).ok_or(Error::LoadAverageUnavailable)
}

/// Output format: `{ 2.49 2.15 2.12 }`
#[cfg(target_os = "macos")]
fn read_load_average() -> Result<LoadAverage> {
    let output = std::process::Command::new("sysctl")
        .args(["-n", "vm.loadavg"])
        .output()?;

    let text = String::from_utf8_lossy(&output.stdout);
    let trimmed = text
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}');
    parse_samples(trimmed).ok_or(Error::LoadAverageUnavailable)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn read_load_average() -> Result<LoadAverage> {
    Err(Error::LoadAverageUnavailable)
}

/// Parses the first three whitespace-separated floats of `text`.
#[cfg_attr(
    not(any(target_os = "linux", target_os = "macos")),
    allow(dead_code)
)]
fn parse_samples(text: &str) -> Option<LoadAverage> {
    let mut fields = text.split_whitespace().map(|f| f.parse::<f64>().ok());
    Some(LoadAverage {
        one: fields.next()??,
        five: fields.next()??,
        fifteen: fields.next()??,
    })
}
