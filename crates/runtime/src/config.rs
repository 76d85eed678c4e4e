//! Session configuration.
//!
//! The host identifies a client by the query string of the connection URL:
//! `ws://<url_base>?os=..&app=..&device=..&device_id=..`. These values are
//! static for the life of the process and are collected once into a
//! [`DeviceInfo`].

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::{Endpoint, TransportError};

/// Default host address of the desktop app.
pub const DEFAULT_URL_BASE: &str = "localhost:8333";

/// `Origin` header value the desktop app accepts.
pub const DEFAULT_ORIGIN: &str = "localhost:";

/// Static identification sent with every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
	pub os: String,
	pub app: String,
	pub device: String,
	pub device_id: String,
}

impl DeviceInfo {
	pub fn new(
		os: impl Into<String>,
		app: impl Into<String>,
		device: impl Into<String>,
		device_id: impl Into<String>,
	) -> Self {
		Self {
			os: os.into(),
			app: app.into(),
			device: device.into(),
			device_id: device_id.into(),
		}
	}

	/// Best-effort values for the current process.
	///
	/// - `os`: platform name (`Linux`, `MacOS`, `Windows`, ...)
	/// - `app`: executable file stem
	/// - `device`: `HOSTNAME`/`COMPUTERNAME`, else `Host`
	/// - `device_id`: `<app version>` + device, so reinstalls of a new version show up separately
	pub fn detect() -> Self {
		let os = match std::env::consts::OS {
			"linux" => "Linux",
			"macos" => "MacOS",
			"windows" => "Windows",
			"ios" => "iOS",
			"android" => "Android",
			other => other,
		};
		let app = std::env::current_exe()
			.ok()
			.and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
			.unwrap_or_else(|| "app".to_string());
		let device = std::env::var("HOSTNAME")
			.or_else(|_| std::env::var("COMPUTERNAME"))
			.unwrap_or_else(|_| "Host".to_string());
		let device_id = format!("{}{}", env!("CARGO_PKG_VERSION"), device);

		Self::new(os, app, device, device_id)
	}

	/// Query parameters in the order the host documents them.
	pub fn query_pairs(&self) -> [(&'static str, &str); 4] {
		[
			("os", self.os.as_str()),
			("app", self.app.as_str()),
			("device", self.device.as_str()),
			("device_id", self.device_id.as_str()),
		]
	}
}

/// Bounded reconnect schedule.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
	/// Delay before each reconnect attempt.
	pub interval: Duration,
	/// Consecutive failed attempts allowed since the last successful connection.
	pub max_attempts: u32,
	/// Errors retried without consuming an attempt.
	pub always_retry: fn(&TransportError) -> bool,
}

impl Default for ReconnectPolicy {
	fn default() -> Self {
		Self {
			interval: Duration::from_secs(5),
			max_attempts: 5,
			always_retry: TransportError::is_always_retryable,
		}
	}
}

impl ReconnectPolicy {
	/// Policy that never reconnects automatically.
	pub fn disabled() -> Self {
		Self {
			max_attempts: 0,
			always_retry: |_| false,
			..Self::default()
		}
	}

	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts;
		self
	}
}

/// Everything the session needs to reach the host.
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// `host:port` of the desktop app, without scheme.
	pub url_base: String,
	pub origin: String,
	pub device: DeviceInfo,
	pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			url_base: DEFAULT_URL_BASE.to_string(),
			origin: DEFAULT_ORIGIN.to_string(),
			device: DeviceInfo::detect(),
			reconnect: ReconnectPolicy::default(),
		}
	}
}

impl SessionConfig {
	pub fn with_url_base(mut self, url_base: impl Into<String>) -> Self {
		self.url_base = url_base.into();
		self
	}

	pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
		self.origin = origin.into();
		self
	}

	pub fn with_device(mut self, device: DeviceInfo) -> Self {
		self.device = device;
		self
	}

	pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
		self.reconnect = reconnect;
		self
	}

	/// Builds the connection URL.
	pub fn url(&self) -> Result<Url> {
		let raw = format!("ws://{}", self.url_base);
		let mut url = Url::parse(&raw).map_err(|e| Error::InvalidUrl {
			url: raw.clone(),
			reason: e.to_string(),
		})?;
		if url.host_str().is_none_or(str::is_empty) {
			return Err(Error::InvalidUrl {
				url: raw,
				reason: "missing host".to_string(),
			});
		}
		url.query_pairs_mut().extend_pairs(self.device.query_pairs());
		Ok(url)
	}

	pub fn endpoint(&self) -> Result<Endpoint> {
		Ok(Endpoint {
			url: self.url()?,
			origin: self.origin.clone(),
		})
	}
}
