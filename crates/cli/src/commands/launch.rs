use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use brv_launcher::{LaunchMode, LaunchOptions, XvfbMode, launch};
use tracing::info;

use crate::cli::XvfbArg;

pub struct LaunchArgs {
	pub url: String,
	pub port: u16,
	pub strict_port: bool,
	pub user_data_dir: Option<PathBuf>,
	pub browser_path: Option<PathBuf>,
	pub flags: Vec<String>,
	pub ignore_default_flags: bool,
	pub headless: bool,
	pub gui: bool,
	pub xvfb: XvfbArg,
	pub prefs_json: Option<String>,
	pub poll_interval_ms: u64,
	pub max_retries: u32,
}

pub async fn execute(args: LaunchArgs) -> Result<()> {
	let opts = build_options(args)?;
	let browser = launch(opts).await.map_err(|e| anyhow!("{}", e.explain()))?;

	println!("pid:     {}", browser.pid());
	println!("port:    {}", browser.port());
	if let Some(dir) = browser.user_data_dir() {
		println!("profile: {}", dir.display());
	}
	println!("press Ctrl-C to terminate");

	// Ctrl-C is owned by the launcher's registry handler while the
	// instance is live; this loop only notices the browser closing on
	// its own.
	loop {
		tokio::time::sleep(Duration::from_millis(500)).await;
		if browser.process_exited() {
			info!(target = "brv", "browser exited on its own, releasing resources");
			browser.kill().await.map_err(|e| anyhow!("{}", e.explain()))?;
			return Ok(());
		}
	}
}

fn build_options(args: LaunchArgs) -> Result<LaunchOptions> {
	let prefs = match args.prefs_json.as_deref() {
		Some(raw) => match serde_json::from_str(raw).context("parsing --prefs-json")? {
			serde_json::Value::Object(map) => map,
			_ => bail!("--prefs-json must be a JSON object"),
		},
		None => serde_json::Map::new(),
	};

	let mode = if args.headless {
		LaunchMode::Headless
	} else if args.gui {
		LaunchMode::Gui
	} else {
		LaunchMode::Auto
	};

	Ok(LaunchOptions {
		starting_url: args.url,
		browser_flags: args.flags,
		prefs,
		port: args.port,
		port_strict: args.strict_port,
		user_data_dir: args.user_data_dir,
		browser_path: args.browser_path,
		ignore_default_flags: args.ignore_default_flags,
		connection_poll_interval: Duration::from_millis(args.poll_interval_ms),
		max_connection_retries: args.max_retries,
		mode,
		xvfb: match args.xvfb {
			XvfbArg::Off => XvfbMode::Off,
			XvfbArg::Auto => XvfbMode::Auto,
			XvfbArg::Required => XvfbMode::Required,
		},
		..Default::default()
	})
}
