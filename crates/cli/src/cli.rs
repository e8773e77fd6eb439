use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "brv")]
#[command(about = "Brave launcher - spawn a debuggable browser from the command line")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Launch a browser and keep it alive until Ctrl-C
	Launch {
		/// Starting URL
		#[arg(default_value = "about:blank")]
		url: String,

		/// Fixed debugging port; 0 auto-allocates an ephemeral one
		#[arg(short, long, default_value = "0")]
		port: u16,

		/// Fail instead of launching when nothing listens on --port
		#[arg(long)]
		strict_port: bool,

		/// Profile directory (default: disposable temp profile)
		#[arg(long, value_name = "DIR")]
		user_data_dir: Option<PathBuf>,

		/// Browser binary (default: discovered installation)
		#[arg(long, value_name = "PATH")]
		browser_path: Option<PathBuf>,

		/// Extra browser flag; repeatable
		#[arg(long = "flag", value_name = "FLAG", allow_hyphen_values = true)]
		flags: Vec<String>,

		/// Drop the built-in default flag list
		#[arg(long)]
		ignore_default_flags: bool,

		/// Force headless mode
		#[arg(long, conflicts_with = "gui")]
		headless: bool,

		/// Force a visible window
		#[arg(long)]
		gui: bool,

		/// Virtual display policy for display-less hosts
		#[arg(long, value_enum, default_value = "off")]
		xvfb: XvfbArg,

		/// Preference overrides as a JSON object
		#[arg(long, value_name = "JSON")]
		prefs_json: Option<String>,

		/// Readiness poll interval in milliseconds
		#[arg(long, default_value = "500")]
		poll_interval_ms: u64,

		/// Readiness retries after the initial attempt
		#[arg(long, default_value = "50")]
		max_retries: u32,
	},

	/// List discovered browser installations, highest priority first
	#[command(alias = "ls")]
	Installations,

	/// Print the default flag list
	Flags,
}

#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum XvfbArg {
	#[default]
	Off,
	Auto,
	Required,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_plain_launch() {
		let cli = Cli::try_parse_from(["brv", "launch"]).unwrap();
		match cli.command {
			Commands::Launch { url, port, strict_port, .. } => {
				assert_eq!(url, "about:blank");
				assert_eq!(port, 0);
				assert!(!strict_port);
			}
			_ => panic!("expected Launch"),
		}
	}

	#[test]
	fn parse_launch_with_port_and_flags() {
		let cli = Cli::try_parse_from([
			"brv",
			"launch",
			"https://example.com",
			"--port",
			"9222",
			"--strict-port",
			"--flag",
			"--incognito",
			"--flag",
			"--mute-audio",
		])
		.unwrap();
		match cli.command {
			Commands::Launch { url, port, strict_port, flags, .. } => {
				assert_eq!(url, "https://example.com");
				assert_eq!(port, 9222);
				assert!(strict_port);
				assert_eq!(flags, vec!["--incognito", "--mute-audio"]);
			}
			_ => panic!("expected Launch"),
		}
	}

	#[test]
	fn headless_and_gui_conflict() {
		assert!(Cli::try_parse_from(["brv", "launch", "--headless", "--gui"]).is_err());
	}

	#[test]
	fn installations_alias_parses() {
		let cli = Cli::try_parse_from(["brv", "ls"]).unwrap();
		assert!(matches!(cli.command, Commands::Installations));
	}

	#[test]
	fn verbose_counts_occurrences() {
		let cli = Cli::try_parse_from(["brv", "-vv", "flags"]).unwrap();
		assert_eq!(cli.verbose, 2);
	}
}
