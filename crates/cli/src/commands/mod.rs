mod launch;

use anyhow::Result;

use crate::cli::Commands;

pub async fn dispatch(command: Commands) -> Result<()> {
	match command {
		Commands::Launch {
			url,
			port,
			strict_port,
			user_data_dir,
			browser_path,
			flags,
			ignore_default_flags,
			headless,
			gui,
			xvfb,
			prefs_json,
			poll_interval_ms,
			max_retries,
		} => {
			launch::execute(launch::LaunchArgs {
				url,
				port,
				strict_port,
				user_data_dir,
				browser_path,
				flags,
				ignore_default_flags,
				headless,
				gui,
				xvfb,
				prefs_json,
				poll_interval_ms,
				max_retries,
			})
			.await
		}
		Commands::Installations => {
			let installations = brv_launcher::get_installations();
			if installations.is_empty() {
				println!("no browser installations found");
			} else {
				for path in installations {
					println!("{}", path.display());
				}
			}
			Ok(())
		}
		Commands::Flags => {
			for flag in brv_launcher::default_flags() {
				println!("{flag}");
			}
			Ok(())
		}
	}
}
