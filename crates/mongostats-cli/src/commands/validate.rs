use std::path::PathBuf;

use clap::Args;

use mongostats_core::config::CollectorConfig;

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to config file to validate
    pub config: PathBuf,
}

/// Hide credentials in a connection string: `mongodb://user:pw@h` -> `mongodb://***@h`.
pub fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    match rest.rfind('@') {
        Some(at) => format!("{}***{}", &url[..scheme_end + 3], &rest[at..]),
        None => url.to_string(),
    }
}

pub async fn execute(args: ValidateArgs) -> anyhow::Result<()> {
    println!("Validating {}...", args.config.display());

    match CollectorConfig::from_file(&args.config) {
        Ok(config) => {
            println!("  YAML parsing: OK");
            println!("  Connection:       {}", redact_url(&config.connection_url));
            println!("  Output:           {}", if config.json { "json" } else { "console" });
            println!("  Scale:            {}", config.scale);
            println!("  Security section: {}", config.include_security);
            println!("  Connect timeout:  {:?}", config.connect_timeout);
            if let Some(reference) = &config.reference {
                println!("  Ref:              {reference}");
            }
            println!("\nValidation PASSED");
            Ok(())
        }
        Err(e) => {
            println!("\nValidation FAILED:");
            eprintln!("  - {e}");
            std::process::exit(1);
        }
    }
}
