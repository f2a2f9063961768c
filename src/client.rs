use clap::Parser;

use filexfer::config::Config;
use filexfer::transport::client::{Client, Outcome};

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    filexfer::init_logging(config.verbose);

    match Client::new(&config).run()? {
        Outcome::Uploaded(summary) => {
            if config.verbose {
                println!("Uploaded {} ({})", config.filename.display(), summary);
            }
        }
        Outcome::Downloaded { announced, summary } => {
            if config.verbose {
                println!(
                    "Downloaded {} ({}, {} announced)",
                    config.filename.display(),
                    summary,
                    announced
                );
            }
            println!("done.");
        }
        // A refused transfer is reported but is not a failure.
        Outcome::Rejected(rejection) => println!("Error: {}", rejection),
    }
    Ok(())
}
