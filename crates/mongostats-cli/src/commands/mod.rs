use clap::Subcommand;

pub mod collect;
pub mod validate;

#[derive(Subcommand)]
pub enum Commands {
    /// Collect the statistics report from a MongoDB server
    Collect(collect::CollectArgs),
    /// Validate a config file without connecting
    Validate(validate::ValidateArgs),
}
